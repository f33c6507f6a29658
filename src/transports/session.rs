// src/transports/session.rs
// One garden per WebSocket. The session task is the only writer of its garden:
// client messages, async completions (asset probes, saves, timers) and the
// removal timer are all funneled into the same select loop.

use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::assets::{AssetLoadError, AssetLoader, Placement, SlotRef};
use crate::config::GardenConfig;
use crate::game::entity_state::Representation;
use crate::game::{GardenSession, SessionRegistry};
use crate::persistence::save::{SaveController, SaveStart, SaveStatus, REENABLE_AFTER_SUCCESS};
use crate::persistence::{PersistenceError, SaveReceipt, ShoppingListStore};

/// Removal animations step on this cadence, independent of client frames
pub const REMOVAL_STEP: Duration = Duration::from_millis(16);

/// Ticks between registry summary refreshes
const REGISTRY_UPDATE_EVERY: u64 = 60;

const EVENT_QUEUE: usize = 64;

/* ------------------------------- Messages ------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    KeyDown { key: String },
    KeyUp { key: String },
    /// Sent once per rendered frame; answered with a snapshot
    Frame,
    Save,
    Ping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        session_id: String,
        lines: Vec<String>,
        save_enabled: bool,
    },
    Frame {
        frame: serde_json::Value,
    },
    Collected {
        slot: usize,
        kind: String,
        count: u32,
        total: u32,
    },
    ListUpdated {
        lines: Vec<String>,
        total: u32,
    },
    Removed {
        slot: usize,
    },
    Placement {
        target: SlotRef,
        representation: Representation,
    },
    /// One model probe settled, loaded or not
    LoadProgress {
        file: String,
        loaded: usize,
        total: usize,
    },
    /// Every probe started for this session has settled
    Loaded,
    SaveStatus {
        status: SaveStatus,
    },
    SaveButton {
        enabled: bool,
    },
    Pong {
        timestamp: i64,
    },
    Error {
        message: String,
    },
}

/// Completions reported back to the session task
#[derive(Debug)]
pub enum SessionEvent {
    AssetLoaded {
        slot: SlotRef,
        file: String,
        result: Result<Representation, AssetLoadError>,
    },
    SaveFinished(Result<SaveReceipt, PersistenceError>),
    ReenableSave,
}

/* -------------------------------- Driver -------------------------------- */

/// Per-connection state: the garden, the save button and the way back in for async work
pub struct SessionDriver {
    session_id: String,
    garden: GardenSession,
    saves: SaveController,
    store: Arc<dyn ShoppingListStore>,
    registry: SessionRegistry,
    events: mpsc::Sender<SessionEvent>,
    started: Instant,
    assets_total: usize,
    assets_pending: usize,
}

impl SessionDriver {
    pub fn new(
        config: Arc<GardenConfig>,
        store: Arc<dyn ShoppingListStore>,
        registry: SessionRegistry,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let session_id = ulid::Ulid::new().to_string();
        let (events, rx) = mpsc::channel(EVENT_QUEUE);
        registry.register(&session_id);

        let driver = Self {
            garden: GardenSession::new(config, rand::random()),
            saves: SaveController::new(),
            session_id,
            store,
            registry,
            events,
            started: Instant::now(),
            assets_total: 0,
            assets_pending: 0,
        };
        (driver, rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn garden(&self) -> &GardenSession {
        &self.garden
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    /// Probe every model in the background. Each result comes back as an event,
    /// in whatever order the probes finish.
    pub fn start_asset_loads(&mut self, loader: Arc<dyn AssetLoader>) {
        let config = self.garden.config();
        let mut jobs: Vec<(SlotRef, String, f32)> = Vec::new();

        for collectible in self.garden.collectibles() {
            if let Some(kind) = config.kinds.get(&collectible.kind) {
                jobs.push((SlotRef::Collectible(collectible.slot), kind.model.clone(), kind.model_scale));
            }
        }
        for actor in self.garden.actors() {
            if let Some(species) = config.species.get(&actor.species) {
                jobs.push((SlotRef::Actor(actor.id), species.model.clone(), species.model_scale));
            }
        }
        jobs.push((SlotRef::Player, config.player_model.clone(), 1.0));

        debug!(session_id = %self.session_id, jobs = jobs.len(), "Starting model probes");
        self.assets_total += jobs.len();
        self.assets_pending += jobs.len();
        for (slot, file, scale) in jobs {
            let loader = loader.clone();
            let events = self.events.clone();
            tokio::spawn(async move {
                let result = loader.load(&file, scale).await;
                let _ = events.send(SessionEvent::AssetLoaded { slot, file, result }).await;
            });
        }
    }

    pub fn welcome(&self) -> ServerMessage {
        ServerMessage::Welcome {
            session_id: self.session_id.clone(),
            lines: self.garden.display_lines(),
            save_enabled: self.saves.button_enabled(),
        }
    }

    pub fn handle_client(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        match message {
            ClientMessage::KeyDown { key } => {
                self.garden.key_event(&key, true);
                Vec::new()
            }
            ClientMessage::KeyUp { key } => {
                self.garden.key_event(&key, false);
                Vec::new()
            }
            ClientMessage::Frame => self.frame(),
            ClientMessage::Save => self.save(),
            ClientMessage::Ping => vec![ServerMessage::Pong {
                timestamp: chrono::Utc::now().timestamp(),
            }],
        }
    }

    fn frame(&mut self) -> Vec<ServerMessage> {
        let outcome = self.garden.tick(self.now());
        let mut out = Vec::with_capacity(outcome.collected.len() + 2);
        let total = self.garden.shopping_list().total();

        for event in &outcome.collected {
            out.push(ServerMessage::Collected {
                slot: event.slot,
                kind: event.kind.clone(),
                count: event.count,
                total,
            });
        }
        if !outcome.collected.is_empty() {
            out.push(ServerMessage::ListUpdated {
                lines: self.garden.display_lines(),
                total,
            });
        }

        if !outcome.collected.is_empty() || self.garden.tick_count() % REGISTRY_UPDATE_EVERY == 0 {
            self.registry.update(
                &self.session_id,
                self.garden.player().map(|p| p.position),
                total,
            );
        }

        match serde_json::to_value(self.garden.snapshot()) {
            Ok(frame) => out.push(ServerMessage::Frame { frame }),
            Err(e) => error!(session_id = %self.session_id, error = %e, "Failed to serialize frame"),
        }
        out
    }

    fn save(&mut self) -> Vec<ServerMessage> {
        match self.saves.begin(self.garden.shopping_list(), chrono::Utc::now()) {
            SaveStart::Busy => {
                debug!(session_id = %self.session_id, "Save pressed while busy, ignored");
                Vec::new()
            }
            SaveStart::Rejected(status) => vec![ServerMessage::SaveStatus { status }],
            SaveStart::Started { document, status } => {
                info!(
                    session_id = %self.session_id,
                    backend = self.store.backend(),
                    total = document.total,
                    "Saving shopping list"
                );
                let store = self.store.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = store.save(&document).await;
                    let _ = events.send(SessionEvent::SaveFinished(result)).await;
                });
                vec![ServerMessage::SaveStatus { status }]
            }
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<ServerMessage> {
        match event {
            SessionEvent::AssetLoaded { slot, file, result } => {
                let mut out = self.apply_asset(slot, result);
                out.extend(self.settle_probe(file));
                out
            }
            SessionEvent::SaveFinished(result) => {
                if result.is_ok() {
                    self.registry.record_save(&self.session_id);
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(REENABLE_AFTER_SUCCESS).await;
                        let _ = events.send(SessionEvent::ReenableSave).await;
                    });
                }
                let status = self.saves.finish(&result);
                vec![ServerMessage::SaveStatus { status }]
            }
            SessionEvent::ReenableSave => {
                if self.saves.reenable() {
                    vec![ServerMessage::SaveButton { enabled: true }]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn apply_asset(&mut self, slot: SlotRef, result: Result<Representation, AssetLoadError>) -> Vec<ServerMessage> {
        match result {
            Ok(representation) => {
                let placement = Placement {
                    slot,
                    representation: representation.clone(),
                };
                if self.garden.apply_placement(placement) {
                    vec![ServerMessage::Placement {
                        target: slot,
                        representation,
                    }]
                } else {
                    Vec::new()
                }
            }
            Err(e) => {
                warn!(session_id = %self.session_id, slot = ?slot, error = %e, "Model unavailable, keeping placeholder");
                if slot == SlotRef::Player && self.garden.player().is_none() {
                    self.garden.spawn_player_placeholder();
                    if let Some(player) = self.garden.player() {
                        return vec![ServerMessage::Placement {
                            target: SlotRef::Player,
                            representation: player.representation.clone(),
                        }];
                    }
                }
                Vec::new()
            }
        }
    }

    /// Count a settled probe; the last one also announces that loading is over
    fn settle_probe(&mut self, file: String) -> Vec<ServerMessage> {
        if self.assets_pending == 0 {
            return Vec::new();
        }
        self.assets_pending -= 1;
        let mut out = vec![ServerMessage::LoadProgress {
            file,
            loaded: self.assets_total - self.assets_pending,
            total: self.assets_total,
        }];
        if self.assets_pending == 0 {
            info!(session_id = %self.session_id, models = self.assets_total, "All model probes settled");
            out.push(ServerMessage::Loaded);
        }
        out
    }

    /// Step removal animations; called from the session's own timer
    pub fn advance_removals(&mut self) -> Vec<ServerMessage> {
        self.garden
            .advance_removals(self.now())
            .into_iter()
            .map(|slot| ServerMessage::Removed { slot })
            .collect()
    }

    pub fn has_running_removals(&self) -> bool {
        self.garden.has_running_removals()
    }
}

/* ------------------------------- ws_loop -------------------------------- */

async fn send_all(socket: &mut WebSocket, session_id: &str, messages: Vec<ServerMessage>) -> bool {
    for message in messages {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to encode server message");
                continue;
            }
        };
        if let Err(e) = socket.send(Message::Text(text.into())).await {
            error!(session_id = %session_id, error = %e, "Failed to send message");
            return false;
        }
    }
    true
}

pub async fn ws_loop(
    mut socket: WebSocket,
    mut driver: SessionDriver,
    mut events: mpsc::Receiver<SessionEvent>,
    loader: Arc<dyn AssetLoader>,
) {
    let session_id = driver.session_id().to_string();
    info!(session_id = %session_id, "Garden session starting");

    if !send_all(&mut socket, &session_id, vec![driver.welcome()]).await {
        driver.registry.remove(&session_id);
        return;
    }
    driver.start_asset_loads(loader);

    let mut removal_timer = tokio::time::interval(REMOVAL_STEP);
    removal_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut message_count = 0u64;
    loop {
        let outgoing = tokio::select! {
            incoming = socket.next() => {
                let Some(result) = incoming else { break };
                match result {
                    Ok(Message::Text(text)) => {
                        message_count += 1;
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(message) => driver.handle_client(message),
                            Err(e) => {
                                debug!(session_id = %session_id, error = %e, "Unrecognized client message");
                                vec![ServerMessage::Error { message: format!("Invalid message: {}", e) }]
                            }
                        }
                    }
                    Ok(Message::Ping(p)) => {
                        if let Err(e) = socket.send(Message::Pong(p)).await {
                            error!(session_id = %session_id, error = %e, "Failed to send Pong response");
                            break;
                        }
                        continue;
                    }
                    Ok(Message::Close(frame)) => {
                        info!(
                            session_id = %session_id,
                            close_code = ?frame.as_ref().map(|f| f.code),
                            messages_exchanged = message_count,
                            "WebSocket connection closed by client"
                        );
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!(session_id = %session_id, error = %e, "WebSocket error, closing connection");
                        break;
                    }
                }
            }
            Some(event) = events.recv() => driver.handle_event(event),
            _ = removal_timer.tick() => {
                if !driver.has_running_removals() {
                    continue;
                }
                driver.advance_removals()
            }
        };

        if !outgoing.is_empty() && !send_all(&mut socket, &session_id, outgoing).await {
            break;
        }
    }

    let summary = driver.registry.remove(&session_id);
    info!(
        session_id = %session_id,
        total_messages = message_count,
        collected = summary.map(|s| s.collected_total).unwrap_or(0),
        "Garden session ended"
    );
}
