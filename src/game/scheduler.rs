// src/game/scheduler.rs
// Simulation context for one garden session and the per-frame tick.
// Tick order: player -> collection -> idle float -> wander (each actor) -> camera.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::assets::{Placement, SlotRef};
use crate::config::{CameraConfig, GardenConfig};

use super::collection::{advance_removals, CollectionDetector, CollectionEvent, RemovalAnimation};
use super::entity_state::{AmbientActor, Collectible, Player, Position, Representation};
use super::player::{HeldKeys, PlayerController};
use super::shopping_list::ShoppingList;
use super::wander::{draw_resume_at, WanderBehavior};

/// Placeholder colour of the player capsule
const PLAYER_COLOR: u32 = 0xFF6347;

/// Chase camera state
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRig {
    pub position: Position,
    pub look_at: Position,
}

impl CameraRig {
    fn new(config: &CameraConfig) -> Self {
        Self {
            position: Position::new(0.0, config.height, config.distance),
            look_at: Position::default(),
        }
    }

    /// Ease toward the spot behind the target
    pub fn follow(&mut self, target: &Position, config: &CameraConfig) {
        let goal = Position::new(target.x, config.height, target.z + config.distance);
        let t = config.follow_lerp;
        self.position.x += (goal.x - self.position.x) * t;
        self.position.y += (goal.y - self.position.y) * t;
        self.position.z += (goal.z - self.position.z) * t;
        self.look_at = Position::new(target.x, 0.0, target.z);
    }
}

/// What happened during one tick
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub collected: Vec<CollectionEvent>,
}

/// Per-frame state sent to the renderer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSnapshot<'a> {
    pub tick: u64,
    pub time_ms: u64,
    pub player: Option<&'a Player>,
    pub camera: CameraRig,
    pub collectibles: Vec<&'a Collectible>,
    pub actors: &'a [AmbientActor],
}

/// Everything one session simulates. Owned by a single task; nothing here is shared.
pub struct GardenSession {
    config: Arc<GardenConfig>,
    rng: ChaCha8Rng,
    keys: HeldKeys,
    player: Option<Player>,
    collectibles: Vec<Option<Collectible>>, // Indexed by layout slot; None once removed
    actors: Vec<AmbientActor>,
    shopping_list: ShoppingList,
    removals: Vec<RemovalAnimation>,
    camera: CameraRig,
    controller: PlayerController,
    detector: CollectionDetector,
    wander: WanderBehavior,
    tick_count: u64,
    last_now: Duration,
}

impl GardenSession {
    pub fn new(config: Arc<GardenConfig>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let collectibles = config
            .collectibles
            .iter()
            .enumerate()
            .map(|(slot, spawn)| {
                let float_offset = rng.gen_range(0.0..std::f32::consts::TAU);
                Some(Collectible::new(
                    slot,
                    spawn.kind.clone(),
                    spawn.position,
                    config.collectible_base_y,
                    float_offset,
                    config.kinds.color_for(&spawn.kind),
                ))
            })
            .collect();

        let actors = config
            .actors
            .iter()
            .enumerate()
            .filter_map(|(id, spawn)| {
                let species = config.species.get(&spawn.species)?;
                let resume_at = draw_resume_at(&species.wander, Duration::ZERO, &mut rng);
                Some(AmbientActor::new(
                    id,
                    species.name.clone(),
                    spawn.position,
                    species.wander,
                    resume_at,
                    species.color,
                ))
            })
            .collect();

        Self {
            controller: PlayerController::new(config.player_speed, config.bounds),
            detector: CollectionDetector::new(config.collection_radius, config.removal),
            wander: WanderBehavior::new(config.bounds),
            camera: CameraRig::new(&config.camera),
            config,
            rng,
            keys: HeldKeys::default(),
            player: None,
            collectibles,
            actors,
            shopping_list: ShoppingList::new(),
            removals: Vec::new(),
            tick_count: 0,
            last_now: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &GardenConfig {
        &self.config
    }

    /// Feed a key event; unrecognized keys are ignored
    pub fn key_event(&mut self, key: &str, is_down: bool) -> bool {
        self.keys.apply_key(key, is_down)
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    /// Create the player with the capsule stand-in (its model failed or was never found)
    pub fn spawn_player_placeholder(&mut self) {
        if self.player.is_none() {
            self.spawn_player(Representation::Placeholder { color: PLAYER_COLOR });
        }
    }

    fn spawn_player(&mut self, representation: Representation) {
        let position = Position::new(0.0, self.config.player_base_y, 0.0);
        self.player = Some(Player::new(position, representation));
        info!(x = position.x, z = position.z, "Player spawned");
    }

    /// Swap a slot's representation. Returns `true` when anything changed.
    /// Re-applying a placement, or placing into a removed slot, is a no-op.
    pub fn apply_placement(&mut self, placement: Placement) -> bool {
        let Placement { slot, representation } = placement;
        let current = match slot {
            SlotRef::Player => {
                if self.player.is_none() {
                    self.spawn_player(representation);
                    return true;
                }
                self.player.as_mut().map(|p| &mut p.representation)
            }
            SlotRef::Collectible(index) => self
                .collectibles
                .get_mut(index)
                .and_then(|slot| slot.as_mut())
                .map(|c| &mut c.representation),
            SlotRef::Actor(id) => self
                .actors
                .iter_mut()
                .find(|a| a.id == id)
                .map(|a| &mut a.representation),
        };

        match current {
            Some(current) if *current != representation => {
                debug!(slot = ?slot, "Placement applied");
                *current = representation;
                true
            }
            _ => false,
        }
    }

    /// Run one frame
    pub fn tick(&mut self, now: Duration) -> TickOutcome {
        self.tick_count += 1;
        self.last_now = now;

        self.controller.step(self.player.as_mut(), &self.keys);

        let collected = self.detector.detect(
            self.player.as_ref(),
            &mut self.collectibles,
            &mut self.shopping_list,
            &mut self.removals,
            now,
        );

        self.float_collectibles(now);

        for actor in &mut self.actors {
            self.wander.step(actor, now, &mut self.rng);
        }

        if let Some(player) = &self.player {
            self.camera.follow(&player.position, &self.config.camera);
        }

        TickOutcome { collected }
    }

    /// Step removal animations; runs on its own timer, separate from `tick`.
    /// Returns slots that finished and left the garden.
    pub fn advance_removals(&mut self, now: Duration) -> Vec<usize> {
        if self.removals.is_empty() {
            return Vec::new();
        }
        let removed = advance_removals(&mut self.collectibles, &mut self.removals, now);
        for slot in &removed {
            debug!(slot = slot, "Collectible removed from garden");
        }
        removed
    }

    pub fn has_running_removals(&self) -> bool {
        !self.removals.is_empty()
    }

    fn float_collectibles(&mut self, now: Duration) {
        let t = now.as_secs_f32();
        let config = &self.config;
        for collectible in self.collectibles.iter_mut().flatten() {
            if collectible.collected {
                continue;
            }
            collectible.position.y = collectible.base_y
                + (t * config.float_frequency + collectible.float_offset).sin() * config.float_amplitude;
            collectible.rotation_y += config.idle_spin;
        }
    }

    pub fn shopping_list(&self) -> &ShoppingList {
        &self.shopping_list
    }

    pub fn display_lines(&self) -> Vec<String> {
        self.shopping_list.display_lines(&self.config.kinds)
    }

    pub fn collectibles(&self) -> impl Iterator<Item = &Collectible> {
        self.collectibles.iter().flatten()
    }

    pub fn actors(&self) -> &[AmbientActor] {
        &self.actors
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn snapshot(&self) -> FrameSnapshot<'_> {
        FrameSnapshot {
            tick: self.tick_count,
            time_ms: self.last_now.as_millis() as u64,
            player: self.player.as_ref(),
            camera: self.camera,
            collectibles: self.collectibles.iter().flatten().collect(),
            actors: &self.actors,
        }
    }
}
