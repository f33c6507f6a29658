// src/game/collection.rs
// Proximity collection and the fire-and-forget removal animation

use std::time::Duration;
use tracing::info;

use crate::config::RemovalConfig;

use super::entity_state::{Collectible, Player};
use super::shopping_list::ShoppingList;

/// Emitted once per collectible, the tick it is picked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEvent {
    pub slot: usize,
    pub kind: String,
    pub count: u32, // Kind count after this event
}

/// Time-parameterized rise/spin/shrink played on a collected slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemovalAnimation {
    pub slot: usize,
    pub started_at: Duration,
    pub start_y: f32,
    config: RemovalConfig,
}

impl RemovalAnimation {
    pub fn new(slot: usize, started_at: Duration, start_y: f32, config: RemovalConfig) -> Self {
        Self {
            slot,
            started_at,
            start_y,
            config,
        }
    }

    /// Progress in `[0, 1]` from elapsed wall time, not from how many steps ran
    pub fn progress(&self, now: Duration) -> f32 {
        let elapsed = now.saturating_sub(self.started_at).as_secs_f32();
        let duration = self.config.duration().as_secs_f32();
        if duration <= 0.0 {
            return 1.0;
        }
        (elapsed / duration).min(1.0)
    }

    /// Apply one animation step. Returns `true` once the animation has finished.
    pub fn advance(&self, collectible: &mut Collectible, now: Duration) -> bool {
        let progress = self.progress(now);
        collectible.position.y = self.start_y + progress * self.config.rise;
        collectible.rotation_y += self.config.spin_per_step;
        collectible.scale *= 1.0 - progress * self.config.shrink_per_step;
        progress >= 1.0
    }
}

/// Per-tick proximity test between the player and uncollected slots
#[derive(Debug, Clone, Copy)]
pub struct CollectionDetector {
    pub radius: f32,
    pub removal: RemovalConfig,
}

impl CollectionDetector {
    pub fn new(radius: f32, removal: RemovalConfig) -> Self {
        Self { radius, removal }
    }

    /// Collect every slot strictly inside the radius. The `collected` flag is
    /// checked before the distance test and set before returning, so a slot
    /// still in range during its removal animation is never counted twice.
    pub fn detect(
        &self,
        player: Option<&Player>,
        slots: &mut [Option<Collectible>],
        list: &mut ShoppingList,
        removals: &mut Vec<RemovalAnimation>,
        now: Duration,
    ) -> Vec<CollectionEvent> {
        let Some(player) = player else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for collectible in slots.iter_mut().flatten() {
            if collectible.collected {
                continue;
            }
            if player.position.planar_distance_to(&collectible.position) >= self.radius {
                continue;
            }
            if !collectible.mark_collected() {
                continue;
            }

            let count = list.record(&collectible.kind);
            removals.push(RemovalAnimation::new(collectible.slot, now, collectible.position.y, self.removal));

            info!(
                slot = collectible.slot,
                kind = %collectible.kind,
                count = count,
                total = list.total(),
                "Collected vegetable"
            );

            events.push(CollectionEvent {
                slot: collectible.slot,
                kind: collectible.kind.clone(),
                count,
            });
        }
        events
    }
}

/// Step every running removal animation; finished slots are emptied for good.
/// Returns the slots removed by this call.
pub fn advance_removals(
    slots: &mut [Option<Collectible>],
    removals: &mut Vec<RemovalAnimation>,
    now: Duration,
) -> Vec<usize> {
    let mut finished = Vec::new();
    removals.retain(|animation| {
        let Some(slot) = slots.get_mut(animation.slot) else {
            return false;
        };
        let Some(collectible) = slot.as_mut() else {
            return false;
        };
        if animation.advance(collectible, now) {
            *slot = None;
            finished.push(animation.slot);
            false
        } else {
            true
        }
    });
    finished
}
