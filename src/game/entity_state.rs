// src/game/entity_state.rs
// Per-actor state for the garden: collectibles, ambient creatures and the player

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 3D position in game world (y is up, the ground plane is x/z)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance on the ground plane, ignoring height
    pub fn planar_distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn ground(&self) -> GroundPoint {
        GroundPoint { x: self.x, z: self.z }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// A point on the ground plane, used by layout tables and wander targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundPoint {
    pub x: f32,
    pub z: f32,
}

impl GroundPoint {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn at_height(&self, y: f32) -> Position {
        Position::new(self.x, y, self.z)
    }
}

/// Axis-aligned rectangle on the ground plane (inclusive on every edge)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl WorldBounds {
    pub fn symmetric(half_extent: f32) -> Self {
        Self {
            min_x: -half_extent,
            max_x: half_extent,
            min_z: -half_extent,
            max_z: half_extent,
        }
    }

    pub fn contains(&self, point: &GroundPoint) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.z >= self.min_z && point.z <= self.max_z
    }

    pub fn clamp(&self, point: GroundPoint) -> GroundPoint {
        GroundPoint {
            x: point.x.clamp(self.min_x, self.max_x),
            z: point.z.clamp(self.min_z, self.max_z),
        }
    }

    /// Clamp the ground components of a position in place, leaving height alone
    pub fn clamp_position(&self, position: &mut Position) {
        position.x = position.x.clamp(self.min_x, self.max_x);
        position.z = position.z.clamp(self.min_z, self.max_z);
    }

    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_z <= self.max_z)
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::symmetric(9.0) // Garden bed footprint
    }
}

/// What the renderer should draw at a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Representation {
    /// Coloured stand-in shape, used until (or instead of) a loaded model
    Placeholder { color: u32 },
    /// Loaded 3D model
    Model { url: String, scale: f32 },
}

/// Collectible vegetable placed in the garden
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collectible {
    pub slot: usize,            // Stable index into the layout table
    pub kind: String,           // e.g. "Carrot"
    pub position: Position,
    pub base_y: f32,
    pub rotation_y: f32,
    pub scale: f32,
    pub float_offset: f32,      // Idle bob phase, fixed at creation
    pub collected: bool,
    pub representation: Representation,
}

impl Collectible {
    pub fn new(slot: usize, kind: String, at: GroundPoint, base_y: f32, float_offset: f32, color: u32) -> Self {
        Self {
            slot,
            kind,
            position: at.at_height(base_y),
            base_y,
            rotation_y: 0.0,
            scale: 1.0,
            float_offset,
            collected: false,
            representation: Representation::Placeholder { color },
        }
    }

    /// Flip the one-way `collected` flag. Returns `true` only on the first call.
    pub fn mark_collected(&mut self) -> bool {
        if self.collected {
            return false;
        }
        self.collected = true;
        true
    }
}

/// Per-species gait constants for the wander state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WanderParams {
    pub speed: f32,             // Units per tick
    pub pause_min_secs: f32,
    pub pause_max_secs: f32,
    pub wander_radius: f32,     // Max offset per axis when picking a target
    pub bob_amplitude: f32,
    pub phase_increment: f32,   // Radians per tick while seeking
    pub base_y: f32,
}

/// Wander state. Paused and Seeking are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WanderState {
    Paused {
        #[serde(rename = "resumeAtMs", serialize_with = "serialize_millis")]
        resume_at: Duration,
    },
    Seeking {
        target: GroundPoint,
    },
}

impl WanderState {
    pub fn is_paused(&self) -> bool {
        matches!(self, WanderState::Paused { .. })
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// Wandering creature (bunny, rooster, ...). Never collected, never removed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbientActor {
    pub id: usize,
    pub species: String,
    pub position: Position,
    pub facing: f32,
    pub state: WanderState,
    pub phase: f32,             // Animation phase accumulator
    #[serde(skip)]
    pub params: WanderParams,
    pub representation: Representation,
}

impl AmbientActor {
    pub fn new(id: usize, species: String, at: GroundPoint, params: WanderParams, resume_at: Duration, color: u32) -> Self {
        Self {
            id,
            species,
            position: at.at_height(params.base_y),
            facing: 0.0,
            state: WanderState::Paused { resume_at },
            phase: 0.0,
            params,
            representation: Representation::Placeholder { color },
        }
    }
}

/// The player-controlled character
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub position: Position,
    pub facing: f32,            // Radians around y, z-forward
    pub representation: Representation,
}

impl Player {
    pub fn new(position: Position, representation: Representation) -> Self {
        Self {
            position,
            facing: 0.0,
            representation,
        }
    }
}
