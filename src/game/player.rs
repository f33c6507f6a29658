// src/game/player.rs
// Directional input and the player movement step

use super::entity_state::{Player, WorldBounds};

/// Recognized movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Map a browser `KeyboardEvent.key` value. Unrecognized keys map to `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" => return Some(Direction::Up),
            "ArrowDown" => return Some(Direction::Down),
            "ArrowLeft" => return Some(Direction::Left),
            "ArrowRight" => return Some(Direction::Right),
            _ => {}
        }

        match key.to_ascii_lowercase().as_str() {
            "w" => Some(Direction::Up),
            "s" => Some(Direction::Down),
            "a" => Some(Direction::Left),
            "d" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Currently held directions. Each axis key is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl HeldKeys {
    pub fn set(&mut self, direction: Direction, is_down: bool) {
        match direction {
            Direction::Up => self.up = is_down,
            Direction::Down => self.down = is_down,
            Direction::Left => self.left = is_down,
            Direction::Right => self.right = is_down,
        }
    }

    /// Apply a raw key event; returns `false` when the key is not a movement key
    pub fn apply_key(&mut self, key: &str, is_down: bool) -> bool {
        match Direction::from_key(key) {
            Some(direction) => {
                self.set(direction, is_down);
                true
            }
            None => false,
        }
    }

    /// Per-axis displacement, not normalized: diagonals move `speed` on both axes.
    /// Up is -z, right is +x.
    pub fn displacement(&self, speed: f32) -> (f32, f32) {
        let mut dx = 0.0;
        let mut dz = 0.0;
        if self.up {
            dz -= speed;
        }
        if self.down {
            dz += speed;
        }
        if self.left {
            dx -= speed;
        }
        if self.right {
            dx += speed;
        }
        (dx, dz)
    }
}

/// Moves the player from held input
#[derive(Debug, Clone, Copy)]
pub struct PlayerController {
    pub speed: f32,
    pub bounds: WorldBounds,
}

impl PlayerController {
    pub fn new(speed: f32, bounds: WorldBounds) -> Self {
        Self { speed, bounds }
    }

    /// Advance one tick. A player that has not been spawned yet is skipped.
    pub fn step(&self, player: Option<&mut Player>, keys: &HeldKeys) {
        let Some(player) = player else {
            return;
        };

        let (dx, dz) = keys.displacement(self.speed);
        player.position.x += dx;
        player.position.z += dz;
        self.bounds.clamp_position(&mut player.position);

        if dx != 0.0 || dz != 0.0 {
            player.facing = dx.atan2(dz);
        }
    }
}
