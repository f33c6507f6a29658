// src/game/kinds.rs
// Keyed lookup tables for collectible kinds and ambient species.
// Adding a kind or a species is adding a row; nothing else branches on names.

use serde::{Deserialize, Serialize};

use super::entity_state::{GroundPoint, WanderParams};

/// Fallback glyph for kinds without an emoji
pub const DEFAULT_EMOJI: &str = "🥬";

/// Fallback placeholder colour (plain green)
pub const DEFAULT_COLOR: u32 = 0x00FF00;

/// Collectible kind row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindSpec {
    pub name: String,
    pub emoji: String,
    pub color: u32,
    pub model: String,          // File name under models/
    #[serde(default = "default_model_scale")]
    pub model_scale: f32,
}

fn default_model_scale() -> f32 {
    0.5
}

/// Ambient species row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesSpec {
    pub name: String,
    pub color: u32,
    pub model: String,
    #[serde(default = "default_model_scale")]
    pub model_scale: f32,
    pub wander: WanderParams,
}

/// One collectible placement in the static layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectibleSpawn {
    pub kind: String,
    pub position: GroundPoint,
}

/// One ambient actor placement in the static layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSpawn {
    pub species: String,
    pub position: GroundPoint,
}

/// Table of collectible kinds keyed by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindTable {
    rows: Vec<KindSpec>,
}

impl KindTable {
    pub fn new(rows: Vec<KindSpec>) -> Self {
        Self { rows }
    }

    pub fn get(&self, name: &str) -> Option<&KindSpec> {
        self.rows.iter().find(|row| row.name == name)
    }

    pub fn emoji_for(&self, name: &str) -> &str {
        self.get(name).map(|row| row.emoji.as_str()).unwrap_or(DEFAULT_EMOJI)
    }

    pub fn color_for(&self, name: &str) -> u32 {
        self.get(name).map(|row| row.color).unwrap_or(DEFAULT_COLOR)
    }
}

impl Default for KindTable {
    fn default() -> Self {
        let row = |name: &str, emoji: &str, color: u32| KindSpec {
            name: name.to_string(),
            emoji: emoji.to_string(),
            color,
            model: format!("{}.glb", name.to_lowercase()),
            model_scale: default_model_scale(),
        };

        Self::new(vec![
            row("Carrot", "🥕", 0xFF8C00),
            row("Tomato", "🍅", 0xFF6347),
            row("Broccoli", "🥦", 0x228B22),
            row("Onion", "🧅", 0xFFE4B5),
            row("Eggplant", "🍆", 0x4B0082),
            row("Pepper", "🌶️", 0xFF0000),
            row("Cucumber", "🥒", 0x90EE90),
        ])
    }
}

/// Table of ambient species keyed by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesTable {
    rows: Vec<SpeciesSpec>,
}

impl SpeciesTable {
    pub fn new(rows: Vec<SpeciesSpec>) -> Self {
        Self { rows }
    }

    pub fn get(&self, name: &str) -> Option<&SpeciesSpec> {
        self.rows.iter().find(|row| row.name == name)
    }
}

impl Default for SpeciesTable {
    fn default() -> Self {
        Self::new(vec![
            SpeciesSpec {
                name: "Bunny".to_string(),
                color: 0xF5F5F5,
                model: "bunny.glb".to_string(),
                model_scale: 0.4,
                wander: WanderParams {
                    speed: 0.05,
                    pause_min_secs: 1.0,
                    pause_max_secs: 4.0,
                    wander_radius: 10.0,
                    bob_amplitude: 0.3,     // Hop
                    phase_increment: 0.3,
                    base_y: 0.3,
                },
            },
            SpeciesSpec {
                name: "Rooster".to_string(),
                color: 0xB22222,
                model: "rooster.glb".to_string(),
                model_scale: 0.4,
                wander: WanderParams {
                    speed: 0.03,
                    pause_min_secs: 0.5,
                    pause_max_secs: 2.5,
                    wander_radius: 12.5,
                    bob_amplitude: 0.05,    // Head bob
                    phase_increment: 0.2,
                    base_y: 0.3,
                },
            },
        ])
    }
}

/// Vegetable layout of the garden bed
pub fn default_collectible_layout() -> Vec<CollectibleSpawn> {
    [
        ("Carrot", -3.0, 2.0),
        ("Tomato", 3.0, 3.0),
        ("Broccoli", 0.0, -3.0),
        ("Onion", -4.0, -2.0),
        ("Eggplant", 4.0, -1.0),
        ("Pepper", 2.0, 5.0),
        ("Cucumber", -2.0, 4.0),
    ]
    .into_iter()
    .map(|(kind, x, z)| CollectibleSpawn {
        kind: kind.to_string(),
        position: GroundPoint::new(x, z),
    })
    .collect()
}

/// Ambient creatures around the bed
pub fn default_actor_layout() -> Vec<ActorSpawn> {
    [
        ("Bunny", -7.0, -6.0),
        ("Bunny", 6.5, 7.0),
        ("Rooster", 7.0, -7.0),
    ]
    .into_iter()
    .map(|(species, x, z)| ActorSpawn {
        species: species.to_string(),
        position: GroundPoint::new(x, z),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_kinds_exist_in_table() {
        let kinds = KindTable::default();
        for spawn in default_collectible_layout() {
            assert!(kinds.get(&spawn.kind).is_some(), "missing kind {}", spawn.kind);
        }

        let species = SpeciesTable::default();
        for spawn in default_actor_layout() {
            assert!(species.get(&spawn.species).is_some(), "missing species {}", spawn.species);
        }
    }

    #[test]
    fn test_unknown_kind_uses_fallbacks() {
        let kinds = KindTable::default();
        assert_eq!(kinds.emoji_for("Carrot"), "🥕");
        assert_eq!(kinds.emoji_for("Durian"), DEFAULT_EMOJI);
        assert_eq!(kinds.color_for("Durian"), DEFAULT_COLOR);
        assert_eq!(kinds.get("Carrot").map(|k| k.model.as_str()), Some("carrot.glb"));
    }
}
