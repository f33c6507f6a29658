// src/config.rs
// Server settings from the environment, game constants from an optional JSON file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::game::entity_state::WorldBounds;
use crate::game::kinds::{
    default_actor_layout, default_collectible_layout, ActorSpawn, CollectibleSpawn, KindTable, SpeciesTable,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Longest pause a wandering actor may take between walks
pub const MAX_PAUSE_SECS: f32 = 3600.0;

/// Largest per-axis offset a wander target may be drawn from
pub const MAX_WANDER_RADIUS: f32 = 1000.0;

/// Time-based removal animation played on collection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemovalConfig {
    pub duration_ms: u64,
    pub rise: f32,
    pub spin_per_step: f32,
    pub shrink_per_step: f32,
}

impl RemovalConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            duration_ms: 500,
            rise: 3.0,
            spin_per_step: 0.2,
            shrink_per_step: 0.02,
        }
    }
}

/// Chase camera parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    pub height: f32,
    pub distance: f32,
    pub follow_lerp: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            height: 10.0,
            distance: 12.0,
            follow_lerp: 0.05,
        }
    }
}

/// Game constants. `Default` is the canonical garden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GardenConfig {
    pub bounds: WorldBounds,
    pub player_speed: f32,          // Units per tick, per axis
    pub player_base_y: f32,
    pub player_model: String,
    pub collection_radius: f32,
    pub collectible_base_y: f32,
    pub float_amplitude: f32,
    pub float_frequency: f32,       // Radians per second
    pub idle_spin: f32,             // Radians per tick
    pub removal: RemovalConfig,
    pub camera: CameraConfig,
    pub kinds: KindTable,
    pub species: SpeciesTable,
    pub collectibles: Vec<CollectibleSpawn>,
    pub actors: Vec<ActorSpawn>,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            bounds: WorldBounds::default(),
            player_speed: 0.1,
            player_base_y: 0.5,
            player_model: "farmer.glb".to_string(),
            collection_radius: 1.5,
            collectible_base_y: 0.5,
            float_amplitude: 0.2,
            float_frequency: 2.0,
            idle_spin: 0.01,
            removal: RemovalConfig::default(),
            camera: CameraConfig::default(),
            kinds: KindTable::default(),
            species: SpeciesTable::default(),
            collectibles: default_collectible_layout(),
            actors: default_actor_layout(),
        }
    }
}

impl GardenConfig {
    /// Load and validate a JSON config. Missing fields fall back to defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.is_empty() {
            return Err(ConfigError::Invalid("world bounds are empty".to_string()));
        }
        let finite = [
            self.bounds.min_x,
            self.bounds.max_x,
            self.bounds.min_z,
            self.bounds.max_z,
            self.player_speed,
            self.collection_radius,
            self.float_amplitude,
            self.float_frequency,
            self.idle_spin,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(ConfigError::Invalid("garden constants must be finite numbers".to_string()));
        }
        if self.player_speed <= 0.0 || self.collection_radius <= 0.0 {
            return Err(ConfigError::Invalid(
                "player speed and collection radius must be positive".to_string(),
            ));
        }
        if self.removal.duration_ms == 0 {
            return Err(ConfigError::Invalid("removal duration must be non-zero".to_string()));
        }

        for spawn in &self.collectibles {
            if self.kinds.get(&spawn.kind).is_none() {
                return Err(ConfigError::Invalid(format!("unknown collectible kind '{}'", spawn.kind)));
            }
            if !self.bounds.contains(&spawn.position) {
                return Err(ConfigError::Invalid(format!(
                    "{} at ({}, {}) is outside the world bounds",
                    spawn.kind, spawn.position.x, spawn.position.z
                )));
            }
        }

        for spawn in &self.actors {
            let species = self
                .species
                .get(&spawn.species)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown species '{}'", spawn.species)))?;
            let wander = &species.wander;
            let finite = [
                wander.speed,
                wander.wander_radius,
                wander.bob_amplitude,
                wander.phase_increment,
                wander.base_y,
            ]
            .iter()
            .all(|v| v.is_finite());
            if !finite
                || wander.speed <= 0.0
                || wander.wander_radius.abs() > MAX_WANDER_RADIUS
                || !(0.0..=MAX_PAUSE_SECS).contains(&wander.pause_min_secs)
                || !(0.0..=MAX_PAUSE_SECS).contains(&wander.pause_max_secs)
                || wander.pause_min_secs > wander.pause_max_secs
            {
                return Err(ConfigError::Invalid(format!("bad wander parameters for '{}'", species.name)));
            }
            if !self.bounds.contains(&spawn.position) {
                return Err(ConfigError::Invalid(format!(
                    "{} at ({}, {}) is outside the world bounds",
                    spawn.species, spawn.position.x, spawn.position.z
                )));
            }
        }

        Ok(())
    }
}

/// Which persistence backend a session saves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Talk to the GitHub contents API from this process
    Direct,
    /// POST to the relay function, which holds the credentials
    Relay,
}

impl std::str::FromStr for PersistenceMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "relay" => Ok(Self::Relay),
            other => Err(ConfigError::Invalid(format!("unknown PERSISTENCE_MODE '{other}'"))),
        }
    }
}

/// GitHub repository that receives `data/shopping-list.json`
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: Option<String>,
}

/// Process-wide settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub assets_dir: PathBuf,
    pub persistence_mode: PersistenceMode,
    pub relay_url: String,
    pub github: GithubConfig,
    pub session_stale_timeout: Duration,
    pub garden: GardenConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("HTTP_PORT").and_then(|s| s.parse().ok()).unwrap_or(4321);
        let assets_dir = PathBuf::from(lookup("ASSETS_DIR").unwrap_or_else(|| "public".into()));

        let persistence_mode = match lookup("PERSISTENCE_MODE") {
            Some(raw) => raw.parse()?,
            None => PersistenceMode::Relay,
        };

        let relay_url = lookup("RELAY_URL")
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}/api/save-shopping-list"));

        let token = lookup("GITHUB_TOKEN").filter(|t| !t.trim().is_empty());
        if token.is_none() {
            warn!("GITHUB_TOKEN not set - saving the shopping list will fail until it is configured");
        }
        let github = GithubConfig {
            api_url: lookup("GITHUB_API_URL").unwrap_or_else(|| "https://api.github.com".into()),
            owner: lookup("GITHUB_OWNER").unwrap_or_else(|| "dhyan6".into()),
            repo: lookup("GITHUB_REPO").unwrap_or_else(|| "veggie-garden".into()),
            branch: lookup("GITHUB_BRANCH").unwrap_or_else(|| "main".into()),
            token,
        };

        let session_stale_timeout = Duration::from_secs(
            lookup("SESSION_STALE_SECS").and_then(|s| s.parse().ok()).unwrap_or(120),
        );

        let garden = match lookup("GARDEN_CONFIG") {
            Some(path) => {
                let garden = GardenConfig::from_path(Path::new(&path))?;
                info!(path = %path, "Loaded garden config");
                garden
            }
            None => GardenConfig::default(),
        };

        Ok(Self {
            host,
            port,
            assets_dir,
            persistence_mode,
            relay_url,
            github,
            session_stale_timeout,
            garden,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity_state::GroundPoint;
    use std::collections::HashMap;

    #[test]
    fn test_default_garden_is_valid() {
        assert!(GardenConfig::default().validate().is_ok());
    }

    #[test]
    fn test_spawn_outside_bounds_is_rejected() {
        let mut config = GardenConfig::default();
        config.collectibles.push(CollectibleSpawn {
            kind: "Carrot".to_string(),
            position: GroundPoint::new(15.0, 0.0),
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_species_is_rejected() {
        let mut config = GardenConfig::default();
        config.actors.push(ActorSpawn {
            species: "Dragon".to_string(),
            position: GroundPoint::new(0.0, 0.0),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Dragon"));
    }

    #[test]
    fn test_huge_or_infinite_wander_values_are_rejected() {
        let rooster = |wander: &str| {
            format!(
                r#"{{ "species": [{{ "name": "Rooster", "color": 0, "model": "rooster.glb",
                    "wander": {{ "speed": 0.03, "pauseMinSecs": 0.5, {wander},
                                 "bobAmplitude": 0.05, "phaseIncrement": 0.2, "baseY": 0.3 }} }}],
                    "actors": [{{ "species": "Rooster", "position": {{ "x": 7.0, "z": -7.0 }} }}] }}"#
            )
        };

        let config: GardenConfig =
            serde_json::from_str(&rooster(r#""pauseMaxSecs": 1e30, "wanderRadius": 12.5"#)).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        // 1e39 overflows f32 to infinity
        let config: GardenConfig =
            serde_json::from_str(&rooster(r#""pauseMaxSecs": 2.5, "wanderRadius": 1e39"#)).unwrap();
        assert!(!config.species.get("Rooster").unwrap().wander.wander_radius.is_finite());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: GardenConfig =
            serde_json::from_str(&rooster(r#""pauseMaxSecs": 2.5, "wanderRadius": 12.5"#)).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: GardenConfig = serde_json::from_str(r#"{ "collectionRadius": 2.0 }"#).unwrap();
        assert_eq!(config.collection_radius, 2.0);
        assert_eq!(config.player_speed, 0.1);
        assert_eq!(config.collectibles.len(), 7);
    }

    #[test]
    fn test_server_config_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("HTTP_PORT", "8080"),
            ("PERSISTENCE_MODE", "Direct"),
            ("GITHUB_TOKEN", "ghp_test"),
            ("GITHUB_OWNER", "someone"),
        ]);
        let config = ServerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.persistence_mode, PersistenceMode::Direct);
        assert_eq!(config.github.owner, "someone");
        assert_eq!(config.github.repo, "veggie-garden");
        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert_eq!(config.relay_url, "http://127.0.0.1:8080/api/save-shopping-list");
    }

    #[test]
    fn test_unknown_persistence_mode_is_an_error() {
        let result = ServerConfig::from_lookup(|key| (key == "PERSISTENCE_MODE").then(|| "carrier-pigeon".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
