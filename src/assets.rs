// src/assets.rs
// Model availability probes. A failed load is never fatal: the slot keeps its placeholder.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use crate::game::entity_state::Representation;

#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("Model {file} not found")]
    NotFound { file: String },

    #[error("Model {file} could not be read: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which stable slot a load result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "slot", content = "index", rename_all = "snake_case")]
pub enum SlotRef {
    Player,
    Collectible(usize),
    Actor(usize),
}

/// A resolved load, applied idempotently to its slot
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub slot: SlotRef,
    pub representation: Representation,
}

#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Resolve a model file to something the renderer can draw
    async fn load(&self, file: &str, scale: f32) -> Result<Representation, AssetLoadError>;
}

/// Serves models from `<root>/models/`, as mounted by the static file route
#[derive(Debug, Clone)]
pub struct FsAssetLoader {
    root: PathBuf,
    url_prefix: String,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url_prefix: "/models".to_string(),
        }
    }
}

#[async_trait]
impl AssetLoader for FsAssetLoader {
    async fn load(&self, file: &str, scale: f32) -> Result<Representation, AssetLoadError> {
        // Only plain file names; layout tables never point outside models/
        if file.is_empty() || file.contains(['/', '\\']) || file.starts_with('.') {
            return Err(AssetLoadError::NotFound { file: file.to_string() });
        }

        let path = self.root.join("models").join(file);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                debug!(file = %file, path = %path.display(), "Model available");
                Ok(Representation::Model {
                    url: format!("{}/{}", self.url_prefix, file),
                    scale,
                })
            }
            Ok(_) => Err(AssetLoadError::NotFound { file: file.to_string() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetLoadError::NotFound { file: file.to_string() })
            }
            Err(source) => Err(AssetLoadError::Io {
                file: file.to_string(),
                source,
            }),
        }
    }
}
