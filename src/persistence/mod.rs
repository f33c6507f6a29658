// src/persistence/mod.rs
//! Persistence port for the shopping list.
//!
//! Two interchangeable backends commit `data/shopping-list.json` to a GitHub
//! repository: [`github::GithubStore`] calls the contents API directly, and
//! [`relay::RelayStore`] posts to the relay function, which holds the
//! credentials server-side. The backend is picked once at startup from
//! `PERSISTENCE_MODE`.

pub mod github;
pub mod relay;
pub mod save;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{PersistenceMode, ServerConfig};
use crate::game::ShoppingListSnapshot;

/// Path of the committed file inside the repository
pub const SHOPPING_LIST_PATH: &str = "data/shopping-list.json";

/// Timeout applied to every outbound persistence request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The document written to the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListDocument {
    pub date: String, // ISO-8601, UTC
    pub vegetables: BTreeMap<String, u32>,
    pub total: u32,
}

impl ShoppingListDocument {
    pub fn from_snapshot(snapshot: ShoppingListSnapshot, at: DateTime<Utc>) -> Self {
        Self {
            date: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            vegetables: snapshot.vegetables,
            total: snapshot.total,
        }
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub commit: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    /// Missing or placeholder credential. Not retried.
    #[error("{0}")]
    Auth(String),

    /// Non-2xx answer or transport failure; carries the remote message
    #[error("{0}")]
    Network(String),

    /// Nothing collected yet; rejected before any request is made
    #[error("Collect some vegetables first!")]
    EmptyCollection,

    /// 2xx answer we could not understand
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for PersistenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PersistenceError::Network("Request timed out".to_string())
        } else {
            PersistenceError::Network(e.to_string())
        }
    }
}

#[async_trait]
pub trait ShoppingListStore: Send + Sync {
    /// Commit the document; never retried automatically
    async fn save(&self, document: &ShoppingListDocument) -> Result<SaveReceipt, PersistenceError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// Shared HTTP client for outbound persistence calls
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Pick the backend named by the configuration
pub fn build_store(config: &ServerConfig, client: reqwest::Client) -> Arc<dyn ShoppingListStore> {
    match config.persistence_mode {
        PersistenceMode::Direct => {
            info!(owner = %config.github.owner, repo = %config.github.repo, "Saving shopping lists directly to GitHub");
            Arc::new(github::GithubStore::new(client, config.github.clone()))
        }
        PersistenceMode::Relay => {
            info!(relay_url = %config.relay_url, "Saving shopping lists through the relay");
            Arc::new(relay::RelayStore::new(client, config.relay_url.clone()))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that answers with a canned result and counts calls
    pub(crate) struct MockStore {
        calls: AtomicUsize,
        result: Result<SaveReceipt, PersistenceError>,
    }

    impl MockStore {
        pub(crate) fn succeeding(commit: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(SaveReceipt {
                    commit: commit.to_string(),
                    message: "Shopping list saved".to_string(),
                }),
            }
        }

        pub(crate) fn failing(error: PersistenceError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(error),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ShoppingListStore for MockStore {
        async fn save(&self, _document: &ShoppingListDocument) -> Result<SaveReceipt, PersistenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        fn backend(&self) -> &'static str {
            "mock"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_document_shape() {
        let snapshot = ShoppingListSnapshot {
            vegetables: BTreeMap::from([("Carrot".to_string(), 2), ("Tomato".to_string(), 1)]),
            total: 3,
        };
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 12, 30, 0).unwrap();
        let document = ShoppingListDocument::from_snapshot(snapshot, at);

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["date"], "2026-05-01T12:30:00.000Z");
        assert_eq!(json["vegetables"]["Carrot"], 2);
        assert_eq!(json["total"], 3);
    }

    #[test]
    fn test_build_store_follows_mode() {
        let mut config = ServerConfig::from_lookup(|_| None).unwrap();
        let client = reqwest::Client::new();
        assert_eq!(build_store(&config, client.clone()).backend(), "relay");

        config.persistence_mode = PersistenceMode::Direct;
        assert_eq!(build_store(&config, client).backend(), "github");
    }
}
