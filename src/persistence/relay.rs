// src/persistence/relay.rs
// Relayed commit: POST the document to the relay function, which owns the GitHub token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{PersistenceError, SaveReceipt, ShoppingListDocument, ShoppingListStore};

/// Body returned by the relay function, on success and on failure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RelayStore {
    client: reqwest::Client,
    url: String,
}

impl RelayStore {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl ShoppingListStore for RelayStore {
    async fn save(&self, document: &ShoppingListDocument) -> Result<SaveReceipt, PersistenceError> {
        let response = self.client.post(&self.url).json(document).send().await?;
        let status = response.status();
        let body: RelayResponse = response.json().await.unwrap_or_default();

        if !status.is_success() || !body.success {
            let message = body
                .error
                .unwrap_or_else(|| format!("Save failed: {}", status));
            warn!(status = %status, error = %message, "Relay rejected shopping list");
            return Err(PersistenceError::Network(message));
        }

        let commit = body
            .commit
            .ok_or_else(|| PersistenceError::InvalidResponse("relay response has no commit".to_string()))?;
        info!(commit = %commit, total = document.total, "Shopping list saved through relay");

        Ok(SaveReceipt {
            commit,
            message: body.message.unwrap_or_else(|| "Shopping list saved".to_string()),
        })
    }

    fn backend(&self) -> &'static str {
        "relay"
    }
}
