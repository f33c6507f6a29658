// src/persistence/github.rs
// Direct commit through the GitHub contents API: GET the current sha, then PUT.

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use http::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{PersistenceError, SaveReceipt, ShoppingListDocument, ShoppingListStore, SHOPPING_LIST_PATH};
use crate::config::GithubConfig;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Value shipped in sample configs; treated the same as no token
const PLACEHOLDER_TOKEN: &str = "YOUR_GITHUB_TOKEN";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GithubErrorBody {
    message: Option<String>,
}

pub struct GithubStore {
    client: reqwest::Client,
    config: GithubConfig,
}

impl GithubStore {
    pub fn new(client: reqwest::Client, config: GithubConfig) -> Self {
        Self { client, config }
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            SHOPPING_LIST_PATH
        )
    }

    fn token(&self) -> Result<&str, PersistenceError> {
        match self.config.token.as_deref() {
            Some(token) if !token.trim().is_empty() && token != PLACEHOLDER_TOKEN => Ok(token),
            _ => Err(PersistenceError::Auth("GitHub token not configured".to_string())),
        }
    }

    /// Sha of the existing file, if any. Every failure here means "create a new file".
    async fn current_sha(&self, token: &str) -> Option<String> {
        let response = match self
            .client
            .get(self.contents_url())
            .bearer_auth(token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Could not read existing shopping list, will create a new file");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Shopping list does not exist yet, will create a new file");
            return None;
        }

        match response.json::<ContentsResponse>().await {
            Ok(contents) => Some(contents.sha),
            Err(e) => {
                warn!(error = %e, "Existing shopping list metadata unreadable, will create a new file");
                None
            }
        }
    }
}

#[async_trait]
impl ShoppingListStore for GithubStore {
    async fn save(&self, document: &ShoppingListDocument) -> Result<SaveReceipt, PersistenceError> {
        let token = self.token()?;
        let sha = self.current_sha(token).await;

        let pretty = serde_json::to_string_pretty(document)
            .map_err(|e| PersistenceError::InvalidResponse(e.to_string()))?;
        let body = PutContentsRequest {
            message: format!("Update shopping list - {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
            content: base64::engine::general_purpose::STANDARD.encode(pretty.as_bytes()),
            branch: &self.config.branch,
            sha,
        };

        debug!(
            repo = %self.config.repo,
            updating = body.sha.is_some(),
            total = document.total,
            "Committing shopping list"
        );

        let response = self
            .client
            .put(self.contents_url())
            .bearer_auth(token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<GithubErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Failed to commit to GitHub".to_string());
            warn!(status = %status, error = %message, "GitHub rejected shopping list commit");
            return Err(PersistenceError::Network(message));
        }

        let result: PutContentsResponse = response
            .json()
            .await
            .map_err(|e| PersistenceError::InvalidResponse(e.to_string()))?;

        info!(commit = %result.commit.sha, total = document.total, "Shopping list committed to GitHub");

        Ok(SaveReceipt {
            commit: result.commit.sha,
            message: "Shopping list saved".to_string(),
        })
    }

    fn backend(&self) -> &'static str {
        "github"
    }
}
