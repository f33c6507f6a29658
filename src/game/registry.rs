// src/game/registry.rs
// Read-side registry of live garden sessions (for /stats and stale cleanup).
// Each session's simulation stays on its own task; this only mirrors summaries.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::entity_state::Position;

/// Summary of one session as last reported by its task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub collected_total: u32,
    pub player_position: Option<Position>,
    pub saves: u32,
    pub last_update: i64, // Unix timestamp
    #[serde(skip)]
    pub last_seen: Instant,
}

impl SessionSummary {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            collected_total: 0,
            player_position: None,
            saves: 0,
            last_update: chrono::Utc::now().timestamp(),
            last_seen: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_update = chrono::Utc::now().timestamp();
        self.last_seen = Instant::now();
    }

    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub sessions: usize,
    pub collected_total: u64,
    pub saves: u64,
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionSummary>>,
    stale_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(stale_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            stale_timeout,
        }
    }

    pub fn register(&self, session_id: &str) {
        self.sessions
            .insert(session_id.to_string(), SessionSummary::new(session_id.to_string()));
        info!(
            session_id = %session_id,
            session_count = self.sessions.len(),
            "Garden session registered"
        );
    }

    /// Refresh position and collected total; called from the session task.
    /// A live session swept as stale reappears on its next update.
    pub fn update(&self, session_id: &str, player_position: Option<Position>, collected_total: u32) {
        let mut summary = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSummary::new(session_id.to_string()));
        summary.player_position = player_position;
        summary.collected_total = collected_total;
        summary.touch();
    }

    pub fn record_save(&self, session_id: &str) {
        if let Some(mut summary) = self.sessions.get_mut(session_id) {
            summary.saves += 1;
            summary.touch();
        }
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionSummary> {
        let removed = self.sessions.remove(session_id).map(|(_, summary)| summary);
        if let Some(ref summary) = removed {
            info!(
                session_id = %session_id,
                collected_total = summary.collected_total,
                session_count = self.sessions.len(),
                "Garden session removed"
            );
        }
        removed
    }

    #[cfg(test)]
    pub fn get(&self, session_id: &str) -> Option<SessionSummary> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            sessions: 0,
            collected_total: 0,
            saves: 0,
        };
        for entry in self.sessions.iter() {
            stats.sessions += 1;
            stats.collected_total += entry.collected_total as u64;
            stats.saves += entry.saves as u64;
        }
        stats
    }

    /// Drop sessions that stopped reporting (socket died without a close)
    pub fn cleanup_stale_sessions(&self) -> Vec<String> {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_stale(self.stale_timeout))
            .map(|entry| entry.key().clone())
            .collect();

        if !stale.is_empty() {
            warn!(
                count = stale.len(),
                timeout_secs = self.stale_timeout.as_secs(),
                "Cleaning up stale garden sessions"
            );
            for session_id in &stale {
                self.remove(session_id);
            }
        }

        stale
    }

    /// Run periodic cleanup task
    pub async fn run_cleanup_task(self, cleanup_interval: Duration) {
        info!(
            cleanup_interval_secs = cleanup_interval.as_secs(),
            stale_timeout_secs = self.stale_timeout.as_secs(),
            "Starting session cleanup task"
        );

        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let stale = self.cleanup_stale_sessions();
            if stale.is_empty() {
                debug!(session_count = self.session_count(), "Session cleanup: no stale sessions");
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_update_remove() {
        let registry = SessionRegistry::default();
        registry.register("a");
        registry.register("b");
        registry.update("a", Some(Position::new(1.0, 0.5, 2.0)), 3);
        registry.record_save("a");
        registry.update("b", None, 1);

        let stats = registry.stats();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.collected_total, 4);
        assert_eq!(stats.saves, 1);

        assert!(registry.remove("a").is_some());
        assert!(registry.get("a").is_none());
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_stale_sessions_are_swept() {
        let registry = SessionRegistry::new(Duration::ZERO);
        registry.register("ghost");
        std::thread::sleep(Duration::from_millis(5));

        let removed = registry.cleanup_stale_sessions();
        assert_eq!(removed, vec!["ghost".to_string()]);
        assert_eq!(registry.session_count(), 0);

        // Still connected after all; the next update brings it back
        registry.update("ghost", None, 2);
        assert_eq!(registry.get("ghost").map(|s| s.collected_total), Some(2));
    }
}
