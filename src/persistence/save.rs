// src/persistence/save.rs
// Save button state and status line. Decides whether a save may start and
// what the player sees when it ends; the network call itself is elsewhere.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{PersistenceError, SaveReceipt, ShoppingListDocument};
use crate::game::ShoppingList;

/// Successful saves keep the button disabled this long
pub const REENABLE_AFTER_SUCCESS: Duration = Duration::from_secs(3);

/// Success and error statuses fade after this long
pub const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Status line plus save button state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStatus {
    pub kind: StatusKind,
    pub message: String,
    pub button_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear_after_ms: Option<u64>,
}

impl SaveStatus {
    fn new(kind: StatusKind, message: impl Into<String>, button_enabled: bool) -> Self {
        let clear_after_ms = match kind {
            StatusKind::Info => None,
            StatusKind::Success | StatusKind::Error => Some(STATUS_CLEAR_AFTER.as_millis() as u64),
        };
        Self {
            kind,
            message: message.into(),
            button_enabled,
            clear_after_ms,
        }
    }
}

/// Outcome of pressing the save button
#[derive(Debug, Clone, PartialEq)]
pub enum SaveStart {
    /// Dispatch `document`; show `status` meanwhile
    Started {
        document: ShoppingListDocument,
        status: SaveStatus,
    },
    /// Rejected locally, nothing is sent
    Rejected(SaveStatus),
    /// A save is already in flight; the press is ignored
    Busy,
}

#[derive(Debug)]
pub struct SaveController {
    in_flight: bool,
    button_enabled: bool,
}

impl SaveController {
    pub fn new() -> Self {
        Self {
            in_flight: false,
            button_enabled: true,
        }
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn button_enabled(&self) -> bool {
        self.button_enabled
    }

    pub fn begin(&mut self, list: &ShoppingList, at: DateTime<Utc>) -> SaveStart {
        if self.in_flight || !self.button_enabled {
            return SaveStart::Busy;
        }
        if list.is_empty() {
            let err = PersistenceError::EmptyCollection;
            return SaveStart::Rejected(SaveStatus::new(StatusKind::Error, err.to_string(), true));
        }

        self.in_flight = true;
        self.button_enabled = false;
        SaveStart::Started {
            document: ShoppingListDocument::from_snapshot(list.snapshot(), at),
            status: SaveStatus::new(StatusKind::Info, "Saving your list...", false),
        }
    }

    /// Settle an in-flight save. On success the button stays disabled until
    /// [`SaveController::reenable`] runs after [`REENABLE_AFTER_SUCCESS`].
    pub fn finish(&mut self, result: &Result<SaveReceipt, PersistenceError>) -> SaveStatus {
        self.in_flight = false;
        match result {
            Ok(receipt) => {
                info!(commit = %receipt.commit, "Shopping list save succeeded");
                SaveStatus::new(StatusKind::Success, format!("List saved! ({})", short_commit(&receipt.commit)), false)
            }
            Err(e) => {
                warn!(error = %e, "Shopping list save failed");
                self.button_enabled = true;
                SaveStatus::new(StatusKind::Error, format!("Error: {}", e), true)
            }
        }
    }

    /// Turn the button back on after a successful save
    pub fn reenable(&mut self) -> bool {
        if self.in_flight || self.button_enabled {
            return false;
        }
        self.button_enabled = true;
        true
    }
}

impl Default for SaveController {
    fn default() -> Self {
        Self::new()
    }
}

fn short_commit(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_empty_list_is_rejected_locally() {
        let mut controller = SaveController::new();
        let start = controller.begin(&ShoppingList::new(), at());

        let SaveStart::Rejected(status) = start else {
            panic!("expected rejection");
        };
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.message, "Collect some vegetables first!");
        assert!(status.button_enabled);
        assert!(!controller.in_flight());
    }

    #[test]
    fn test_start_disables_button_and_blocks_second_press() {
        let mut controller = SaveController::new();
        let mut list = ShoppingList::new();
        list.record("Carrot");

        let SaveStart::Started { document, status } = controller.begin(&list, at()) else {
            panic!("expected start");
        };
        assert_eq!(document.total, 1);
        assert_eq!(status.kind, StatusKind::Info);
        assert!(!status.button_enabled);
        assert!(controller.in_flight());

        assert_eq!(controller.begin(&list, at()), SaveStart::Busy);
    }

    #[test]
    fn test_failure_reenables_immediately() {
        let mut controller = SaveController::new();
        let mut list = ShoppingList::new();
        list.record("Carrot");
        controller.begin(&list, at());

        let status = controller.finish(&Err(PersistenceError::Network("sha mismatch".to_string())));
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.message, "Error: sha mismatch");
        assert!(status.button_enabled);
        assert_eq!(status.clear_after_ms, Some(5_000));
        assert!(controller.button_enabled());
        assert_eq!(list.count("Carrot"), 1);
    }

    #[test]
    fn test_success_waits_for_reenable() {
        let mut controller = SaveController::new();
        let mut list = ShoppingList::new();
        list.record("Tomato");
        controller.begin(&list, at());

        let receipt = SaveReceipt {
            commit: "0123456789abcdef".to_string(),
            message: "Shopping list saved".to_string(),
        };
        let status = controller.finish(&Ok(receipt));
        assert_eq!(status.kind, StatusKind::Success);
        assert_eq!(status.message, "List saved! (0123456)");
        assert!(!status.button_enabled);
        assert_eq!(controller.begin(&list, at()), SaveStart::Busy);

        assert!(controller.reenable());
        assert!(!controller.reenable());
        assert!(matches!(controller.begin(&list, at()), SaveStart::Started { .. }));
    }
}
