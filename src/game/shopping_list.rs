// src/game/shopping_list.rs
// Session tally of collected kinds. Append-only: counts never go down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::kinds::KindTable;

/// Point-in-time copy of the list handed to persistence and the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListSnapshot {
    pub vegetables: BTreeMap<String, u32>,
    pub total: u32,
}

/// Counted totals per collectible kind
#[derive(Debug, Clone, Default)]
pub struct ShoppingList {
    counts: BTreeMap<String, u32>, // Sorted by kind name
}

impl ShoppingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one collection event; returns the kind's new count
    pub fn record(&mut self, kind: &str) -> u32 {
        let count = self.counts.entry(kind.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, kind: &str) -> u32 {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn snapshot(&self) -> ShoppingListSnapshot {
        ShoppingListSnapshot {
            vegetables: self.counts.clone(),
            total: self.total(),
        }
    }

    /// Human-readable `emoji kind (count)` lines, sorted by kind name
    pub fn display_lines(&self, kinds: &KindTable) -> Vec<String> {
        self.counts
            .iter()
            .map(|(kind, count)| format!("{} {} ({})", kinds.emoji_for(kind), kind, count))
            .collect()
    }
}
