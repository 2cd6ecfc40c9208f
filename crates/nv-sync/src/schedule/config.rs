//! Sync timing configuration.

use serde::{Deserialize, Serialize};

/// When a session syncs on its own.
///
/// A burst of edits (a drag, a slider) is synced once it settles for
/// `debounce_ms`, but never later than `max_delay_ms` after its first edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync automatically. Explicit syncs run either way.
    pub enabled: bool,
    pub debounce_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

impl SyncConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Clock time at which unsynced edits become due, given when the last
    /// one and the first one happened. `None` when automatic sync is off.
    pub fn due_at(&self, last_change_ms: u64, first_change_ms: u64) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        let settled = last_change_ms.saturating_add(self.debounce_ms);
        let forced = first_change_ms.saturating_add(self.max_delay_ms);
        Some(settled.min(forced))
    }
}
