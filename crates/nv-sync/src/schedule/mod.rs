//! Deciding when to run a sync cycle.
//!
//! Provides:
//! - `SyncTracker` - Tracks unsynced registry changes with debounce
//! - `SyncConfig` - User settings for sync timing

mod config;
mod tracker;

pub use config::SyncConfig;
pub use tracker::SyncTracker;
