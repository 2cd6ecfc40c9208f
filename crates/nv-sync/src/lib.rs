//! Change detection and sync for neuroview projects.
//!
//! The registry is the source of truth; the rendering engine and the
//! backend are reconciled with it by diffing:
//!
//! 1. [`Snapshot::capture`] freezes the last synced state.
//! 2. [`ChangeDetector::detect`] diffs it against the live registry into a
//!    [`ChangeBatch`] of removals, additions, updates and draw-order changes.
//! 3. [`apply_batch`] drives the [`RenderEngine`] and [`BackendApi`] adapters.
//! 4. On success, [`SyncSession`] merges new backend ids and captures the
//!    next snapshot. On failure the snapshot stays put and the same changes
//!    are detected again.
//!
//! # Architecture
//!
//! - `snapshot.rs` - File identity, captured file state, snapshots
//! - `batch.rs` - Change batches and the detector
//! - `adapter.rs` - Adapter traits and request types
//! - `apply.rs` - Applying a batch to the adapters
//! - `session.rs` - Snapshot ownership across sync cycles
//! - `schedule/` - Debounced sync timing (SyncTracker, config)
//! - `memory.rs` - In-memory adapters

mod adapter;
mod apply;
mod batch;
mod error;
mod memory;
mod schedule;
mod session;
mod snapshot;

pub use adapter::{
    BackendApi, CreateFileRequest, CreatedFile, DeleteFileRequest, EditFileRequest, FileSettings,
    RenderEngine,
};
pub use apply::{ApplyReport, apply_batch};
pub use batch::{ChangeBatch, ChangeDetector, FileUpdate, Operation, RenderIndexChange};
pub use error::{AdapterError, Result, SyncError};
pub use memory::{
    BackendCall, EngineCall, EngineKey, LoadedFile, MemoryBackend, RecordingEngine, StoredFile,
};
pub use schedule::{SyncConfig, SyncTracker};
pub use session::SyncSession;
pub use snapshot::{FileIdentity, FileState, Snapshot, ToSnapshot};
