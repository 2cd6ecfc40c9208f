//! Error types for list reordering.

use thiserror::Error;

use nv_model::{FileHandle, RegistryError};

/// Reorder interaction error.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The file has no row in this list.
    #[error("file {handle} is not in this list")]
    UnknownRow { handle: FileHandle },

    /// A drag is already in progress.
    #[error("already dragging file {handle}")]
    DragInProgress { handle: FileHandle },

    /// The operation requires a drag in progress.
    #[error("no drag in progress")]
    NotDragging,

    /// Committing the result to the registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type alias for reorder operations.
pub type Result<T> = std::result::Result<T, OrderError>;
