//! Error types for change detection and sync.

use thiserror::Error;

use nv_model::{FileError, RegistryError};

/// Error reported by a render engine or backend adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The collaborator refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The collaborator could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Sync cycle error.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An adapter call failed. The snapshot is not advanced.
    #[error("{operation} of '{name}' failed: {source}")]
    Adapter {
        operation: &'static str,
        name: String,
        #[source]
        source: AdapterError,
    },

    /// Reading a file's content for upload failed.
    #[error(transparent)]
    File(#[from] FileError),

    /// Merging backend ids into the registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SyncError {
    pub(crate) fn adapter(operation: &'static str, name: &str, source: AdapterError) -> Self {
        Self::Adapter {
            operation,
            name: name.to_string(),
            source,
        }
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Adapter { name, source, .. } => match source {
                AdapterError::Unavailable(_) => {
                    format!("Could not reach the server while saving '{}'.", name)
                }
                AdapterError::Rejected(reason) => {
                    format!("The server rejected the changes to '{}': {}", name, reason)
                }
            },
            Self::File(err) => err.user_message(),
            Self::Registry(err) => format!("Could not update the project: {}", err),
        }
    }

    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Adapter {
                source: AdapterError::Unavailable(_),
                ..
            } => Some("Check your connection. Changes are kept and retried on the next sync."),
            Self::File(FileError::Read { .. }) => {
                Some("Check that the file still exists and is readable.")
            }
            _ => None,
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
