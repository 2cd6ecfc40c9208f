//! Error types for the project file model.
//!
//! File-level errors (`FileError`) are recoverable and reported per file.
//! Registry errors (`RegistryError`) signal misuse of a handle, invalid
//! values or a broken invariant.

use thiserror::Error;

use crate::category::{FileCategory, FileHandle};

/// Per-file error raised while adding or reading a file.
#[derive(Debug, Error)]
pub enum FileError {
    /// Extension maps to no known category.
    #[error("unsupported file type: {name}")]
    UnsupportedFileType { name: String },

    /// A file with the same name already exists in the category.
    #[error("a {category} named '{name}' already exists")]
    DuplicateName { name: String, category: FileCategory },

    /// Reading the raw bytes failed.
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Serializing in-memory content failed.
    #[error("failed to encode {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FileError {
    /// Name of the file the error refers to.
    pub fn file_name(&self) -> &str {
        match self {
            Self::UnsupportedFileType { name }
            | Self::DuplicateName { name, .. }
            | Self::Read { name, .. }
            | Self::Encode { name, .. } => name,
        }
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedFileType { name } => {
                format!("'{}' is not a supported volume, surface or point set file.", name)
            }
            Self::DuplicateName { name, category } => {
                format!(
                    "'{}' was not added because the project already contains a {} with that name.",
                    name,
                    category
                )
            }
            Self::Read { name, .. } => format!("Could not read '{}'.", name),
            Self::Encode { name, .. } => format!("Could not prepare '{}' for upload.", name),
        }
    }
}

/// Registry operation error.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The handle does not refer to a file in the registry.
    #[error("no file with handle {handle}")]
    UnknownFile { handle: FileHandle },

    /// The operation does not apply to the file's category.
    #[error("file {handle} is a {found}, expected a {expected}")]
    WrongCategory {
        handle: FileHandle,
        expected: FileCategory,
        found: FileCategory,
    },

    /// A field value is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// A backend project entry could not be turned into a file.
    #[error("invalid backend file '{name}': {reason}")]
    InvalidBackendFile { name: String, reason: String },

    /// More than one file is active. Indicates a bug in the registry.
    #[error("{count} files are active at once")]
    InvalidActiveState { count: usize },

    /// File-level failure while mutating the registry.
    #[error(transparent)]
    File(#[from] FileError),
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FileError::DuplicateName {
            name: "brain.nii.gz".to_string(),
            category: FileCategory::Volume,
        };
        assert_eq!(err.to_string(), "a volume named 'brain.nii.gz' already exists");
        assert_eq!(err.file_name(), "brain.nii.gz");
    }

    #[test]
    fn test_user_message_mentions_name() {
        let err = FileError::UnsupportedFileType {
            name: "notes.txt".to_string(),
        };
        assert!(err.user_message().contains("notes.txt"));
    }
}
