//! Interfaces of the external collaborators a batch is applied to.
//!
//! Both traits are synchronous. Hosts that talk to the network or to a GPU
//! asynchronously wrap their clients and block or queue as they see fit.

use serde::{Deserialize, Serialize};

use nv_model::{FileCategory, FileDetails, FileField, PointSetData};

use crate::error::AdapterError;
use crate::snapshot::FileState;

/// The rendering engine.
///
/// Implementations must treat `add` of an already loaded file with the same
/// state as a no-op, and `update`/`set_render_index` of an unknown file as
/// an add.
pub trait RenderEngine {
    /// Load a file. `render_index` is `None` for hidden files.
    fn add(&mut self, file: &FileState, render_index: Option<usize>) -> Result<(), AdapterError>;

    /// Unload a file.
    fn remove(&mut self, file: &FileState) -> Result<(), AdapterError>;

    /// Push new values of the given fields.
    fn update(&mut self, file: &FileState, fields: &[FileField]) -> Result<(), AdapterError>;

    /// Move a file in the draw order. Higher indices are drawn on top.
    fn set_render_index(&mut self, file: &FileState, index: usize) -> Result<(), AdapterError>;
}

/// The backend REST API.
pub trait BackendApi {
    /// Store a new file and return its id.
    fn create(&mut self, request: &CreateFileRequest) -> Result<CreatedFile, AdapterError>;

    /// Update the display settings of a stored file.
    fn edit(&mut self, request: &EditFileRequest) -> Result<(), AdapterError>;

    /// Delete a stored file.
    fn delete(&mut self, request: &DeleteFileRequest) -> Result<(), AdapterError>;
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Display settings shared by create and edit requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSettings {
    pub order: Option<u32>,
    pub visible: bool,
    pub opacity: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_map: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PointSetData>,
}

impl FileSettings {
    /// Settings of a captured file, in backend spelling.
    pub fn of(file: &FileState) -> Self {
        let mut settings = Self {
            order: file.order,
            visible: file.is_checked,
            opacity: file.opacity,
            ..Self::default()
        };
        match &file.details {
            FileDetails::Volume(volume) => {
                settings.color_map = Some(volume.color_map.backend_code().to_string());
                settings.contrast_min = Some(volume.contrast_min);
                settings.contrast_max = Some(volume.contrast_max);
            }
            FileDetails::Surface(surface) => {
                settings.color = Some(surface.color.to_string());
            }
            FileDetails::PointSet(point_set) => {
                settings.data = Some(point_set.data.clone());
            }
        }
        settings
    }
}

/// Upload of a new file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub project_id: u64,
    pub category: FileCategory,
    pub file_name: String,
    pub file_size: u64,
    /// File content, base64 encoded.
    pub base64: String,
    #[serde(flatten)]
    pub settings: FileSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditFileRequest {
    pub id: u64,
    pub category: FileCategory,
    #[serde(flatten)]
    pub settings: FileSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    pub id: u64,
    pub category: FileCategory,
}

/// Backend answer to a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedFile {
    pub id: u64,
    pub url: String,
}
