//! File categories, provenance and session handles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of imaging artifact a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    /// Volumetric image (NIfTI, MGZ).
    Volume,
    /// Surface mesh (FreeSurfer pial, white, ...).
    Surface,
    /// Set of annotated waypoints.
    PointSet,
    /// Per-vertex overlay attached to a surface.
    Overlay,
    /// Annotation attached to a surface.
    Annotation,
}

impl FileCategory {
    /// Categories that have their own top-level collection in a project.
    pub const TOP_LEVEL: [FileCategory; 3] = [Self::Volume, Self::Surface, Self::PointSet];

    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Volume => "Volume",
            Self::Surface => "Surface",
            Self::PointSet => "Point Set",
            Self::Overlay => "Overlay",
            Self::Annotation => "Annotation",
        }
    }

    /// Resource name of the category in the backend REST API.
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Volume => "Volume",
            Self::Surface => "Surface",
            Self::PointSet => "PointSet",
            Self::Overlay => "Overlay",
            Self::Annotation => "Annotation",
        }
    }

    /// Backend download url of a stored file.
    pub fn cloud_url(&self, id: u64) -> String {
        format!("/api/{}?Id={}", self.api_name(), id)
    }

    /// Whether files of this category live in a top-level collection.
    pub fn is_top_level(&self) -> bool {
        matches!(self, Self::Volume | Self::Surface | Self::PointSet)
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Volume => "volume",
            Self::Surface => "surface",
            Self::PointSet => "point set",
            Self::Overlay => "overlay",
            Self::Annotation => "annotation",
        };
        f.write_str(name)
    }
}

/// Where a file's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Picked from the local drive, not uploaded yet.
    Local,
    /// Stored in the backend.
    Cloud,
    /// Held in memory only (e.g. a freshly drawn point set).
    Cached,
}

impl Provenance {
    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Cloud => "Cloud",
            Self::Cached => "Cached",
        }
    }
}

/// Session-scoped identity of a file in the registry.
///
/// Handles are assigned in increasing order, so comparing two handles
/// compares insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(u64);

impl FileHandle {
    /// Create a handle from its raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
