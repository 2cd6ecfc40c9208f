//! Project files and their category-specific details.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};

use crate::category::{FileCategory, FileHandle, Provenance};
use crate::color::{ColorMap, Rgb};
use crate::error::FileError;
use crate::point_set::PointSetData;
use crate::raw::{RawFile, SharedRawFile};

/// Default opacity in percent.
pub const DEFAULT_OPACITY: u8 = 100;

// =============================================================================
// LOCATION
// =============================================================================

/// Where the bytes of a file live, with the data each variant needs.
#[derive(Debug, Clone)]
pub enum FileLocation {
    /// Picked from the user's drive; read on demand.
    Local(SharedRawFile),
    /// Persisted in the backend.
    Cloud { id: u64, url: String },
    /// Held in memory (content is part of the file details).
    Cached,
}

impl FileLocation {
    /// Provenance tag of this location.
    pub fn provenance(&self) -> Provenance {
        match self {
            Self::Local(_) => Provenance::Local,
            Self::Cloud { .. } => Provenance::Cloud,
            Self::Cached => Provenance::Cached,
        }
    }

    /// Backend id for cloud files.
    pub fn cloud_id(&self) -> Option<u64> {
        match self {
            Self::Cloud { id, .. } => Some(*id),
            Self::Local(_) | Self::Cached => None,
        }
    }
}

impl PartialEq for FileLocation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Local(a), Self::Local(b)) => std::sync::Arc::ptr_eq(a, b),
            (Self::Cloud { id: a, url: ua }, Self::Cloud { id: b, url: ub }) => a == b && ua == ub,
            (Self::Cached, Self::Cached) => true,
            _ => false,
        }
    }
}

impl Serialize for FileLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(tag = "provenance", rename_all = "snake_case")]
        enum Repr<'a> {
            Local { size: u64 },
            Cloud { id: u64, url: &'a str },
            Cached,
        }

        let repr = match self {
            Self::Local(raw) => Repr::Local {
                size: raw.byte_size(),
            },
            Self::Cloud { id, url } => Repr::Cloud { id: *id, url },
            Self::Cached => Repr::Cached,
        };
        repr.serialize(serializer)
    }
}

// =============================================================================
// DETAILS
// =============================================================================

/// Display settings of a volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeDetails {
    pub contrast_min: f64,
    pub contrast_max: f64,
    pub color_map: ColorMap,
}

impl Default for VolumeDetails {
    fn default() -> Self {
        Self {
            contrast_min: 0.0,
            contrast_max: 100.0,
            color_map: ColorMap::Gray,
        }
    }
}

/// An overlay or annotation attached to a surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachedFile {
    pub name: String,
    pub category: FileCategory,
    pub location: FileLocation,
    /// Selected overlay of the owning surface. Independent of the
    /// project-wide active file.
    pub is_active: bool,
}

/// Display settings and attachments of a surface mesh.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SurfaceDetails {
    pub color: Rgb,
    pub overlays: Vec<AttachedFile>,
    pub annotations: Vec<AttachedFile>,
}

impl SurfaceDetails {
    /// Attachments of one kind.
    pub fn attachments(&self, category: FileCategory) -> &[AttachedFile] {
        match category {
            FileCategory::Overlay => &self.overlays,
            FileCategory::Annotation => &self.annotations,
            _ => &[],
        }
    }
}

/// Content and selection of a point set.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PointSetDetails {
    pub data: PointSetData,
    pub selected_waypoint: usize,
}

/// Category-specific part of a project file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileDetails {
    Volume(VolumeDetails),
    Surface(SurfaceDetails),
    PointSet(PointSetDetails),
}

impl FileDetails {
    /// Default details for a top-level category.
    pub fn for_category(category: FileCategory) -> Option<Self> {
        match category {
            FileCategory::Volume => Some(Self::Volume(VolumeDetails::default())),
            FileCategory::Surface => Some(Self::Surface(SurfaceDetails::default())),
            FileCategory::PointSet => Some(Self::PointSet(PointSetDetails::default())),
            FileCategory::Overlay | FileCategory::Annotation => None,
        }
    }

    /// Category the details belong to.
    pub fn category(&self) -> FileCategory {
        match self {
            Self::Volume(_) => FileCategory::Volume,
            Self::Surface(_) => FileCategory::Surface,
            Self::PointSet(_) => FileCategory::PointSet,
        }
    }
}

/// Mutable field of a project file, as reported in change events and diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileField {
    Checked,
    Order,
    Opacity,
    Contrast,
    ColorMap,
    Color,
    Overlays,
    Annotations,
    PointSetData,
    SelectedWaypoint,
}

// =============================================================================
// PROJECT FILE
// =============================================================================

/// One loaded volume, surface or point set.
///
/// Fields are only mutated through [`FileRegistry`](crate::FileRegistry),
/// which enforces the project-wide invariants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFile {
    pub(crate) handle: FileHandle,
    pub(crate) name: String,
    pub(crate) location: FileLocation,
    pub(crate) is_active: bool,
    pub(crate) is_checked: bool,
    pub(crate) order: Option<u32>,
    pub(crate) opacity: u8,
    pub(crate) size: u64,
    pub(crate) details: FileDetails,
}

impl ProjectFile {
    pub(crate) fn new(
        handle: FileHandle,
        name: String,
        location: FileLocation,
        size: u64,
        details: FileDetails,
    ) -> Self {
        Self {
            handle,
            name,
            location,
            is_active: false,
            is_checked: true,
            order: None,
            opacity: DEFAULT_OPACITY,
            size,
            details,
        }
    }

    #[inline]
    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn category(&self) -> FileCategory {
        self.details.category()
    }

    #[inline]
    pub fn location(&self) -> &FileLocation {
        &self.location
    }

    #[inline]
    pub fn provenance(&self) -> Provenance {
        self.location.provenance()
    }

    #[inline]
    pub fn cloud_id(&self) -> Option<u64> {
        self.location.cloud_id()
    }

    /// Selected for detail editing. At most one file per project.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Visible in the render view.
    #[inline]
    pub fn is_checked(&self) -> bool {
        self.is_checked
    }

    /// User-assigned rank, `None` until first placed.
    #[inline]
    pub fn order(&self) -> Option<u32> {
        self.order
    }

    /// Opacity in percent.
    #[inline]
    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    /// Size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn details(&self) -> &FileDetails {
        &self.details
    }

    pub fn volume(&self) -> Option<&VolumeDetails> {
        match &self.details {
            FileDetails::Volume(details) => Some(details),
            _ => None,
        }
    }

    pub fn surface(&self) -> Option<&SurfaceDetails> {
        match &self.details {
            FileDetails::Surface(details) => Some(details),
            _ => None,
        }
    }

    pub fn point_set(&self) -> Option<&PointSetDetails> {
        match &self.details {
            FileDetails::PointSet(details) => Some(details),
            _ => None,
        }
    }

    /// Sort key for list order: placed files by `order`, then unplaced
    /// files, ties broken by insertion sequence.
    pub fn list_key(&self) -> (bool, u32, FileHandle) {
        (self.order.is_none(), self.order.unwrap_or(0), self.handle)
    }

    /// Content as base64 for an upload.
    ///
    /// Local files are read from their source at call time, cached point
    /// sets are serialized from memory. Cloud files have no local content
    /// and yield `None`.
    pub fn to_base64(&self) -> Result<Option<String>, FileError> {
        match &self.location {
            FileLocation::Local(raw) => {
                let bytes = raw.read_bytes().map_err(|source| FileError::Read {
                    name: self.name.clone(),
                    source,
                })?;
                Ok(Some(STANDARD.encode(bytes)))
            }
            FileLocation::Cached => match &self.details {
                FileDetails::PointSet(point_set) => {
                    let bytes =
                        serde_json::to_vec(&point_set.data).map_err(|source| FileError::Encode {
                            name: self.name.clone(),
                            source,
                        })?;
                    Ok(Some(STANDARD.encode(bytes)))
                }
                FileDetails::Volume(_) | FileDetails::Surface(_) => Ok(None),
            },
            FileLocation::Cloud { .. } => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{InMemoryFile, RawFile};

    fn local_volume(handle: u64, name: &str, bytes: &[u8]) -> ProjectFile {
        let raw = InMemoryFile::new(name, bytes.to_vec()).shared();
        let size = raw.byte_size();
        ProjectFile::new(
            FileHandle::from_raw(handle),
            name.to_string(),
            FileLocation::Local(raw),
            size,
            FileDetails::Volume(VolumeDetails::default()),
        )
    }

    #[test]
    fn test_new_file_defaults() {
        let file = local_volume(1, "brain.nii.gz", b"x");
        assert!(file.is_checked());
        assert!(!file.is_active());
        assert_eq!(file.order(), None);
        assert_eq!(file.opacity(), DEFAULT_OPACITY);
        assert_eq!(file.provenance(), Provenance::Local);
    }

    #[test]
    fn test_local_base64_reads_source() {
        let file = local_volume(1, "brain.nii.gz", b"hello");
        assert_eq!(file.to_base64().unwrap().as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn test_cloud_has_no_local_content() {
        let mut file = local_volume(1, "brain.nii.gz", b"hello");
        file.location = FileLocation::Cloud {
            id: 5,
            url: "/api/Volume?Id=5".to_string(),
        };
        assert_eq!(file.to_base64().unwrap(), None);
        assert_eq!(file.cloud_id(), Some(5));
    }

    #[test]
    fn test_list_key_puts_unplaced_last() {
        let mut placed = local_volume(9, "a.mgz", b"");
        placed.order = Some(3);
        let unplaced = local_volume(1, "b.mgz", b"");
        assert!(placed.list_key() < unplaced.list_key());
    }
}
