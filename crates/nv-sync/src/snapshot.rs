//! Immutable captures of registry state.
//!
//! A [`Snapshot`] is the baseline the change detector diffs against. It is
//! captured by value and shared behind an `Arc`, so it can be read from other
//! threads while the registry keeps changing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use nv_model::{
    FileCategory, FileDetails, FileField, FileHandle, FileRegistry, ProjectFile, Provenance,
};

/// Conversion of live state into a snapshot value.
pub trait ToSnapshot {
    /// The snapshot type.
    type Snapshot;

    /// Capture the current state.
    fn to_snapshot(&self) -> Self::Snapshot;
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Identity used to match files across two states.
///
/// Cloud files are matched by backend id, everything else by session handle.
/// A file promoted to the cloud therefore changes identity; sessions capture
/// their new baseline after promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileIdentity {
    Cloud { category: FileCategory, id: u64 },
    Session(FileHandle),
}

impl FileIdentity {
    /// Identity of a registry file.
    pub fn of(file: &ProjectFile) -> Self {
        match file.cloud_id() {
            Some(id) => Self::Cloud {
                category: file.category(),
                id,
            },
            None => Self::Session(file.handle()),
        }
    }
}

// =============================================================================
// FILE STATE
// =============================================================================

/// Captured state of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileState {
    pub identity: FileIdentity,
    pub handle: FileHandle,
    pub name: String,
    pub category: FileCategory,
    pub provenance: Provenance,
    pub is_checked: bool,
    pub order: Option<u32>,
    pub opacity: u8,
    /// Position in the engine's draw order; `None` when not checked.
    pub render_index: Option<usize>,
    pub details: FileDetails,
}

impl FileState {
    fn capture(file: &ProjectFile, render_index: Option<usize>) -> Self {
        Self {
            identity: FileIdentity::of(file),
            handle: file.handle(),
            name: file.name().to_string(),
            category: file.category(),
            provenance: file.provenance(),
            is_checked: file.is_checked(),
            order: file.order(),
            opacity: file.opacity(),
            render_index,
            details: file.details().clone(),
        }
    }

    /// Backend id, if the file is stored in the cloud.
    pub fn cloud_id(&self) -> Option<u64> {
        match self.identity {
            FileIdentity::Cloud { id, .. } => Some(id),
            FileIdentity::Session(_) => None,
        }
    }

    /// Tracked fields that differ between `self` and `other`, in field order.
    ///
    /// Selection state (active file, selected waypoint) is not tracked.
    pub fn changed_fields(&self, other: &FileState) -> Vec<FileField> {
        let mut fields = Vec::new();
        if self.is_checked != other.is_checked {
            fields.push(FileField::Checked);
        }
        if self.order != other.order {
            fields.push(FileField::Order);
        }
        if self.opacity != other.opacity {
            fields.push(FileField::Opacity);
        }

        match (&self.details, &other.details) {
            (FileDetails::Volume(a), FileDetails::Volume(b)) => {
                if a.contrast_min != b.contrast_min || a.contrast_max != b.contrast_max {
                    fields.push(FileField::Contrast);
                }
                if a.color_map != b.color_map {
                    fields.push(FileField::ColorMap);
                }
            }
            (FileDetails::Surface(a), FileDetails::Surface(b)) => {
                if a.color != b.color {
                    fields.push(FileField::Color);
                }
                if a.overlays != b.overlays {
                    fields.push(FileField::Overlays);
                }
                if a.annotations != b.annotations {
                    fields.push(FileField::Annotations);
                }
            }
            (FileDetails::PointSet(a), FileDetails::PointSet(b)) => {
                if a.data.color != b.data.color {
                    fields.push(FileField::Color);
                }
                let mut recolored = a.data.clone();
                recolored.color = b.data.color;
                if recolored != b.data {
                    fields.push(FileField::PointSetData);
                }
            }
            // Identity includes the category, so kinds always match.
            _ => {}
        }
        fields
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

#[derive(Debug, Default)]
struct SnapshotInner {
    project_id: Option<u64>,
    files: BTreeMap<FileIdentity, FileState>,
}

/// The last synchronized registry state. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

impl Snapshot {
    /// A baseline with no files: everything in the registry counts as added.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current state of a registry.
    pub fn capture(registry: &FileRegistry) -> Self {
        let render_indices: HashMap<FileHandle, usize> = FileCategory::TOP_LEVEL
            .into_iter()
            .flat_map(|category| registry.render_order(category))
            .collect();

        let files = registry
            .iter()
            .map(|file| {
                let state = FileState::capture(file, render_indices.get(&file.handle()).copied());
                (state.identity, state)
            })
            .collect();

        Self {
            inner: Arc::new(SnapshotInner {
                project_id: registry.project_id(),
                files,
            }),
        }
    }

    pub fn project_id(&self) -> Option<u64> {
        self.inner.project_id
    }

    pub fn get(&self, identity: &FileIdentity) -> Option<&FileState> {
        self.inner.files.get(identity)
    }

    /// Files in identity order.
    pub fn files(&self) -> impl Iterator<Item = &FileState> {
        self.inner.files.values()
    }

    pub fn len(&self) -> usize {
        self.inner.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.files.is_empty()
    }
}

impl ToSnapshot for FileRegistry {
    type Snapshot = Snapshot;

    fn to_snapshot(&self) -> Snapshot {
        Snapshot::capture(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nv_model::{InMemoryFile, Rgb, Waypoint};

    fn registry() -> (FileRegistry, Vec<FileHandle>) {
        let mut registry = FileRegistry::new();
        let added = registry
            .add_local_files([
                InMemoryFile::new("a.mgz", b"a".to_vec()).shared(),
                InMemoryFile::new("b.mgz", b"b".to_vec()).shared(),
                InMemoryFile::new("lh.pial", b"c".to_vec()).shared(),
            ])
            .added;
        (registry, added)
    }

    #[test]
    fn test_capture_render_indices() {
        let (mut registry, added) = registry();
        registry.set_checked(added[1], false).unwrap();
        let snapshot = registry.to_snapshot();

        let a = snapshot.get(&FileIdentity::Session(added[0])).unwrap();
        let b = snapshot.get(&FileIdentity::Session(added[1])).unwrap();
        let pial = snapshot.get(&FileIdentity::Session(added[2])).unwrap();
        assert_eq!(a.render_index, Some(0));
        assert_eq!(b.render_index, None);
        assert_eq!(pial.render_index, Some(0));
    }

    #[test]
    fn test_snapshot_is_detached_from_registry() {
        let (mut registry, added) = registry();
        let snapshot = Snapshot::capture(&registry);
        registry.set_opacity(added[0], 10).unwrap();
        let state = snapshot.get(&FileIdentity::Session(added[0])).unwrap();
        assert_eq!(state.opacity, 100);
    }

    #[test]
    fn test_identity_follows_promotion() {
        let (mut registry, added) = registry();
        registry
            .promote_to_cloud(added[0], 5, FileCategory::Volume.cloud_url(5))
            .unwrap();
        let snapshot = Snapshot::capture(&registry);
        let state = snapshot
            .get(&FileIdentity::Cloud {
                category: FileCategory::Volume,
                id: 5,
            })
            .unwrap();
        assert_eq!(state.cloud_id(), Some(5));
        assert_eq!(state.provenance, Provenance::Cloud);
    }

    #[test]
    fn test_point_set_fields() {
        let mut registry = FileRegistry::new();
        let handle = registry.create_cached_point_set("pts", Rgb::WHITE).unwrap();
        let before = Snapshot::capture(&registry);

        registry.set_color(handle, Rgb([1, 2, 3])).unwrap();
        let mut data = registry.get(handle).unwrap().point_set().unwrap().data.clone();
        data.points.push(Waypoint::at(1.0, 2.0, 3.0));
        registry.set_point_set_data(handle, data).unwrap();
        let after = Snapshot::capture(&registry);

        let identity = FileIdentity::Session(handle);
        let fields = before
            .get(&identity)
            .unwrap()
            .changed_fields(after.get(&identity).unwrap());
        assert_eq!(fields, vec![FileField::Color, FileField::PointSetData]);
    }

    #[test]
    fn test_selection_is_not_tracked() {
        let (mut registry, added) = registry();
        let before = Snapshot::capture(&registry);
        registry.set_active(added[0]).unwrap();
        let after = Snapshot::capture(&registry);
        let identity = FileIdentity::Session(added[0]);
        assert!(
            before
                .get(&identity)
                .unwrap()
                .changed_fields(after.get(&identity).unwrap())
                .is_empty()
        );
    }
}
