//! Minimal change sets between two registry states.

use serde::Serialize;

use nv_model::{FileField, FileRegistry};

use crate::snapshot::{FileState, Snapshot};

/// A file present in both states with at least one tracked field changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileUpdate {
    pub before: FileState,
    pub after: FileState,
    /// Changed fields, in [`FileField`] order.
    pub fields: Vec<FileField>,
}

/// A surviving checked file whose draw position changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderIndexChange {
    pub file: FileState,
    pub index: usize,
}

/// One step of applying a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation<'a> {
    Remove(&'a FileState),
    Add(&'a FileState),
    Upload(&'a FileState),
    Update(&'a FileUpdate),
    Reindex(&'a RenderIndexChange),
}

/// Result of diffing a snapshot against the current state.
///
/// Added files carry their full state, so they never appear in `updated` as
/// well. Lists are in identity order, which makes detection deterministic.
///
/// When the registry was bound to a backend project since the baseline,
/// every surviving file without a backend id is listed in `uploads`, unless
/// it is already in `updated` (updates of such files create them too).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeBatch {
    pub added: Vec<FileState>,
    pub removed: Vec<FileState>,
    pub updated: Vec<FileUpdate>,
    /// Unchanged files that still have to be stored in a newly bound project.
    pub uploads: Vec<FileState>,
    pub render_order: Vec<RenderIndexChange>,
}

impl ChangeBatch {
    /// Diff two snapshots.
    pub fn between(previous: &Snapshot, current: &Snapshot) -> Self {
        let mut batch = Self::default();
        let rebound = current.project_id().is_some() && previous.project_id() != current.project_id();

        for before in previous.files() {
            if current.get(&before.identity).is_none() {
                batch.removed.push(before.clone());
            }
        }

        for after in current.files() {
            let Some(before) = previous.get(&after.identity) else {
                batch.added.push(after.clone());
                continue;
            };

            let fields = before.changed_fields(after);
            if !fields.is_empty() {
                batch.updated.push(FileUpdate {
                    before: before.clone(),
                    after: after.clone(),
                    fields,
                });
            } else if rebound && after.cloud_id().is_none() {
                batch.uploads.push(after.clone());
            }

            if let Some(index) = after.render_index
                && before.render_index != Some(index)
            {
                batch.render_order.push(RenderIndexChange {
                    file: after.clone(),
                    index,
                });
            }
        }

        batch
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.updated.is_empty()
            && self.uploads.is_empty()
            && self.render_order.is_empty()
    }

    /// Number of operations in the batch.
    pub fn len(&self) -> usize {
        self.added.len()
            + self.removed.len()
            + self.updated.len()
            + self.uploads.len()
            + self.render_order.len()
    }

    /// Operations in application order: removals first, so a file swapped
    /// for one with the same name never collides, then additions, uploads,
    /// updates and finally draw-order changes.
    pub fn operations(&self) -> impl Iterator<Item = Operation<'_>> {
        self.removed
            .iter()
            .map(Operation::Remove)
            .chain(self.added.iter().map(Operation::Add))
            .chain(self.uploads.iter().map(Operation::Upload))
            .chain(self.updated.iter().map(Operation::Update))
            .chain(self.render_order.iter().map(Operation::Reindex))
    }
}

/// Computes [`ChangeBatch`]es against the live registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    /// Diff a baseline snapshot against the registry. Pure: the same inputs
    /// always produce the same batch.
    pub fn detect(previous: &Snapshot, registry: &FileRegistry) -> ChangeBatch {
        ChangeBatch::between(previous, &Snapshot::capture(registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nv_model::{BackendProject, FileCategory, FileHandle, InMemoryFile, VolumeDto};

    fn volume_dto(id: u64, name: &str) -> VolumeDto {
        VolumeDto {
            id,
            file_name: name.to_string(),
            file_size: 1,
            order: Some(0),
            visible: true,
            opacity: None,
            color_map: None,
            contrast_min: None,
            contrast_max: None,
        }
    }

    #[test]
    fn test_empty_against_itself() {
        let mut registry = FileRegistry::new();
        registry.add_local_files([InMemoryFile::new("a.mgz", b"a".to_vec()).shared()]);
        let snapshot = Snapshot::capture(&registry);
        assert!(ChangeDetector::detect(&snapshot, &registry).is_empty());
    }

    #[test]
    fn test_added_file_is_not_also_updated() {
        let mut registry = FileRegistry::new();
        let handle = registry
            .add_local_files([InMemoryFile::new("a.mgz", b"a".to_vec()).shared()])
            .added[0];
        registry.set_active(handle).unwrap();
        registry.set_opacity(handle, 40).unwrap();

        let batch = ChangeDetector::detect(&Snapshot::empty(), &registry);
        assert_eq!(batch.added.len(), 1);
        assert!(batch.updated.is_empty());
        assert!(batch.render_order.is_empty());
        assert_eq!(batch.added[0].render_index, Some(0));
    }

    #[test]
    fn test_swap_removes_before_adding() {
        let mut registry = FileRegistry::new();
        registry
            .load_backend_project(&BackendProject {
                id: 1,
                name: "p".to_string(),
                volumes: vec![volume_dto(5, "X.mgz")],
                ..BackendProject::default()
            })
            .unwrap();
        let previous = Snapshot::capture(&registry);

        let x = registry.volumes()[0].handle();
        registry.remove(x).unwrap();
        registry.add_local_files([InMemoryFile::new("Y.mgz", b"y".to_vec()).shared()]);

        let batch = ChangeDetector::detect(&previous, &registry);
        assert_eq!(batch.removed.len(), 1);
        assert_eq!(batch.removed[0].cloud_id(), Some(5));
        assert_eq!(batch.added.len(), 1);
        assert_eq!(batch.added[0].name, "Y.mgz");

        let kinds: Vec<&str> = batch
            .operations()
            .map(|op| match op {
                Operation::Remove(_) => "remove",
                Operation::Add(_) => "add",
                Operation::Update(_) => "update",
                Operation::Upload(_) => "upload",
                Operation::Reindex(_) => "reindex",
            })
            .collect();
        assert_eq!(kinds, vec!["remove", "add"]);
    }

    #[test]
    fn test_reorder_reports_render_changes() {
        let mut registry = FileRegistry::new();
        let added = registry
            .add_local_files([
                InMemoryFile::new("a.mgz", b"a".to_vec()).shared(),
                InMemoryFile::new("b.mgz", b"b".to_vec()).shared(),
            ])
            .added;
        registry
            .apply_order(FileCategory::Volume, &[added[0], added[1]])
            .unwrap();
        let previous = Snapshot::capture(&registry);

        registry
            .apply_order(FileCategory::Volume, &[added[1], added[0]])
            .unwrap();
        let batch = ChangeDetector::detect(&previous, &registry);

        assert_eq!(batch.updated.len(), 2);
        assert!(batch.updated.iter().all(|u| u.fields == vec![FileField::Order]));
        let indices: Vec<(FileHandle, usize)> = batch
            .render_order
            .iter()
            .map(|change| (change.file.handle, change.index))
            .collect();
        assert_eq!(indices, vec![(added[0], 0), (added[1], 1)]);
    }

    #[test]
    fn test_binding_a_project_lists_local_files_for_upload() {
        let mut registry = FileRegistry::new();
        let added = registry
            .add_local_files([
                InMemoryFile::new("a.mgz", b"a".to_vec()).shared(),
                InMemoryFile::new("b.mgz", b"b".to_vec()).shared(),
            ])
            .added;
        let unbound = Snapshot::capture(&registry);
        assert_eq!(unbound.project_id(), None);

        registry.set_project_id(Some(7));
        registry.set_opacity(added[1], 50).unwrap();
        let batch = ChangeDetector::detect(&unbound, &registry);

        assert!(batch.added.is_empty());
        assert_eq!(batch.updated.len(), 1);
        assert_eq!(batch.updated[0].after.handle, added[1]);
        let uploads: Vec<FileHandle> = batch.uploads.iter().map(|file| file.handle).collect();
        assert_eq!(uploads, vec![added[0]]);
        assert_eq!(batch.len(), 2);

        // Unbinding uploads nothing.
        let bound = Snapshot::capture(&registry);
        registry.set_project_id(None);
        assert!(ChangeDetector::detect(&bound, &registry).is_empty());
    }

    #[test]
    fn test_project_reload_is_empty() {
        let project = BackendProject {
            id: 1,
            name: "p".to_string(),
            volumes: vec![volume_dto(5, "X.mgz")],
            ..BackendProject::default()
        };
        let mut registry = FileRegistry::new();
        registry.load_backend_project(&project).unwrap();
        let previous = Snapshot::capture(&registry);

        registry.load_backend_project(&project).unwrap();
        assert!(ChangeDetector::detect(&previous, &registry).is_empty());
    }
}
