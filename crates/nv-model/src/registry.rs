//! The file registry: single source of truth for the files of an open project.
//!
//! All mutations go through narrow setters. Each setter is a no-op when the
//! value does not change, so observers never see spurious changes. Every
//! effective mutation bumps the registry revision and is published to
//! subscribers as a [`RegistryEvent`].
//!
//! # Invariants
//!
//! - At most one top-level file is active across all categories.
//! - File names are unique within a category.

use std::collections::HashSet;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, warn};

use crate::category::{FileCategory, FileHandle};
use crate::classify::FileClassifier;
use crate::color::{ColorMap, Rgb};
use crate::dto::{AttachmentDto, BackendProject, PointSetDto, SurfaceDto, VolumeDto};
use crate::error::{FileError, RegistryError, Result};
use crate::file::{
    AttachedFile, FileDetails, FileField, FileLocation, PointSetDetails, ProjectFile,
    SurfaceDetails, VolumeDetails,
};
use crate::point_set::PointSetData;
use crate::raw::SharedRawFile;

/// Name given to point sets drawn in the viewer before the user renames them.
pub const DEFAULT_POINT_SET_NAME: &str = "New Point Set";

// =============================================================================
// EVENTS
// =============================================================================

/// What changed in the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryChange {
    /// Files were added.
    Added { handles: Vec<FileHandle> },
    /// A file was removed.
    Removed {
        handle: FileHandle,
        category: FileCategory,
        was_active: bool,
    },
    /// A single field of a file changed.
    Updated { handle: FileHandle, field: FileField },
    /// The order of a category was reassigned in one step.
    Reordered { category: FileCategory },
    /// The active file changed.
    ActiveChanged {
        previous: Option<FileHandle>,
        current: Option<FileHandle>,
    },
    /// A local or cached file received its backend id.
    Promoted { handle: FileHandle, id: u64 },
    /// The whole content was replaced (project switch).
    Replaced { project_id: Option<u64> },
    /// The files were bound to another backend project, or unbound.
    Rebound { project_id: Option<u64> },
}

/// Notification sent to subscribers after each effective mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEvent {
    /// Registry revision after the mutation.
    pub revision: u64,
    pub change: RegistryChange,
}

// =============================================================================
// ADD OUTCOME
// =============================================================================

/// Result of adding a batch of local files.
#[derive(Debug, Default)]
pub struct AddOutcome {
    /// Handles of the files that were added, in input order.
    pub added: Vec<FileHandle>,
    /// Files that were not added, with the reason.
    pub rejected: Vec<FileError>,
}

impl AddOutcome {
    /// Names of the rejected files, for display.
    pub fn rejected_names(&self) -> Vec<&str> {
        self.rejected.iter().map(FileError::file_name).collect()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Owns every [`ProjectFile`] of the currently open project.
#[derive(Debug, Default)]
pub struct FileRegistry {
    volumes: Vec<ProjectFile>,
    surfaces: Vec<ProjectFile>,
    point_sets: Vec<ProjectFile>,
    project_id: Option<u64>,
    next_handle: u64,
    revision: u64,
    classifier: FileClassifier,
    subscribers: Vec<Sender<RegistryEvent>>,
}

impl FileRegistry {
    /// Create an empty registry with the default classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with a custom suffix table.
    pub fn with_classifier(classifier: FileClassifier) -> Self {
        Self {
            classifier,
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    #[inline]
    pub fn classifier(&self) -> &FileClassifier {
        &self.classifier
    }

    /// Backend project id, if the project is persisted.
    #[inline]
    pub fn project_id(&self) -> Option<u64> {
        self.project_id
    }

    /// Number of effective mutations so far.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Files of a category in insertion order. Attachment categories have
    /// no top-level collection and yield an empty slice.
    pub fn files(&self, category: FileCategory) -> &[ProjectFile] {
        match category {
            FileCategory::Volume => &self.volumes,
            FileCategory::Surface => &self.surfaces,
            FileCategory::PointSet => &self.point_sets,
            FileCategory::Overlay | FileCategory::Annotation => &[],
        }
    }

    #[inline]
    pub fn volumes(&self) -> &[ProjectFile] {
        &self.volumes
    }

    #[inline]
    pub fn surfaces(&self) -> &[ProjectFile] {
        &self.surfaces
    }

    #[inline]
    pub fn point_sets(&self) -> &[ProjectFile] {
        &self.point_sets
    }

    /// All files, volumes first, then surfaces, then point sets.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectFile> {
        self.volumes
            .iter()
            .chain(self.surfaces.iter())
            .chain(self.point_sets.iter())
    }

    pub fn len(&self) -> usize {
        self.volumes.len() + self.surfaces.len() + self.point_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: FileHandle) -> Option<&ProjectFile> {
        self.iter().find(|file| file.handle == handle)
    }

    /// Look up a file by category and name.
    pub fn find(&self, category: FileCategory, name: &str) -> Option<&ProjectFile> {
        self.files(category).iter().find(|file| file.name == name)
    }

    /// The active file, if any.
    pub fn active(&self) -> Option<&ProjectFile> {
        self.iter().find(|file| file.is_active)
    }

    /// Files of a category in list order (see [`ProjectFile::list_key`]).
    pub fn ordered(&self, category: FileCategory) -> Vec<&ProjectFile> {
        let mut files: Vec<&ProjectFile> = self.files(category).iter().collect();
        files.sort_by_key(|file| file.list_key());
        files
    }

    /// Render indices of the checked files of a category.
    ///
    /// Indices are contiguous and zero-based. The engine draws higher
    /// indices on top, so the first row of the list gets the highest index.
    pub fn render_order(&self, category: FileCategory) -> Vec<(FileHandle, usize)> {
        let checked: Vec<FileHandle> = self
            .ordered(category)
            .into_iter()
            .filter(|file| file.is_checked)
            .map(|file| file.handle)
            .collect();
        let count = checked.len();

        checked
            .into_iter()
            .enumerate()
            .map(|(position, handle)| (handle, count - 1 - position))
            .collect()
    }

    /// Verify the single-active-file invariant.
    pub fn check_invariants(&self) -> Result<()> {
        let count = self.iter().filter(|file| file.is_active).count();
        if count > 1 {
            return Err(RegistryError::InvalidActiveState { count });
        }
        Ok(())
    }

    /// Receive an event for every effective mutation from now on.
    pub fn subscribe(&mut self) -> Receiver<RegistryEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    // -------------------------------------------------------------------------
    // Adding and removing
    // -------------------------------------------------------------------------

    /// Add files picked by the user.
    ///
    /// Each file is classified by name. Unsupported types and names already
    /// present in the target category (including earlier files of the same
    /// batch) are rejected without affecting the rest of the batch.
    pub fn add_local_files<I>(&mut self, files: I) -> AddOutcome
    where
        I: IntoIterator<Item = SharedRawFile>,
    {
        let mut outcome = AddOutcome::default();

        for raw in files {
            let name = raw.name().to_string();

            let category = match self.classifier.require(&name) {
                Ok(category) => category,
                Err(err) => {
                    warn!(file = %name, "rejected file with unsupported type");
                    outcome.rejected.push(err);
                    continue;
                }
            };

            if self.find(category, &name).is_some() {
                warn!(file = %name, %category, "rejected duplicate file name");
                outcome
                    .rejected
                    .push(FileError::DuplicateName { name, category });
                continue;
            }

            let Some(details) = FileDetails::for_category(category) else {
                outcome
                    .rejected
                    .push(FileError::UnsupportedFileType { name });
                continue;
            };

            let handle = self.allocate_handle();
            let size = raw.byte_size();
            debug!(file = %name, %category, %handle, size, "adding local file");
            let file = ProjectFile::new(handle, name, FileLocation::Local(raw), size, details);
            match self.collection_mut(category) {
                Ok(files) => files.push(file),
                Err(_) => {
                    outcome.rejected.push(FileError::UnsupportedFileType { name: file.name });
                    continue;
                }
            }
            outcome.added.push(handle);
        }

        if !outcome.added.is_empty() {
            self.emit(RegistryChange::Added {
                handles: outcome.added.clone(),
            });
        }
        outcome
    }

    /// Create an empty in-memory point set and make it the active file.
    pub fn create_cached_point_set(&mut self, name: &str, color: Rgb) -> Result<FileHandle> {
        if self.find(FileCategory::PointSet, name).is_some() {
            return Err(FileError::DuplicateName {
                name: name.to_string(),
                category: FileCategory::PointSet,
            }
            .into());
        }

        let handle = self.allocate_handle();
        let details = FileDetails::PointSet(PointSetDetails {
            data: PointSetData::new(color),
            selected_waypoint: 0,
        });
        self.point_sets.push(ProjectFile::new(
            handle,
            name.to_string(),
            FileLocation::Cached,
            0,
            details,
        ));
        debug!(file = %name, %handle, "created cached point set");
        self.emit(RegistryChange::Added {
            handles: vec![handle],
        });
        self.set_active(handle)?;
        Ok(handle)
    }

    /// Remove a file. Removing the active file leaves no file active.
    pub fn remove(&mut self, handle: FileHandle) -> Result<ProjectFile> {
        let (category, index) = self.locate(handle)?;
        let file = self.collection_mut(category)?.remove(index);
        debug!(file = %file.name, %category, %handle, "removed file");
        self.emit(RegistryChange::Removed {
            handle,
            category,
            was_active: file.is_active,
        });
        Ok(file)
    }

    /// Replace the whole content with the files of a backend project.
    ///
    /// Every entry is validated first; on error the registry is unchanged.
    pub fn load_backend_project(&mut self, project: &BackendProject) -> Result<()> {
        let mut next_handle = self.next_handle;
        let mut allocate = || {
            next_handle += 1;
            FileHandle::from_raw(next_handle)
        };

        let volumes = project
            .volumes
            .iter()
            .map(|dto| self.volume_from_dto(dto, allocate()))
            .collect::<Result<Vec<_>>>()?;
        let surfaces = project
            .surfaces
            .iter()
            .map(|dto| self.surface_from_dto(dto, allocate()))
            .collect::<Result<Vec<_>>>()?;
        let point_sets = project
            .point_sets
            .iter()
            .map(|dto| self.point_set_from_dto(dto, allocate()))
            .collect::<Result<Vec<_>>>()?;
        for files in [&volumes, &surfaces, &point_sets] {
            reject_duplicate_names(files)?;
        }

        self.next_handle = next_handle;
        self.volumes = volumes;
        self.surfaces = surfaces;
        self.point_sets = point_sets;
        self.project_id = Some(project.id);

        info!(
            project = project.id,
            volumes = self.volumes.len(),
            surfaces = self.surfaces.len(),
            point_sets = self.point_sets.len(),
            "loaded backend project"
        );
        self.emit(RegistryChange::Replaced {
            project_id: self.project_id,
        });
        Ok(())
    }

    /// Record the backend project the files are synced to.
    pub fn set_project_id(&mut self, project_id: Option<u64>) {
        if self.project_id == project_id {
            return;
        }
        debug!(?project_id, "bound project");
        self.project_id = project_id;
        self.emit(RegistryChange::Rebound { project_id });
    }

    /// Merge a backend id into a local or cached file.
    pub fn promote_to_cloud(&mut self, handle: FileHandle, id: u64, url: String) -> Result<bool> {
        let file = self.file_mut(handle)?;
        match &file.location {
            FileLocation::Cloud { id: existing, .. } if *existing == id => return Ok(false),
            FileLocation::Cloud { id: existing, .. } => {
                return Err(RegistryError::InvalidValue {
                    field: "id",
                    reason: format!("{} is already stored with id {}", file.name, existing),
                });
            }
            FileLocation::Local(_) | FileLocation::Cached => {}
        }

        file.location = FileLocation::Cloud { id, url };
        debug!(file = %file.name, %handle, id, "promoted file to cloud");
        self.emit(RegistryChange::Promoted { handle, id });
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Make a file the only active file.
    pub fn set_active(&mut self, handle: FileHandle) -> Result<bool> {
        let target = self.require(handle)?;
        if target.is_active {
            return Ok(false);
        }

        let previous = self.active().map(ProjectFile::handle);
        for file in self.iter_mut() {
            file.is_active = file.handle == handle;
        }
        self.emit(RegistryChange::ActiveChanged {
            previous,
            current: Some(handle),
        });
        Ok(true)
    }

    /// Deactivate the active file, if any.
    pub fn clear_active(&mut self) -> bool {
        let Some(previous) = self.active().map(ProjectFile::handle) else {
            return false;
        };
        for file in self.iter_mut() {
            file.is_active = false;
        }
        self.emit(RegistryChange::ActiveChanged {
            previous: Some(previous),
            current: None,
        });
        true
    }

    // -------------------------------------------------------------------------
    // Field setters
    // -------------------------------------------------------------------------

    /// Show or hide a file in the render view.
    pub fn set_checked(&mut self, handle: FileHandle, checked: bool) -> Result<bool> {
        self.update(handle, FileField::Checked, |file| {
            Ok(replace(&mut file.is_checked, checked))
        })
    }

    /// Assign the display rank of a single file.
    pub fn set_order(&mut self, handle: FileHandle, order: u32) -> Result<bool> {
        self.update(handle, FileField::Order, |file| {
            Ok(replace(&mut file.order, Some(order)))
        })
    }

    /// Set opacity in percent (0..=100).
    pub fn set_opacity(&mut self, handle: FileHandle, opacity: u8) -> Result<bool> {
        if opacity > 100 {
            return Err(RegistryError::InvalidValue {
                field: "opacity",
                reason: format!("{} is above 100%", opacity),
            });
        }
        self.update(handle, FileField::Opacity, |file| {
            Ok(replace(&mut file.opacity, opacity))
        })
    }

    /// Set the contrast window of a volume.
    pub fn set_contrast(&mut self, handle: FileHandle, min: f64, max: f64) -> Result<bool> {
        validate_contrast(min, max)?;
        self.update(handle, FileField::Contrast, |file| {
            let volume = volume_mut(file)?;
            let changed = volume.contrast_min != min || volume.contrast_max != max;
            volume.contrast_min = min;
            volume.contrast_max = max;
            Ok(changed)
        })
    }

    /// Set the color map of a volume.
    pub fn set_color_map(&mut self, handle: FileHandle, color_map: ColorMap) -> Result<bool> {
        self.update(handle, FileField::ColorMap, |file| {
            Ok(replace(&mut volume_mut(file)?.color_map, color_map))
        })
    }

    /// Set the color of a surface or point set.
    pub fn set_color(&mut self, handle: FileHandle, color: Rgb) -> Result<bool> {
        self.update(handle, FileField::Color, |file| {
            let found = file.category();
            match &mut file.details {
                FileDetails::Surface(surface) => Ok(replace(&mut surface.color, color)),
                FileDetails::PointSet(point_set) => Ok(replace(&mut point_set.data.color, color)),
                FileDetails::Volume(_) => Err(RegistryError::WrongCategory {
                    handle: file.handle,
                    expected: FileCategory::Surface,
                    found,
                }),
            }
        })
    }

    /// Replace the content of a point set (e.g. after editing waypoints).
    pub fn set_point_set_data(&mut self, handle: FileHandle, data: PointSetData) -> Result<bool> {
        self.update(handle, FileField::PointSetData, |file| {
            let point_set = point_set_mut(file)?;
            if point_set.data == data {
                return Ok(false);
            }
            point_set.data = data;
            if point_set.selected_waypoint >= point_set.data.points.len() {
                point_set.selected_waypoint = point_set.data.points.len().saturating_sub(1);
            }
            Ok(true)
        })
    }

    /// Select a waypoint of a point set.
    pub fn select_waypoint(&mut self, handle: FileHandle, index: usize) -> Result<bool> {
        self.update(handle, FileField::SelectedWaypoint, |file| {
            let point_set = point_set_mut(file)?;
            let count = point_set.data.points.len();
            if index >= count {
                return Err(RegistryError::InvalidValue {
                    field: "waypoint",
                    reason: format!("index {} out of range for {} points", index, count),
                });
            }
            Ok(replace(&mut point_set.selected_waypoint, index))
        })
    }

    /// Reassign `order` of a whole category in one step: the files listed in
    /// `sequence` get `0..N-1` in that order.
    ///
    /// Every handle must belong to `category`. Files of the category not in
    /// `sequence` keep their order.
    pub fn apply_order(&mut self, category: FileCategory, sequence: &[FileHandle]) -> Result<bool> {
        for handle in sequence {
            let found = self.require(*handle)?.category();
            if found != category {
                return Err(RegistryError::WrongCategory {
                    handle: *handle,
                    expected: category,
                    found,
                });
            }
        }

        let mut changed = false;
        let files = self.collection_mut(category)?;
        for (rank, handle) in sequence.iter().enumerate() {
            if let Some(file) = files.iter_mut().find(|file| file.handle == *handle) {
                changed |= replace(&mut file.order, Some(rank as u32));
            }
        }

        if changed {
            debug!(%category, count = sequence.len(), "reordered category");
            self.emit(RegistryChange::Reordered { category });
        }
        Ok(changed)
    }

    /// Attach a per-vertex overlay to a surface.
    pub fn attach_overlay(&mut self, surface: FileHandle, raw: SharedRawFile) -> Result<()> {
        self.attach(surface, FileCategory::Overlay, raw)
    }

    /// Attach an annotation to a surface.
    pub fn attach_annotation(&mut self, surface: FileHandle, raw: SharedRawFile) -> Result<()> {
        self.attach(surface, FileCategory::Annotation, raw)
    }

    /// Attach an overlay or annotation to a surface.
    ///
    /// A newly attached file becomes the selected attachment of its kind.
    pub fn attach(
        &mut self,
        surface: FileHandle,
        kind: FileCategory,
        raw: SharedRawFile,
    ) -> Result<()> {
        let field = match kind {
            FileCategory::Overlay => FileField::Overlays,
            FileCategory::Annotation => FileField::Annotations,
            _ => {
                return Err(RegistryError::InvalidValue {
                    field: "attachment",
                    reason: format!("a {} cannot be attached to a surface", kind),
                });
            }
        };

        self.update(surface, field, |file| {
            let surface = surface_mut(file)?;
            let list = match kind {
                FileCategory::Overlay => &mut surface.overlays,
                _ => &mut surface.annotations,
            };

            let name = raw.name().to_string();
            if list.iter().any(|attached| attached.name == name) {
                return Err(FileError::DuplicateName {
                    name,
                    category: kind,
                }
                .into());
            }

            for attached in list.iter_mut() {
                attached.is_active = false;
            }
            list.push(AttachedFile {
                name,
                category: kind,
                location: FileLocation::Local(raw),
                is_active: true,
            });
            Ok(true)
        })?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn allocate_handle(&mut self) -> FileHandle {
        self.next_handle += 1;
        FileHandle::from_raw(self.next_handle)
    }

    fn collection_mut(&mut self, category: FileCategory) -> Result<&mut Vec<ProjectFile>> {
        match category {
            FileCategory::Volume => Ok(&mut self.volumes),
            FileCategory::Surface => Ok(&mut self.surfaces),
            FileCategory::PointSet => Ok(&mut self.point_sets),
            FileCategory::Overlay | FileCategory::Annotation => Err(RegistryError::InvalidValue {
                field: "category",
                reason: format!("{} files are attached to surfaces, not listed", category),
            }),
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProjectFile> {
        self.volumes
            .iter_mut()
            .chain(self.surfaces.iter_mut())
            .chain(self.point_sets.iter_mut())
    }

    fn locate(&self, handle: FileHandle) -> Result<(FileCategory, usize)> {
        FileCategory::TOP_LEVEL
            .into_iter()
            .find_map(|category| {
                self.files(category)
                    .iter()
                    .position(|file| file.handle == handle)
                    .map(|index| (category, index))
            })
            .ok_or(RegistryError::UnknownFile { handle })
    }

    fn require(&self, handle: FileHandle) -> Result<&ProjectFile> {
        self.get(handle).ok_or(RegistryError::UnknownFile { handle })
    }

    fn file_mut(&mut self, handle: FileHandle) -> Result<&mut ProjectFile> {
        self.iter_mut()
            .find(|file| file.handle == handle)
            .ok_or(RegistryError::UnknownFile { handle })
    }

    /// Apply `mutate` to one file and publish the change if it reports one.
    fn update<F>(&mut self, handle: FileHandle, field: FileField, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut ProjectFile) -> Result<bool>,
    {
        let file = self.file_mut(handle)?;
        let changed = mutate(file)?;
        if changed {
            debug!(file = %file.name, %handle, ?field, "updated file");
            self.emit(RegistryChange::Updated { handle, field });
        }
        Ok(changed)
    }

    fn emit(&mut self, change: RegistryChange) {
        self.revision += 1;
        let event = RegistryEvent {
            revision: self.revision,
            change,
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        self.debug_check();
    }

    fn debug_check(&self) {
        debug_assert!(
            self.check_invariants().is_ok(),
            "registry invariant violated: {:?}",
            self.check_invariants()
        );
    }

    fn cloud_location(category: FileCategory, id: u64) -> FileLocation {
        FileLocation::Cloud {
            id,
            url: category.cloud_url(id),
        }
    }

    fn expect_category(&self, name: &str, expected: FileCategory) -> Result<()> {
        match self.classifier.classify(name) {
            Some(category) if category == expected => Ok(()),
            found => Err(RegistryError::InvalidBackendFile {
                name: name.to_string(),
                reason: match found {
                    Some(category) => format!("listed as {} but named like a {}", expected, category),
                    None => format!("listed as {} but has an unknown extension", expected),
                },
            }),
        }
    }

    fn volume_from_dto(&self, dto: &VolumeDto, handle: FileHandle) -> Result<ProjectFile> {
        self.expect_category(&dto.file_name, FileCategory::Volume)?;
        let invalid = |reason: String| RegistryError::InvalidBackendFile {
            name: dto.file_name.clone(),
            reason,
        };

        let color_map = match dto.color_map.as_deref() {
            None => ColorMap::default(),
            Some(code) => ColorMap::from_backend(code)
                .ok_or_else(|| invalid(format!("unsupported color map '{}'", code)))?,
        };
        let details = VolumeDetails {
            contrast_min: dto.contrast_min.unwrap_or(0.0),
            contrast_max: dto.contrast_max.unwrap_or(100.0),
            color_map,
        };
        validate_contrast(details.contrast_min, details.contrast_max)
            .map_err(|err| invalid(err.to_string()))?;

        let mut file = ProjectFile::new(
            handle,
            dto.file_name.clone(),
            Self::cloud_location(FileCategory::Volume, dto.id),
            dto.file_size,
            FileDetails::Volume(details),
        );
        apply_common(&mut file, dto.order, dto.visible, dto.opacity).map_err(invalid)?;
        Ok(file)
    }

    fn surface_from_dto(&self, dto: &SurfaceDto, handle: FileHandle) -> Result<ProjectFile> {
        self.expect_category(&dto.file_name, FileCategory::Surface)?;
        let invalid = |reason: String| RegistryError::InvalidBackendFile {
            name: dto.file_name.clone(),
            reason,
        };

        let color = match dto.color.as_deref() {
            None => Rgb::default(),
            Some(hex) => hex.parse().map_err(|err: RegistryError| invalid(err.to_string()))?,
        };
        let attachments = |dtos: &[AttachmentDto], kind: FileCategory| -> Vec<AttachedFile> {
            dtos.iter()
                .map(|attachment| AttachedFile {
                    name: attachment.file_name.clone(),
                    category: kind,
                    location: Self::cloud_location(kind, attachment.id),
                    is_active: false,
                })
                .collect()
        };
        let details = SurfaceDetails {
            color,
            overlays: attachments(&dto.overlays, FileCategory::Overlay),
            annotations: attachments(&dto.annotations, FileCategory::Annotation),
        };

        let mut file = ProjectFile::new(
            handle,
            dto.file_name.clone(),
            Self::cloud_location(FileCategory::Surface, dto.id),
            dto.file_size,
            FileDetails::Surface(details),
        );
        apply_common(&mut file, dto.order, dto.visible, dto.opacity).map_err(invalid)?;
        Ok(file)
    }

    fn point_set_from_dto(&self, dto: &PointSetDto, handle: FileHandle) -> Result<ProjectFile> {
        let details = PointSetDetails {
            data: dto.data.clone().unwrap_or_default(),
            selected_waypoint: 0,
        };
        let mut file = ProjectFile::new(
            handle,
            dto.file_name.clone(),
            Self::cloud_location(FileCategory::PointSet, dto.id),
            dto.file_size,
            FileDetails::PointSet(details),
        );
        apply_common(&mut file, dto.order, dto.visible, None).map_err(|reason| {
            RegistryError::InvalidBackendFile {
                name: dto.file_name.clone(),
                reason,
            }
        })?;
        Ok(file)
    }
}

/// Assign `value` and report whether it differed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Names are unique within a category.
fn reject_duplicate_names(files: &[ProjectFile]) -> Result<()> {
    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert(file.name.as_str()) {
            return Err(RegistryError::InvalidBackendFile {
                name: file.name.clone(),
                reason: format!("listed twice as {}", file.category()),
            });
        }
    }
    Ok(())
}

fn validate_contrast(min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(RegistryError::InvalidValue {
            field: "contrast",
            reason: format!("[{}, {}] is not an ordered finite range", min, max),
        });
    }
    Ok(())
}

fn apply_common(
    file: &mut ProjectFile,
    order: Option<u32>,
    visible: bool,
    opacity: Option<u8>,
) -> std::result::Result<(), String> {
    let opacity = opacity.unwrap_or(crate::file::DEFAULT_OPACITY);
    if opacity > 100 {
        return Err(format!("opacity {} is above 100%", opacity));
    }
    file.order = order;
    file.is_checked = visible;
    file.opacity = opacity;
    Ok(())
}

fn volume_mut(file: &mut ProjectFile) -> Result<&mut VolumeDetails> {
    let (handle, found) = (file.handle, file.category());
    match &mut file.details {
        FileDetails::Volume(volume) => Ok(volume),
        _ => Err(RegistryError::WrongCategory {
            handle,
            expected: FileCategory::Volume,
            found,
        }),
    }
}

fn surface_mut(file: &mut ProjectFile) -> Result<&mut SurfaceDetails> {
    let (handle, found) = (file.handle, file.category());
    match &mut file.details {
        FileDetails::Surface(surface) => Ok(surface),
        _ => Err(RegistryError::WrongCategory {
            handle,
            expected: FileCategory::Surface,
            found,
        }),
    }
}

fn point_set_mut(file: &mut ProjectFile) -> Result<&mut PointSetDetails> {
    let (handle, found) = (file.handle, file.category());
    match &mut file.details {
        FileDetails::PointSet(point_set) => Ok(point_set),
        _ => Err(RegistryError::WrongCategory {
            handle,
            expected: FileCategory::PointSet,
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::InMemoryFile;

    fn raw(name: &str) -> SharedRawFile {
        InMemoryFile::new(name, vec![0u8; 4]).shared()
    }

    fn registry_with(names: &[&str]) -> (FileRegistry, Vec<FileHandle>) {
        let mut registry = FileRegistry::new();
        let outcome = registry.add_local_files(names.iter().map(|name| raw(name)));
        assert!(outcome.rejected.is_empty());
        (registry, outcome.added)
    }

    #[test]
    fn test_add_classifies_into_categories() {
        let (registry, added) = registry_with(&["T1.mgz", "lh.pial", "points.json"]);
        assert_eq!(added.len(), 3);
        assert_eq!(registry.volumes().len(), 1);
        assert_eq!(registry.surfaces().len(), 1);
        assert_eq!(registry.point_sets().len(), 1);
        assert!(registry.iter().all(|file| file.order().is_none()));
    }

    #[test]
    fn test_add_rejects_duplicates_and_unknown() {
        let (mut registry, _) = registry_with(&["brain.nii.gz"]);
        let revision = registry.revision();

        let outcome =
            registry.add_local_files(vec![raw("brain.nii.gz"), raw("notes.txt"), raw("lh.white")]);

        assert_eq!(outcome.rejected_names(), vec!["brain.nii.gz", "notes.txt"]);
        assert_eq!(outcome.added.len(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.revision(), revision + 1);
    }

    #[test]
    fn test_duplicate_within_batch() {
        let mut registry = FileRegistry::new();
        let outcome = registry.add_local_files(vec![raw("a.mgz"), raw("a.mgz")]);
        assert_eq!(outcome.added.len(), 1);
        assert!(matches!(
            outcome.rejected[0],
            FileError::DuplicateName { .. }
        ));
    }

    #[test]
    fn test_same_name_in_other_category_is_allowed() {
        let mut registry = FileRegistry::new();
        registry.create_cached_point_set("lh.pial", Rgb::WHITE).unwrap();
        let outcome = registry.add_local_files(vec![raw("lh.pial")]);
        assert_eq!(outcome.added.len(), 1);
    }

    #[test]
    fn test_set_active_is_exclusive() {
        let (mut registry, added) = registry_with(&["a.mgz", "lh.pial"]);
        assert!(registry.set_active(added[0]).unwrap());
        assert!(registry.set_active(added[1]).unwrap());
        assert_eq!(registry.active().map(ProjectFile::handle), Some(added[1]));
        assert!(!registry.get(added[0]).unwrap().is_active());
        assert!(!registry.set_active(added[1]).unwrap());
    }

    #[test]
    fn test_setters_are_noop_when_unchanged() {
        let (mut registry, added) = registry_with(&["a.mgz"]);
        let revision = registry.revision();
        assert!(!registry.set_checked(added[0], true).unwrap());
        assert!(!registry.set_opacity(added[0], 100).unwrap());
        assert_eq!(registry.revision(), revision);

        assert!(registry.set_checked(added[0], false).unwrap());
        assert!(!registry.set_checked(added[0], false).unwrap());
        assert_eq!(registry.revision(), revision + 1);
    }

    #[test]
    fn test_set_order() {
        let (mut registry, added) = registry_with(&["a.mgz", "b.mgz"]);
        let events = registry.subscribe();
        let revision = registry.revision();

        assert!(registry.set_order(added[1], 0).unwrap());
        assert_eq!(registry.get(added[1]).unwrap().order(), Some(0));
        assert!(!registry.set_order(added[1], 0).unwrap());
        assert_eq!(registry.revision(), revision + 1);

        let received: Vec<RegistryEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![RegistryEvent {
                revision: revision + 1,
                change: RegistryChange::Updated {
                    handle: added[1],
                    field: FileField::Order
                },
            }]
        );
        assert!(matches!(
            registry.set_order(FileHandle::from_raw(99), 1),
            Err(RegistryError::UnknownFile { .. })
        ));
    }

    #[test]
    fn test_clear_active() {
        let (mut registry, added) = registry_with(&["a.mgz", "lh.pial"]);
        let revision = registry.revision();
        assert!(!registry.clear_active());
        assert_eq!(registry.revision(), revision);

        registry.set_active(added[1]).unwrap();
        let events = registry.subscribe();
        assert!(registry.clear_active());
        assert!(registry.active().is_none());
        assert!(!registry.clear_active());
        assert_eq!(registry.revision(), revision + 2);

        let received: Vec<RegistryChange> = events.try_iter().map(|event| event.change).collect();
        assert_eq!(
            received,
            vec![RegistryChange::ActiveChanged {
                previous: Some(added[1]),
                current: None
            }]
        );
    }

    #[test]
    fn test_select_waypoint() {
        let mut registry = FileRegistry::new();
        let handle = registry
            .create_cached_point_set(DEFAULT_POINT_SET_NAME, Rgb::WHITE)
            .unwrap();
        let mut data = PointSetData::new(Rgb::WHITE);
        data.points = vec![
            crate::point_set::Waypoint::at(0.0, 0.0, 0.0),
            crate::point_set::Waypoint::at(1.0, 2.0, 3.0),
        ];
        registry.set_point_set_data(handle, data).unwrap();
        let revision = registry.revision();

        assert!(!registry.select_waypoint(handle, 0).unwrap());
        assert_eq!(registry.revision(), revision);
        assert!(registry.select_waypoint(handle, 1).unwrap());
        assert_eq!(registry.revision(), revision + 1);
        assert_eq!(
            registry.get(handle).unwrap().point_set().unwrap().selected_waypoint,
            1
        );

        assert!(matches!(
            registry.select_waypoint(handle, 2),
            Err(RegistryError::InvalidValue { .. })
        ));
        assert_eq!(registry.revision(), revision + 1);

        let (mut registry, added) = registry_with(&["a.mgz"]);
        assert!(matches!(
            registry.select_waypoint(added[0], 0),
            Err(RegistryError::WrongCategory { .. })
        ));
    }

    #[test]
    fn test_set_project_id_emits_once() {
        let mut registry = FileRegistry::new();
        let events = registry.subscribe();
        registry.set_project_id(Some(7));
        registry.set_project_id(Some(7));
        assert_eq!(registry.project_id(), Some(7));
        assert_eq!(registry.revision(), 1);
        let received: Vec<RegistryChange> = events.try_iter().map(|event| event.change).collect();
        assert_eq!(
            received,
            vec![RegistryChange::Rebound {
                project_id: Some(7)
            }]
        );
    }

    #[test]
    fn test_attachment_categories_are_not_lists() {
        let (mut registry, _) = registry_with(&["points.json"]);
        let revision = registry.revision();
        for category in [FileCategory::Overlay, FileCategory::Annotation] {
            assert!(matches!(
                registry.apply_order(category, &[]),
                Err(RegistryError::InvalidValue { field: "category", .. })
            ));
        }
        assert_eq!(registry.revision(), revision);
        assert_eq!(registry.point_sets().len(), 1);
    }

    #[test]
    fn test_remove_active_clears_selection() {
        let (mut registry, added) = registry_with(&["a.mgz", "b.mgz"]);
        registry.set_active(added[0]).unwrap();
        let removed = registry.remove(added[0]).unwrap();
        assert_eq!(removed.name(), "a.mgz");
        assert!(registry.active().is_none());
        assert!(matches!(
            registry.remove(added[0]),
            Err(RegistryError::UnknownFile { .. })
        ));
    }

    #[test]
    fn test_wrong_category_setters() {
        let (mut registry, added) = registry_with(&["a.mgz", "lh.pial"]);
        assert!(matches!(
            registry.set_color(added[0], Rgb::WHITE),
            Err(RegistryError::WrongCategory { .. })
        ));
        assert!(matches!(
            registry.set_contrast(added[1], 0.0, 1.0),
            Err(RegistryError::WrongCategory { .. })
        ));
        assert!(matches!(
            registry.set_contrast(added[0], 5.0, 1.0),
            Err(RegistryError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_apply_order_and_render_order() {
        let (mut registry, added) = registry_with(&["a.mgz", "b.mgz", "c.mgz"]);
        registry
            .apply_order(FileCategory::Volume, &[added[2], added[0], added[1]])
            .unwrap();

        let names: Vec<&str> = registry
            .ordered(FileCategory::Volume)
            .into_iter()
            .map(ProjectFile::name)
            .collect();
        assert_eq!(names, vec!["c.mgz", "a.mgz", "b.mgz"]);

        registry.set_checked(added[0], false).unwrap();
        assert_eq!(
            registry.render_order(FileCategory::Volume),
            vec![(added[2], 1), (added[1], 0)]
        );
    }

    #[test]
    fn test_apply_order_rejects_foreign_handle() {
        let (mut registry, added) = registry_with(&["a.mgz", "lh.pial"]);
        let result = registry.apply_order(FileCategory::Volume, &[added[1]]);
        assert!(matches!(result, Err(RegistryError::WrongCategory { .. })));
        assert_eq!(registry.get(added[1]).unwrap().order(), None);
    }

    #[test]
    fn test_cached_point_set_becomes_active() {
        let (mut registry, added) = registry_with(&["a.mgz"]);
        registry.set_active(added[0]).unwrap();
        let handle = registry
            .create_cached_point_set(DEFAULT_POINT_SET_NAME, Rgb([255, 0, 0]))
            .unwrap();
        assert_eq!(registry.active().map(ProjectFile::handle), Some(handle));
        assert!(registry.create_cached_point_set(DEFAULT_POINT_SET_NAME, Rgb::WHITE).is_err());
    }

    #[test]
    fn test_attach_overlay() {
        let (mut registry, added) = registry_with(&["lh.pial"]);
        registry
            .attach(added[0], FileCategory::Overlay, raw("lh.thickness"))
            .unwrap();
        registry.attach_overlay(added[0], raw("lh.curv")).unwrap();
        assert!(registry.attach_overlay(added[0], raw("lh.curv")).is_err());
        assert!(
            registry
                .attach(added[0], FileCategory::Volume, raw("x.mgz"))
                .is_err()
        );

        let surface = registry.get(added[0]).unwrap().surface().unwrap();
        let active: Vec<bool> = surface.overlays.iter().map(|o| o.is_active).collect();
        assert_eq!(active, vec![false, true]);
    }

    #[test]
    fn test_attach_annotation() {
        let (mut registry, added) = registry_with(&["lh.pial", "a.mgz"]);
        let revision = registry.revision();

        registry.attach_annotation(added[0], raw("lh.aparc.annot")).unwrap();
        registry.attach_annotation(added[0], raw("lh.BA.annot")).unwrap();
        assert_eq!(registry.revision(), revision + 2);

        assert!(matches!(
            registry.attach_annotation(added[0], raw("lh.BA.annot")),
            Err(RegistryError::File(FileError::DuplicateName { .. }))
        ));
        assert!(matches!(
            registry.attach_annotation(added[1], raw("x.annot")),
            Err(RegistryError::WrongCategory { .. })
        ));
        assert_eq!(registry.revision(), revision + 2);

        let surface = registry.get(added[0]).unwrap().surface().unwrap();
        let annotations: Vec<(&str, bool)> = surface
            .annotations
            .iter()
            .map(|a| (a.name.as_str(), a.is_active))
            .collect();
        assert_eq!(annotations, vec![("lh.aparc.annot", false), ("lh.BA.annot", true)]);
        assert!(surface.overlays.is_empty());
    }

    #[test]
    fn test_promote_to_cloud() {
        let (mut registry, added) = registry_with(&["a.mgz"]);
        assert!(registry.promote_to_cloud(added[0], 5, "/api/Volume?Id=5".into()).unwrap());
        assert!(!registry.promote_to_cloud(added[0], 5, "/api/Volume?Id=5".into()).unwrap());
        assert!(registry.promote_to_cloud(added[0], 6, "/api/Volume?Id=6".into()).is_err());
        assert_eq!(registry.get(added[0]).unwrap().cloud_id(), Some(5));
    }

    #[test]
    fn test_subscribers_receive_events() {
        let mut registry = FileRegistry::new();
        let events = registry.subscribe();
        let outcome = registry.add_local_files(vec![raw("a.mgz")]);
        registry.set_checked(outcome.added[0], true).unwrap();
        registry.set_checked(outcome.added[0], false).unwrap();

        let received: Vec<RegistryEvent> = events.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(
            received[1].change,
            RegistryChange::Updated {
                handle: outcome.added[0],
                field: FileField::Checked
            }
        );
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut registry = FileRegistry::new();
        drop(registry.subscribe());
        registry.add_local_files(vec![raw("a.mgz")]);
        assert!(registry.subscribers.is_empty());
    }
}
