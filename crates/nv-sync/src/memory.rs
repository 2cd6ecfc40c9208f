//! In-memory adapters for tests and offline runs.

use std::collections::BTreeMap;

use serde::Serialize;

use nv_model::{BackendProject, DEFAULT_OPACITY, FileCategory, FileDetails, FileField};

use crate::adapter::{
    BackendApi, CreateFileRequest, CreatedFile, DeleteFileRequest, EditFileRequest, FileSettings,
    RenderEngine,
};
use crate::error::AdapterError;
use crate::snapshot::FileState;

// =============================================================================
// BACKEND
// =============================================================================

/// A call received by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BackendCall {
    Create {
        category: FileCategory,
        file_name: String,
        id: u64,
    },
    Edit {
        category: FileCategory,
        id: u64,
    },
    Delete {
        category: FileCategory,
        id: u64,
    },
}

/// A file held by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub category: FileCategory,
    pub file_name: String,
    pub file_size: u64,
    pub content_length: usize,
    pub settings: FileSettings,
}

impl StoredFile {
    fn seeded(
        category: FileCategory,
        file_name: &str,
        file_size: u64,
        settings: FileSettings,
    ) -> Self {
        Self {
            category,
            file_name: file_name.to_string(),
            file_size,
            content_length: 0,
            settings,
        }
    }
}

/// Backend that stores files in a map and assigns sequential ids.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    next_id: u64,
    files: BTreeMap<u64, StoredFile>,
    calls: Vec<BackendCall>,
    offline: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Assign ids starting at `first_id`.
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            next_id: first_id,
            files: BTreeMap::new(),
            calls: Vec::new(),
            offline: false,
        }
    }

    /// Backend already holding the files of `project`. New ids continue
    /// after the highest stored one.
    pub fn from_project(project: &BackendProject) -> Self {
        let mut files = BTreeMap::new();
        for dto in &project.volumes {
            let settings = FileSettings {
                order: dto.order,
                visible: dto.visible,
                opacity: dto.opacity.unwrap_or(DEFAULT_OPACITY),
                color_map: dto.color_map.clone(),
                contrast_min: dto.contrast_min,
                contrast_max: dto.contrast_max,
                ..FileSettings::default()
            };
            let stored =
                StoredFile::seeded(FileCategory::Volume, &dto.file_name, dto.file_size, settings);
            files.insert(dto.id, stored);
        }
        for dto in &project.surfaces {
            let settings = FileSettings {
                order: dto.order,
                visible: dto.visible,
                opacity: dto.opacity.unwrap_or(DEFAULT_OPACITY),
                color: dto.color.clone(),
                ..FileSettings::default()
            };
            let stored =
                StoredFile::seeded(FileCategory::Surface, &dto.file_name, dto.file_size, settings);
            files.insert(dto.id, stored);
        }
        for dto in &project.point_sets {
            let settings = FileSettings {
                order: dto.order,
                visible: dto.visible,
                opacity: DEFAULT_OPACITY,
                data: dto.data.clone(),
                ..FileSettings::default()
            };
            let stored =
                StoredFile::seeded(FileCategory::PointSet, &dto.file_name, dto.file_size, settings);
            files.insert(dto.id, stored);
        }

        let next_id = files.keys().next_back().map_or(1, |id| id + 1);
        Self {
            next_id,
            files,
            calls: Vec::new(),
            offline: false,
        }
    }

    /// Make every following call fail as unreachable.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn files(&self) -> &BTreeMap<u64, StoredFile> {
        &self.files
    }

    /// Successful calls, in order.
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    fn check_online(&self) -> Result<(), AdapterError> {
        if self.offline {
            return Err(AdapterError::Unavailable("backend is offline".to_string()));
        }
        Ok(())
    }

    fn stored_mut(
        &mut self,
        id: u64,
        category: FileCategory,
    ) -> Result<&mut StoredFile, AdapterError> {
        match self.files.get_mut(&id) {
            Some(file) if file.category == category => Ok(file),
            _ => Err(AdapterError::Rejected(format!("no {} with id {}", category, id))),
        }
    }
}

impl BackendApi for MemoryBackend {
    fn create(&mut self, request: &CreateFileRequest) -> Result<CreatedFile, AdapterError> {
        self.check_online()?;
        let duplicate = self.files.values().any(|file| {
            file.category == request.category && file.file_name == request.file_name
        });
        if duplicate {
            return Err(AdapterError::Rejected(format!(
                "a {} named '{}' already exists",
                request.category, request.file_name
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.files.insert(
            id,
            StoredFile {
                category: request.category,
                file_name: request.file_name.clone(),
                file_size: request.file_size,
                content_length: request.base64.len(),
                settings: request.settings.clone(),
            },
        );
        self.calls.push(BackendCall::Create {
            category: request.category,
            file_name: request.file_name.clone(),
            id,
        });
        Ok(CreatedFile {
            id,
            url: request.category.cloud_url(id),
        })
    }

    fn edit(&mut self, request: &EditFileRequest) -> Result<(), AdapterError> {
        self.check_online()?;
        self.stored_mut(request.id, request.category)?.settings = request.settings.clone();
        self.calls.push(BackendCall::Edit {
            category: request.category,
            id: request.id,
        });
        Ok(())
    }

    fn delete(&mut self, request: &DeleteFileRequest) -> Result<(), AdapterError> {
        self.check_online()?;
        self.stored_mut(request.id, request.category)?;
        self.files.remove(&request.id);
        self.calls.push(BackendCall::Delete {
            category: request.category,
            id: request.id,
        });
        Ok(())
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// A call received by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum EngineCall {
    Add {
        name: String,
        render_index: Option<usize>,
    },
    Remove {
        name: String,
    },
    Update {
        name: String,
        fields: Vec<FileField>,
    },
    SetRenderIndex {
        name: String,
        index: usize,
    },
}

/// What the engine currently displays for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedFile {
    pub name: String,
    pub category: FileCategory,
    pub visible: bool,
    pub opacity: u8,
    pub render_index: Option<usize>,
    /// Color map in the engine's spelling, for volumes.
    pub colormap: Option<&'static str>,
}

impl LoadedFile {
    fn of(file: &FileState, render_index: Option<usize>) -> Self {
        let colormap = match &file.details {
            FileDetails::Volume(volume) => Some(volume.color_map.engine_name()),
            FileDetails::Surface(_) | FileDetails::PointSet(_) => None,
        };
        Self {
            name: file.name.clone(),
            category: file.category,
            visible: file.is_checked,
            opacity: file.opacity,
            render_index,
            colormap,
        }
    }
}

/// Key of a loaded file: names are unique within a category and survive
/// promotion to the cloud.
pub type EngineKey = (FileCategory, String);

fn key_of(file: &FileState) -> EngineKey {
    (file.category, file.name.clone())
}

/// Engine that records calls and keeps the displayed state in a map.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    loaded: BTreeMap<EngineKey, LoadedFile>,
    calls: Vec<EngineCall>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(&self) -> &BTreeMap<EngineKey, LoadedFile> {
        &self.loaded
    }

    /// Calls that changed the displayed state, in order.
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Visible files from bottom to top of the draw order.
    pub fn draw_order(&self) -> Vec<&str> {
        let mut visible: Vec<&LoadedFile> = self
            .loaded
            .values()
            .filter(|file| file.visible && file.render_index.is_some())
            .collect();
        visible.sort_by_key(|file| (file.category, file.render_index));
        visible.into_iter().map(|file| file.name.as_str()).collect()
    }
}

impl RenderEngine for RecordingEngine {
    fn add(&mut self, file: &FileState, render_index: Option<usize>) -> Result<(), AdapterError> {
        let loaded = LoadedFile::of(file, render_index);
        if self.loaded.get(&key_of(file)) == Some(&loaded) {
            return Ok(());
        }
        self.loaded.insert(key_of(file), loaded);
        self.calls.push(EngineCall::Add {
            name: file.name.clone(),
            render_index,
        });
        Ok(())
    }

    fn remove(&mut self, file: &FileState) -> Result<(), AdapterError> {
        if self.loaded.remove(&key_of(file)).is_some() {
            self.calls.push(EngineCall::Remove {
                name: file.name.clone(),
            });
        }
        Ok(())
    }

    fn update(&mut self, file: &FileState, fields: &[FileField]) -> Result<(), AdapterError> {
        if !self.loaded.contains_key(&key_of(file)) {
            return self.add(file, file.render_index);
        }
        self.loaded
            .insert(key_of(file), LoadedFile::of(file, file.render_index));
        self.calls.push(EngineCall::Update {
            name: file.name.clone(),
            fields: fields.to_vec(),
        });
        Ok(())
    }

    fn set_render_index(&mut self, file: &FileState, index: usize) -> Result<(), AdapterError> {
        match self.loaded.get_mut(&key_of(file)) {
            Some(loaded) => loaded.render_index = Some(index),
            None => return self.add(file, Some(index)),
        }
        self.calls.push(EngineCall::SetRenderIndex {
            name: file.name.clone(),
            index,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nv_model::{ColorMap, FileRegistry, InMemoryFile};

    use crate::snapshot::Snapshot;

    fn state(registry: &FileRegistry) -> FileState {
        Snapshot::capture(registry).files().next().cloned().unwrap()
    }

    #[test]
    fn test_backend_assigns_ids_and_urls() {
        let mut backend = MemoryBackend::starting_at(10);
        let request = CreateFileRequest {
            project_id: 1,
            category: FileCategory::Volume,
            file_name: "T1.mgz".to_string(),
            file_size: 3,
            base64: "YWJj".to_string(),
            settings: FileSettings::default(),
        };
        let created = backend.create(&request).unwrap();
        assert_eq!(created, CreatedFile { id: 10, url: "/api/Volume?Id=10".to_string() });
        assert!(matches!(backend.create(&request), Err(AdapterError::Rejected(_))));

        backend
            .delete(&DeleteFileRequest { id: 10, category: FileCategory::Volume })
            .unwrap();
        assert!(backend.files().is_empty());
        assert_eq!(backend.calls().len(), 2);
    }

    #[test]
    fn test_backend_from_project() {
        let project: BackendProject = serde_json::from_str(
            r#"{"id": 1, "name": "p",
                "volumes": [{"id": 9, "fileName": "a.mgz", "fileSize": 1, "colorMap": "heat"}],
                "surfaces": [{"id": 4, "fileName": "lh.pial", "fileSize": 2}]}"#,
        )
        .unwrap();
        let mut backend = MemoryBackend::from_project(&project);
        assert_eq!(backend.files().len(), 2);
        assert_eq!(backend.files()[&9].settings.color_map.as_deref(), Some("heat"));

        backend
            .edit(&EditFileRequest {
                id: 4,
                category: FileCategory::Surface,
                settings: FileSettings::default(),
            })
            .unwrap();
        let request = CreateFileRequest {
            project_id: 1,
            category: FileCategory::Volume,
            file_name: "b.mgz".to_string(),
            file_size: 1,
            base64: "Yg==".to_string(),
            settings: FileSettings::default(),
        };
        assert_eq!(backend.create(&request).unwrap().id, 10);
        assert_eq!(MemoryBackend::from_project(&BackendProject::default()).next_id, 1);
    }

    #[test]
    fn test_offline_backend_fails() {
        let mut backend = MemoryBackend::new();
        backend.set_offline(true);
        let result = backend.delete(&DeleteFileRequest { id: 1, category: FileCategory::Volume });
        assert!(matches!(result, Err(AdapterError::Unavailable(_))));
    }

    #[test]
    fn test_engine_add_is_idempotent() {
        let mut registry = FileRegistry::new();
        registry.add_local_files([InMemoryFile::new("T1.mgz", b"x".to_vec()).shared()]);
        let file = state(&registry);

        let mut engine = RecordingEngine::new();
        engine.add(&file, Some(0)).unwrap();
        engine.add(&file, Some(0)).unwrap();
        assert_eq!(engine.calls().len(), 1);
        assert_eq!(engine.draw_order(), vec!["T1.mgz"]);
    }

    #[test]
    fn test_engine_uses_engine_colormap_names() {
        let mut registry = FileRegistry::new();
        let handle = registry
            .add_local_files([InMemoryFile::new("T1.mgz", b"x".to_vec()).shared()])
            .added[0];
        registry.set_color_map(handle, ColorMap::Heat).unwrap();

        let mut engine = RecordingEngine::new();
        let file = state(&registry);
        engine.update(&file, &[FileField::ColorMap]).unwrap();
        let loaded = engine.loaded().values().next().unwrap();
        assert_eq!(loaded.colormap, Some("Hot"));
    }
}
