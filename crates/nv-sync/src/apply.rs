//! Driving the adapters with a change batch.

use serde::Serialize;
use tracing::debug;

use nv_model::{FileHandle, FileRegistry};

use crate::adapter::{
    BackendApi, CreateFileRequest, CreatedFile, DeleteFileRequest, EditFileRequest, FileSettings,
    RenderEngine,
};
use crate::batch::{ChangeBatch, Operation};
use crate::error::{Result, SyncError};
use crate::snapshot::FileState;

/// What applying a batch did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    /// Files stored in the backend during this apply, to be promoted.
    pub created: Vec<(FileHandle, CreatedFile)>,
    pub engine_calls: usize,
    pub backend_calls: usize,
}

/// Apply a batch to the engine and, when the registry is bound to a backend
/// project, to the backend.
///
/// Operations run in [`ChangeBatch::operations`] order and stop at the first
/// adapter error. Backend rules:
///
/// - removed cloud files are deleted; files never stored need no call
/// - added, uploaded or updated files without a backend id are created, their
///   content read from the registry only now
/// - updated cloud files are edited with their full settings
pub fn apply_batch<E, B>(
    batch: &ChangeBatch,
    registry: &FileRegistry,
    engine: &mut E,
    backend: &mut B,
) -> Result<ApplyReport>
where
    E: RenderEngine + ?Sized,
    B: BackendApi + ?Sized,
{
    let mut report = ApplyReport::default();
    apply_into(batch, registry, engine, backend, &mut report)?;
    Ok(report)
}

/// Like [`apply_batch`], recording progress into `report` so that a caller
/// can still use the ids created before a failure.
pub(crate) fn apply_into<E, B>(
    batch: &ChangeBatch,
    registry: &FileRegistry,
    engine: &mut E,
    backend: &mut B,
    report: &mut ApplyReport,
) -> Result<()>
where
    E: RenderEngine + ?Sized,
    B: BackendApi + ?Sized,
{
    let project_id = registry.project_id();

    for operation in batch.operations() {
        match operation {
            Operation::Remove(file) => {
                engine
                    .remove(file)
                    .map_err(|err| SyncError::adapter("unload", &file.name, err))?;
                report.engine_calls += 1;

                if let (Some(_), Some(id)) = (project_id, file.cloud_id()) {
                    let request = DeleteFileRequest {
                        id,
                        category: file.category,
                    };
                    backend
                        .delete(&request)
                        .map_err(|err| SyncError::adapter("delete", &file.name, err))?;
                    report.backend_calls += 1;
                }
            }
            Operation::Add(file) => {
                engine
                    .add(file, file.render_index)
                    .map_err(|err| SyncError::adapter("load", &file.name, err))?;
                report.engine_calls += 1;

                if let Some(project_id) = project_id
                    && file.cloud_id().is_none()
                {
                    create(project_id, file, registry, backend, report)?;
                }
            }
            Operation::Upload(file) => {
                if let Some(project_id) = project_id {
                    create(project_id, file, registry, backend, report)?;
                }
            }
            Operation::Update(update) => {
                let file = &update.after;
                engine
                    .update(file, &update.fields)
                    .map_err(|err| SyncError::adapter("update", &file.name, err))?;
                report.engine_calls += 1;

                match (project_id, file.cloud_id()) {
                    (Some(_), Some(id)) => {
                        let request = EditFileRequest {
                            id,
                            category: file.category,
                            settings: FileSettings::of(file),
                        };
                        backend
                            .edit(&request)
                            .map_err(|err| SyncError::adapter("edit", &file.name, err))?;
                        report.backend_calls += 1;
                    }
                    (Some(project_id), None) => {
                        create(project_id, file, registry, backend, report)?;
                    }
                    (None, _) => {}
                }
            }
            Operation::Reindex(change) => {
                engine
                    .set_render_index(&change.file, change.index)
                    .map_err(|err| SyncError::adapter("reindex", &change.file.name, err))?;
                report.engine_calls += 1;
            }
        }
    }

    debug!(
        engine_calls = report.engine_calls,
        backend_calls = report.backend_calls,
        created = report.created.len(),
        "applied change batch"
    );
    Ok(())
}

fn create<B>(
    project_id: u64,
    file: &FileState,
    registry: &FileRegistry,
    backend: &mut B,
    report: &mut ApplyReport,
) -> Result<()>
where
    B: BackendApi + ?Sized,
{
    let Some(source) = registry.get(file.handle) else {
        return Ok(());
    };
    let Some(base64) = source.to_base64()? else {
        return Ok(());
    };

    let request = CreateFileRequest {
        project_id,
        category: file.category,
        file_name: file.name.clone(),
        file_size: source.size(),
        base64,
        settings: FileSettings::of(file),
    };
    let created = backend
        .create(&request)
        .map_err(|err| SyncError::adapter("create", &file.name, err))?;
    debug!(file = %file.name, id = created.id, "created file in backend");
    report.backend_calls += 1;
    report.created.push((file.handle, created));
    Ok(())
}
