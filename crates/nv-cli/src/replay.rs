//! Scripted replay of UI sessions.
//!
//! A script is a JSON document with a list of steps, each one a user action
//! (picking files, dragging a row, pressing a key) or a sync cycle. Steps run
//! against a real [`FileRegistry`] with [`OrderState`] lists for every
//! category, and sync cycles apply their change batches to in-memory
//! adapters.
//!
//! Replays run on a virtual clock that only `wait` steps advance. A `wait`
//! syncs when the `[sync]` settings say edits are due, like a host polling
//! its session.
//!
//! ```json
//! {
//!   "multiselect": true,
//!   "steps": [
//!     { "step": "bind_project", "id": 7 },
//!     { "step": "add", "files": [{ "name": "T1.mgz", "content": "..." }] },
//!     { "step": "drag", "category": "volume", "name": "T1.mgz", "from_y": 5, "to_y": 60 },
//!     { "step": "sync" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nv_model::{
    BackendProject, ColorMap, DEFAULT_POINT_SET_NAME, DiskFile, FileCategory, FileHandle,
    FileRegistry, InMemoryFile, Provenance, RegistryEvent, Rgb, SharedRawFile,
};
use nv_order::{DropOutcome, Key, OrderState};
use nv_sync::{MemoryBackend, RecordingEngine, SyncSession};

use crate::settings::Settings;

// =============================================================================
// SCRIPT
// =============================================================================

/// A replay script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    /// Allow toggling visibility with a modifier click.
    #[serde(default)]
    pub multiselect: bool,
    pub steps: Vec<Step>,
}

impl Script {
    /// Read a script from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid script {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A file picked by the user: inline content, or a path relative to the
/// script.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScriptFile {
    Disk {
        path: PathBuf,
    },
    Inline {
        name: String,
        #[serde(default)]
        content: String,
    },
}

/// One user action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Pick files from disk.
    Add { files: Vec<ScriptFile> },
    Remove { category: FileCategory, name: String },
    /// Set the visibility checkbox.
    Check {
        category: FileCategory,
        name: String,
        checked: bool,
    },
    Activate { category: FileCategory, name: String },
    Opacity {
        category: FileCategory,
        name: String,
        opacity: u8,
    },
    ColorMap { name: String, color_map: ColorMap },
    Color {
        category: FileCategory,
        name: String,
        color: Rgb,
    },
    /// Press on a row at `from_y`, move to `to_y` and release.
    Drag {
        category: FileCategory,
        name: String,
        from_y: f64,
        to_y: f64,
    },
    /// Press on a row at `at_y`, move to `to_y`, then press Escape.
    CancelledDrag {
        category: FileCategory,
        name: String,
        at_y: f64,
        to_y: f64,
    },
    Click { category: FileCategory, name: String },
    KeyDown { key: String },
    KeyUp { key: String },
    /// Replace the project with one loaded from the backend.
    OpenProject { project: BackendProject },
    /// Bind the project to a backend id, or unbind it.
    BindProject { id: Option<u64> },
    CreatePointSet {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        color: Option<Rgb>,
    },
    /// Make the backend unreachable, or reachable again.
    Offline { offline: bool },
    /// Run one detection cycle and apply its batch.
    Sync,
    /// Let `ms` pass, then sync if automatic sync is due.
    Wait { ms: u64 },
}

impl Step {
    /// Short name of the action.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Check { .. } => "check",
            Self::Activate { .. } => "activate",
            Self::Opacity { .. } => "opacity",
            Self::ColorMap { .. } => "color_map",
            Self::Color { .. } => "color",
            Self::Drag { .. } => "drag",
            Self::CancelledDrag { .. } => "cancelled_drag",
            Self::Click { .. } => "click",
            Self::KeyDown { .. } => "key_down",
            Self::KeyUp { .. } => "key_up",
            Self::OpenProject { .. } => "open_project",
            Self::BindProject { .. } => "bind_project",
            Self::CreatePointSet { .. } => "create_point_set",
            Self::Offline { .. } => "offline",
            Self::Sync => "sync",
            Self::Wait { .. } => "wait",
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// One-based position in the script.
    pub index: usize,
    pub action: &'static str,
    pub result: String,
    /// Registry events emitted by the step.
    pub events: usize,
    pub failed: bool,
}

/// Final state of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRow {
    pub category: FileCategory,
    pub name: String,
    pub provenance: Provenance,
    pub visible: bool,
    pub active: bool,
    pub order: Option<u32>,
    pub render_index: Option<usize>,
}

/// Everything a replay did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepRecord>,
    /// Files in list order, category by category.
    pub files: Vec<FileRow>,
    /// Visible files as drawn by the engine, bottom to top.
    pub draw_order: Vec<String>,
    /// Files stored in the backend.
    pub stored: usize,
    /// Changes made after the last successful sync.
    pub unsynced: usize,
}

impl ReplayReport {
    pub fn has_errors(&self) -> bool {
        self.steps.iter().any(|step| step.failed)
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// A UI session driven by a script.
pub struct Replay {
    registry: FileRegistry,
    lists: BTreeMap<FileCategory, OrderState>,
    session: SyncSession,
    engine: RecordingEngine,
    backend: MemoryBackend,
    events: Receiver<RegistryEvent>,
    base_dir: PathBuf,
    /// Virtual time in milliseconds.
    clock_ms: u64,
}

impl Replay {
    /// Start an empty session. Disk paths in scripts resolve against
    /// `base_dir`.
    pub fn new(settings: &Settings, multiselect: bool, base_dir: impl Into<PathBuf>) -> Self {
        let mut registry = FileRegistry::with_classifier(settings.file_types.clone());
        let events = registry.subscribe();
        let lists = FileCategory::TOP_LEVEL
            .into_iter()
            .map(|category| {
                let list = OrderState::new(&registry, category, multiselect, settings.order);
                (category, list)
            })
            .collect();

        Self {
            registry,
            lists,
            session: SyncSession::new(settings.sync.clone()),
            engine: RecordingEngine::new(),
            backend: MemoryBackend::new(),
            events,
            base_dir: base_dir.into(),
            clock_ms: 0,
        }
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &RecordingEngine {
        &self.engine
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    /// Run every step of a script. Failed steps are recorded and the replay
    /// continues.
    pub fn run(&mut self, script: &Script) -> ReplayReport {
        let steps = script
            .steps
            .iter()
            .enumerate()
            .map(|(position, step)| self.record(position + 1, step))
            .collect();
        self.report(steps)
    }

    fn record(&mut self, index: usize, step: &Step) -> StepRecord {
        let outcome = self.apply(step);
        for list in self.lists.values_mut() {
            list.refresh(&self.registry);
        }
        self.session.observe(&self.registry, self.clock_ms);
        let events = self.events.try_iter().count();

        match outcome {
            Ok(result) => {
                debug!(index, action = step.label(), %result, events, "step applied");
                StepRecord {
                    index,
                    action: step.label(),
                    result,
                    events,
                    failed: false,
                }
            }
            Err(err) => {
                warn!(index, action = step.label(), error = %err, "step failed");
                StepRecord {
                    index,
                    action: step.label(),
                    result: format!("{err:#}"),
                    events,
                    failed: true,
                }
            }
        }
    }

    fn apply(&mut self, step: &Step) -> Result<String> {
        match step {
            Step::Add { files } => self.add(files),
            Step::Remove { category, name } => {
                let handle = self.handle(*category, name)?;
                let removed = self.registry.remove(handle)?;
                Ok(format!("removed {}", removed.name()))
            }
            Step::Check {
                category,
                name,
                checked,
            } => {
                let handle = self.handle(*category, name)?;
                let changed = self.registry.set_checked(handle, *checked)?;
                Ok(changed_or_unchanged(changed, || {
                    format!("{} {}", name, if *checked { "shown" } else { "hidden" })
                }))
            }
            Step::Activate { category, name } => {
                let handle = self.handle(*category, name)?;
                let changed = self.registry.set_active(handle)?;
                Ok(changed_or_unchanged(changed, || format!("{name} active")))
            }
            Step::Opacity {
                category,
                name,
                opacity,
            } => {
                let handle = self.handle(*category, name)?;
                let changed = self.registry.set_opacity(handle, *opacity)?;
                Ok(changed_or_unchanged(changed, || {
                    format!("{name} opacity {opacity}")
                }))
            }
            Step::ColorMap { name, color_map } => {
                let handle = self.handle(FileCategory::Volume, name)?;
                let changed = self.registry.set_color_map(handle, *color_map)?;
                Ok(changed_or_unchanged(changed, || {
                    format!("{name} color map {}", color_map.label())
                }))
            }
            Step::Color {
                category,
                name,
                color,
            } => {
                let handle = self.handle(*category, name)?;
                let changed = self.registry.set_color(handle, *color)?;
                Ok(changed_or_unchanged(changed, || format!("{name} color {color}")))
            }
            Step::Drag {
                category,
                name,
                from_y,
                to_y,
            } => {
                let handle = self.handle(*category, name)?;
                let list = list_mut(&mut self.lists, *category)?;
                list.start_drag(*from_y, handle)?;
                list.update_drag(*to_y)?;
                let outcome = list.drop(&mut self.registry)?;
                Ok(self.describe(&outcome))
            }
            Step::CancelledDrag {
                category,
                name,
                at_y,
                to_y,
            } => {
                let handle = self.handle(*category, name)?;
                let list = list_mut(&mut self.lists, *category)?;
                list.start_drag(*at_y, handle)?;
                list.update_drag(*to_y)?;
                list.handle_key_down(Key::Escape);
                Ok("drag cancelled".to_string())
            }
            Step::Click { category, name } => {
                let handle = self.handle(*category, name)?;
                let list = list_mut(&mut self.lists, *category)?;
                let outcome = list.click(handle, &mut self.registry)?;
                Ok(self.describe(&outcome))
            }
            Step::KeyDown { key } => {
                let handled = self.press(key, true);
                Ok(if handled { format!("{key} down") } else { "ignored".to_string() })
            }
            Step::KeyUp { key } => {
                let handled = self.press(key, false);
                Ok(if handled { format!("{key} up") } else { "ignored".to_string() })
            }
            Step::OpenProject { project } => {
                self.registry.load_backend_project(project)?;
                // What the backend returned is in sync by definition.
                let config = self.session.config().clone();
                self.session = SyncSession::with_baseline(&self.registry, config);
                self.backend = MemoryBackend::from_project(project);
                Ok(format!(
                    "opened '{}' with {} files",
                    project.name,
                    self.registry.len()
                ))
            }
            Step::BindProject { id } => {
                self.registry.set_project_id(*id);
                Ok(match id {
                    Some(id) => format!("bound to project {id}"),
                    None => "unbound".to_string(),
                })
            }
            Step::CreatePointSet { name, color } => {
                let name = name.as_deref().unwrap_or(DEFAULT_POINT_SET_NAME);
                self.registry
                    .create_cached_point_set(name, color.unwrap_or_default())?;
                self.commit_initial()?;
                Ok(format!("created {name}"))
            }
            Step::Offline { offline } => {
                self.backend.set_offline(*offline);
                let state = if *offline { "offline" } else { "online" };
                Ok(format!("backend {state}"))
            }
            Step::Sync => self.sync(),
            Step::Wait { ms } => self.wait(*ms),
        }
    }

    fn add(&mut self, files: &[ScriptFile]) -> Result<String> {
        let raw = files
            .iter()
            .map(|file| self.open(file))
            .collect::<Result<Vec<_>>>()?;
        let outcome = self.registry.add_local_files(raw);
        self.commit_initial()?;

        let mut result = format!("added {}", outcome.added.len());
        if !outcome.rejected.is_empty() {
            let reasons: Vec<String> = outcome
                .rejected
                .iter()
                .map(|err| err.user_message())
                .collect();
            result.push_str(&format!(", rejected {} ({})", reasons.len(), reasons.join("; ")));
        }
        Ok(result)
    }

    fn open(&self, file: &ScriptFile) -> Result<SharedRawFile> {
        match file {
            ScriptFile::Disk { path } => {
                let path = self.base_dir.join(path);
                let disk = DiskFile::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                Ok(disk.shared())
            }
            ScriptFile::Inline { name, content } => {
                Ok(InMemoryFile::new(name.as_str(), content.as_bytes()).shared())
            }
        }
    }

    fn sync(&mut self) -> Result<String> {
        let batch = self.session.pending(&self.registry);
        let report = self
            .session
            .sync(&mut self.registry, &mut self.engine, &mut self.backend)
            .map_err(|err| match err.suggestion() {
                Some(hint) => anyhow!("{} {}", err.user_message(), hint),
                None => anyhow!(err.user_message()),
            })?;

        if batch.is_empty() {
            return Ok("nothing to sync".to_string());
        }
        let uploads = if batch.uploads.is_empty() {
            String::new()
        } else {
            format!(" upload {}", batch.uploads.len())
        };
        Ok(format!(
            "-{} +{} ~{} reindex {}{}; {} engine, {} backend calls, {} created",
            batch.removed.len(),
            batch.added.len(),
            batch.updated.len(),
            batch.render_order.len(),
            uploads,
            report.engine_calls,
            report.backend_calls,
            report.created.len()
        ))
    }

    fn wait(&mut self, ms: u64) -> Result<String> {
        self.clock_ms = self.clock_ms.saturating_add(ms);
        if self.session.is_due(self.clock_ms) {
            let result = self.sync()?;
            return Ok(format!("{ms} ms, {result}"));
        }

        let state = if !self.session.tracker().is_pending() {
            "nothing pending".to_string()
        } else {
            match self.session.due_at() {
                Some(due) => format!("due in {} ms", due.saturating_sub(self.clock_ms)),
                None => "auto sync off".to_string(),
            }
        };
        Ok(format!("{ms} ms, {state}"))
    }

    /// Give newly placed files an explicit order in every idle list.
    fn commit_initial(&mut self) -> Result<()> {
        for list in self.lists.values_mut() {
            if list.is_dragging() {
                continue;
            }
            list.commit_initial(&mut self.registry)?;
        }
        Ok(())
    }

    fn press(&mut self, name: &str, down: bool) -> bool {
        let key = Key::from_name(name);
        self.lists.values_mut().fold(false, |handled, list| {
            let this = if down {
                list.handle_key_down(key)
            } else {
                list.handle_key_up(key)
            };
            handled | this
        })
    }

    fn handle(&self, category: FileCategory, name: &str) -> Result<FileHandle> {
        match self.registry.find(category, name) {
            Some(file) => Ok(file.handle()),
            None => bail!("no {category} named '{name}'"),
        }
    }

    fn name_of(&self, handle: FileHandle) -> String {
        self.registry
            .get(handle)
            .map(|file| file.name().to_string())
            .unwrap_or_else(|| handle.to_string())
    }

    fn describe(&self, outcome: &DropOutcome) -> String {
        match outcome {
            DropOutcome::Activated(handle) => format!("{} active", self.name_of(*handle)),
            DropOutcome::Toggled { handle, checked } => format!(
                "{} {}",
                self.name_of(*handle),
                if *checked { "shown" } else { "hidden" }
            ),
            DropOutcome::Reordered(sequence) => {
                let names: Vec<String> = sequence.iter().map(|h| self.name_of(*h)).collect();
                format!("order {}", names.join(", "))
            }
            DropOutcome::Unchanged => "unchanged".to_string(),
        }
    }

    fn report(&self, steps: Vec<StepRecord>) -> ReplayReport {
        let mut files = Vec::new();
        for category in FileCategory::TOP_LEVEL {
            let render: BTreeMap<FileHandle, usize> =
                self.registry.render_order(category).into_iter().collect();
            files.extend(self.registry.ordered(category).into_iter().map(|file| FileRow {
                category,
                name: file.name().to_string(),
                provenance: file.provenance(),
                visible: file.is_checked(),
                active: file.is_active(),
                order: file.order(),
                render_index: render.get(&file.handle()).copied(),
            }));
        }

        ReplayReport {
            steps,
            files,
            draw_order: self
                .engine
                .draw_order()
                .into_iter()
                .map(str::to_string)
                .collect(),
            stored: self.backend.files().len(),
            unsynced: self.session.pending(&self.registry).len(),
        }
    }
}

fn list_mut(
    lists: &mut BTreeMap<FileCategory, OrderState>,
    category: FileCategory,
) -> Result<&mut OrderState> {
    lists
        .get_mut(&category)
        .ok_or_else(|| anyhow!("{category} files cannot be reordered"))
}

fn changed_or_unchanged(changed: bool, describe: impl FnOnce() -> String) -> String {
    if changed {
        describe()
    } else {
        "unchanged".to_string()
    }
}
