//! A sync session: the baseline snapshot plus its update rules.

use tracing::{info, warn};

use nv_model::FileRegistry;

use crate::adapter::{BackendApi, RenderEngine};
use crate::apply::{ApplyReport, apply_into};
use crate::batch::{ChangeBatch, ChangeDetector};
use crate::error::Result;
use crate::schedule::{SyncConfig, SyncTracker};
use crate::snapshot::Snapshot;

/// Owns the last synchronized snapshot of one registry.
///
/// The snapshot only advances after every adapter call of a batch
/// succeeded. Ids created before a failure are still merged into the
/// registry, so a retry never uploads the same file twice.
#[derive(Debug, Clone, Default)]
pub struct SyncSession {
    snapshot: Snapshot,
    tracker: SyncTracker,
    config: SyncConfig,
}

impl SyncSession {
    /// Start from an empty baseline: the first sync pushes every file.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            snapshot: Snapshot::empty(),
            tracker: SyncTracker::new(),
            config,
        }
    }

    /// Start from the registry's current state, treating it as synced.
    pub fn with_baseline(registry: &FileRegistry, config: SyncConfig) -> Self {
        let mut tracker = SyncTracker::new();
        tracker.absorb(registry.revision());
        Self {
            snapshot: Snapshot::capture(registry),
            tracker,
            config,
        }
    }

    #[inline]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[inline]
    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    #[inline]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Changes not yet applied.
    pub fn pending(&self, registry: &FileRegistry) -> ChangeBatch {
        ChangeDetector::detect(&self.snapshot, registry)
    }

    /// Feed the registry revision to the debounce tracker. `now_ms` is the
    /// host's clock.
    pub fn observe(&mut self, registry: &FileRegistry, now_ms: u64) -> bool {
        self.tracker.observe(registry.revision(), now_ms)
    }

    /// Clock time at which an automatic sync should run, if one is pending.
    pub fn due_at(&self) -> Option<u64> {
        self.tracker.due_at(&self.config)
    }

    /// Whether an automatic sync should run at `now_ms`.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.tracker.should_sync(&self.config, now_ms)
    }

    /// Run one detection cycle and apply its batch.
    ///
    /// An empty batch issues no adapter call.
    pub fn sync<E, B>(
        &mut self,
        registry: &mut FileRegistry,
        engine: &mut E,
        backend: &mut B,
    ) -> Result<ApplyReport>
    where
        E: RenderEngine + ?Sized,
        B: BackendApi + ?Sized,
    {
        // Everything up to this revision is in the batch.
        self.tracker.absorb(registry.revision());
        let batch = ChangeDetector::detect(&self.snapshot, registry);
        if batch.is_empty() {
            self.tracker.sync_complete();
            return Ok(ApplyReport::default());
        }

        self.tracker.start_sync();
        let mut report = ApplyReport::default();
        let applied = apply_into(&batch, registry, engine, backend, &mut report);

        let promoted = report.created.iter().try_for_each(|(handle, created)| {
            registry
                .promote_to_cloud(*handle, created.id, created.url.clone())
                .map(|_| ())
        });
        // Promotion bumps the revision; that is not a user change.
        self.tracker.absorb(registry.revision());

        match applied.and(promoted.map_err(Into::into)) {
            Ok(()) => {
                self.snapshot = Snapshot::capture(registry);
                self.tracker.sync_complete();
                info!(
                    operations = batch.len(),
                    created = report.created.len(),
                    "sync complete"
                );
                Ok(report)
            }
            Err(err) => {
                self.tracker.sync_failed();
                warn!(error = %err, "sync failed, snapshot kept");
                Err(err)
            }
        }
    }
}
