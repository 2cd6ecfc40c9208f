//! Unsynced edit tracking against a caller-supplied clock.

use super::SyncConfig;

/// Follows the registry revision and remembers when unsynced edits
/// happened.
///
/// Time is passed in as milliseconds on any monotonic clock the host
/// chooses, which keeps scheduling deterministic.
#[derive(Debug, Clone, Default)]
pub struct SyncTracker {
    revision: u64,
    pending: bool,
    syncing: bool,
    last_change_ms: Option<u64>,
    first_change_ms: Option<u64>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edits exist that no successful sync has covered.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    #[inline]
    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    /// Registry revision seen last.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record the registry revision at `now_ms`. Returns whether it moved.
    pub fn observe(&mut self, revision: u64, now_ms: u64) -> bool {
        if revision == self.revision {
            return false;
        }
        self.revision = revision;
        self.pending = true;
        self.last_change_ms = Some(now_ms);
        self.first_change_ms.get_or_insert(now_ms);
        true
    }

    /// Take `revision` as seen without counting it as an edit.
    pub fn absorb(&mut self, revision: u64) {
        self.revision = revision;
    }

    pub fn start_sync(&mut self) {
        self.syncing = true;
    }

    pub fn sync_complete(&mut self) {
        self.pending = false;
        self.syncing = false;
        self.last_change_ms = None;
        self.first_change_ms = None;
    }

    /// The edits stay pending and keep their timestamps.
    pub fn sync_failed(&mut self) {
        self.pending = true;
        self.syncing = false;
    }

    /// Clock time at which pending edits should be synced.
    ///
    /// Edits known only from a failed sync have no timestamps and are due
    /// at once.
    pub fn due_at(&self, config: &SyncConfig) -> Option<u64> {
        if !self.pending || self.syncing {
            return None;
        }
        match (self.last_change_ms, self.first_change_ms) {
            (Some(last), Some(first)) => config.due_at(last, first),
            _ => config.enabled.then_some(0),
        }
    }

    pub fn should_sync(&self, config: &SyncConfig, now_ms: u64) -> bool {
        self.due_at(config).is_some_and(|due| now_ms >= due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_is_clean() {
        let tracker = SyncTracker::new();
        assert!(!tracker.is_pending());
        assert_eq!(tracker.due_at(&SyncConfig::default()), None);
    }

    #[test]
    fn test_observe_only_counts_new_revisions() {
        let mut tracker = SyncTracker::new();
        assert!(!tracker.observe(0, 10));
        assert!(tracker.observe(3, 10));
        assert!(!tracker.observe(3, 90));
        assert!(tracker.is_pending());
        assert_eq!(tracker.due_at(&SyncConfig::default()), Some(510));
    }

    #[test]
    fn test_debounce_and_max_delay() {
        let config = SyncConfig::default();
        let mut tracker = SyncTracker::new();
        tracker.observe(1, 0);
        assert!(!tracker.should_sync(&config, 499));
        assert!(tracker.should_sync(&config, 500));

        // Edits every 400 ms never settle; the max delay forces a sync.
        for (revision, now) in (2..).zip((400..5_000).step_by(400)) {
            tracker.observe(revision, now);
            assert!(!tracker.should_sync(&config, now + 100), "{now}");
        }
        assert!(tracker.should_sync(&config, 5_000));
    }

    #[test]
    fn test_absorb_is_not_an_edit() {
        let mut tracker = SyncTracker::new();
        tracker.absorb(4);
        assert!(!tracker.is_pending());
        assert!(!tracker.observe(4, 0));
    }

    #[test]
    fn test_not_due_while_syncing() {
        let config = SyncConfig::default();
        let mut tracker = SyncTracker::new();
        tracker.observe(1, 0);
        tracker.start_sync();
        assert!(!tracker.should_sync(&config, 10_000));

        tracker.sync_complete();
        assert!(!tracker.is_pending());
        assert!(!tracker.should_sync(&config, 10_000));
    }

    #[test]
    fn test_failed_sync_keeps_edits_due() {
        let config = SyncConfig::default();
        let mut tracker = SyncTracker::new();
        tracker.observe(1, 100);
        tracker.start_sync();
        tracker.sync_failed();
        assert_eq!(tracker.due_at(&config), Some(600));

        let mut unobserved = SyncTracker::new();
        unobserved.start_sync();
        unobserved.sync_failed();
        assert_eq!(unobserved.due_at(&config), Some(0));
        assert_eq!(unobserved.due_at(&SyncConfig::disabled()), None);
    }
}
