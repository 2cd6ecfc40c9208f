//! The reorder state machine of one category list.

use tracing::{debug, trace};

use nv_model::{FileCategory, FileHandle, FileRegistry};

use crate::error::{OrderError, Result};
use crate::row::{OrderConfig, OrderRow};

// =============================================================================
// KEYS
// =============================================================================

/// Keyboard keys the list reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Control or Meta: switches clicks to toggling visibility.
    Modifier,
    /// Cancels a drag in progress.
    Escape,
    Other,
}

impl Key {
    /// Map a DOM-style key name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Control" | "Meta" => Self::Modifier,
            "Escape" => Self::Escape,
            _ => Self::Other,
        }
    }
}

// =============================================================================
// PHASE
// =============================================================================

/// A drag gesture in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DragGesture {
    /// File being dragged.
    pub handle: FileHandle,
    /// Pointer position when the drag started.
    pub start_pointer_y: f64,
    /// Latest pointer position.
    pub pointer_y: f64,
    start_top: f64,
    pre_drag: Vec<FileHandle>,
    moved: bool,
}

impl DragGesture {
    /// The pointer travelled beyond the click threshold at some point.
    #[inline]
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// Row sequence before the drag started.
    #[inline]
    pub fn pre_drag(&self) -> &[FileHandle] {
        &self.pre_drag
    }
}

/// Interaction phase of a list.
///
/// Each variant carries exactly the data of that phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging(DragGesture),
}

/// What a drop (or click) did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The clicked file became the active file.
    Activated(FileHandle),
    /// The clicked file's visibility was toggled (multi-select).
    Toggled { handle: FileHandle, checked: bool },
    /// The category was reordered into this sequence.
    Reordered(Vec<FileHandle>),
    /// Nothing changed.
    Unchanged,
}

// =============================================================================
// ORDER STATE
// =============================================================================

/// Derived row list of one category plus the live drag gesture.
///
/// Rows are kept in rank order. While idle, ranks follow the registry's list
/// order; while dragging, ranks are provisional and only committed by
/// [`drop`](Self::drop).
#[derive(Debug, Clone)]
pub struct OrderState {
    category: FileCategory,
    config: OrderConfig,
    multiselect: bool,
    modifier_held: bool,
    rows: Vec<OrderRow>,
    phase: DragPhase,
}

impl OrderState {
    /// Build the list of `category` from the registry.
    pub fn new(
        registry: &FileRegistry,
        category: FileCategory,
        multiselect: bool,
        config: OrderConfig,
    ) -> Self {
        let mut state = Self {
            category,
            config,
            multiselect,
            modifier_held: false,
            rows: Vec::new(),
            phase: DragPhase::Idle,
        };
        state.rows = state.derive_rows(registry);
        state
    }

    #[inline]
    pub fn category(&self) -> FileCategory {
        self.category
    }

    #[inline]
    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    /// Rows in rank order.
    #[inline]
    pub fn rows(&self) -> &[OrderRow] {
        &self.rows
    }

    pub fn row(&self, handle: FileHandle) -> Option<&OrderRow> {
        self.rows.iter().find(|row| row.handle == handle)
    }

    /// File handles in rank order.
    pub fn sequence(&self) -> Vec<FileHandle> {
        self.rows.iter().map(|row| row.handle).collect()
    }

    #[inline]
    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging(_))
    }

    /// File being dragged, if any.
    pub fn dragged(&self) -> Option<FileHandle> {
        match &self.phase {
            DragPhase::Dragging(gesture) => Some(gesture.handle),
            DragPhase::Idle => None,
        }
    }

    #[inline]
    pub fn is_multiselect(&self) -> bool {
        self.multiselect
    }

    #[inline]
    pub fn modifier_held(&self) -> bool {
        self.modifier_held
    }

    // -------------------------------------------------------------------------
    // Drag gesture
    // -------------------------------------------------------------------------

    /// Idle → Dragging.
    pub fn start_drag(&mut self, pointer_y: f64, handle: FileHandle) -> Result<()> {
        if let DragPhase::Dragging(gesture) = &self.phase {
            return Err(OrderError::DragInProgress {
                handle: gesture.handle,
            });
        }
        let (rank, start_top) = self
            .row(handle)
            .map(|row| (row.rank, row.top))
            .ok_or(OrderError::UnknownRow { handle })?;

        debug!(category = %self.category, %handle, rank, "drag started");
        self.phase = DragPhase::Dragging(DragGesture {
            handle,
            start_pointer_y: pointer_y,
            pointer_y,
            start_top,
            pre_drag: self.sequence(),
            moved: false,
        });
        self.mark_dragged(Some(handle));
        Ok(())
    }

    /// Dragging → Dragging: move the dragged row with the pointer.
    ///
    /// The dragged row's rank is a function of the pointer position alone,
    /// so a stationary pointer never flips ranks back and forth. Returns
    /// whether the provisional ranks changed.
    pub fn update_drag(&mut self, pointer_y: f64) -> Result<bool> {
        let DragPhase::Dragging(gesture) = &mut self.phase else {
            return Err(OrderError::NotDragging);
        };
        gesture.pointer_y = pointer_y;
        if (pointer_y - gesture.start_pointer_y).abs() > self.config.click_threshold {
            gesture.moved = true;
        }

        let gesture = gesture.clone();
        let changed = self.layout(&gesture);
        trace!(pointer_y, changed, "drag updated");
        Ok(changed)
    }

    /// Dragging → Idle, committing the result to the registry.
    ///
    /// A gesture that never left the click threshold is a click. A drag that
    /// ends in the pre-drag sequence leaves the registry untouched.
    pub fn drop(&mut self, registry: &mut FileRegistry) -> Result<DropOutcome> {
        let DragPhase::Dragging(gesture) = std::mem::take(&mut self.phase) else {
            return Err(OrderError::NotDragging);
        };
        self.mark_dragged(None);

        if !gesture.moved {
            self.arrange(&gesture.pre_drag);
            return self.click(gesture.handle, registry);
        }

        let sequence = self.sequence();
        self.arrange(&sequence);
        if sequence == gesture.pre_drag {
            debug!(category = %self.category, "drop without rank change");
            return Ok(DropOutcome::Unchanged);
        }

        if let Err(err) = registry.apply_order(self.category, &sequence) {
            self.arrange(&gesture.pre_drag);
            return Err(err.into());
        }
        debug!(category = %self.category, handle = %gesture.handle, "drop committed new order");
        Ok(DropOutcome::Reordered(sequence))
    }

    /// Abort a drag and restore the pre-drag ranks.
    pub fn cancel(&mut self) -> bool {
        let DragPhase::Dragging(gesture) = std::mem::take(&mut self.phase) else {
            return false;
        };
        self.mark_dragged(None);
        self.arrange(&gesture.pre_drag);
        debug!(category = %self.category, handle = %gesture.handle, "drag cancelled");
        true
    }

    /// Selection behaviour of a click on a row.
    ///
    /// With multi-select enabled and the modifier held, a click toggles the
    /// file's visibility. Otherwise it makes the file the only active file.
    pub fn click(&mut self, handle: FileHandle, registry: &mut FileRegistry) -> Result<DropOutcome> {
        if self.row(handle).is_none() {
            return Err(OrderError::UnknownRow { handle });
        }

        let outcome = if self.multiselect && self.modifier_held {
            let checked = !registry
                .get(handle)
                .ok_or(OrderError::UnknownRow { handle })?
                .is_checked();
            registry.set_checked(handle, checked)?;
            DropOutcome::Toggled { handle, checked }
        } else if registry.set_active(handle)? {
            DropOutcome::Activated(handle)
        } else {
            DropOutcome::Unchanged
        };

        self.sync_flags(registry);
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Keyboard
    // -------------------------------------------------------------------------

    /// Returns whether the key was handled.
    pub fn handle_key_down(&mut self, key: Key) -> bool {
        match key {
            Key::Modifier => {
                self.modifier_held = true;
                true
            }
            Key::Escape => self.cancel(),
            Key::Other => false,
        }
    }

    /// Returns whether the key was handled.
    pub fn handle_key_up(&mut self, key: Key) -> bool {
        match key {
            Key::Modifier => {
                self.modifier_held = false;
                true
            }
            Key::Escape | Key::Other => false,
        }
    }

    // -------------------------------------------------------------------------
    // Registry sync
    // -------------------------------------------------------------------------

    /// Re-derive rows after registry changes.
    ///
    /// A drag survives as long as its file does; its pre-drag sequence is
    /// replaced by the registry's current list order.
    pub fn refresh(&mut self, registry: &FileRegistry) {
        let dragged_top = self
            .dragged()
            .and_then(|handle| self.row(handle))
            .map(|row| row.top);
        self.rows = self.derive_rows(registry);

        let DragPhase::Dragging(gesture) = &mut self.phase else {
            return;
        };
        if self.rows.iter().all(|row| row.handle != gesture.handle) {
            debug!(category = %self.category, handle = %gesture.handle, "dragged file removed, drag cancelled");
            self.phase = DragPhase::Idle;
            return;
        }

        // The row stays under the pointer: restart the gesture from where
        // the row is drawn now.
        gesture.pre_drag = self.rows.iter().map(|row| row.handle).collect();
        if let Some(top) = dragged_top {
            gesture.start_top = top;
        }
        gesture.start_pointer_y = gesture.pointer_y;
        let gesture = gesture.clone();
        self.mark_dragged(Some(gesture.handle));
        self.layout(&gesture);
    }

    /// Give every file of the category an explicit `order` matching its
    /// current list position. Used when files are first placed.
    pub fn commit_initial(&mut self, registry: &mut FileRegistry) -> Result<bool> {
        if let Some(handle) = self.dragged() {
            return Err(OrderError::DragInProgress { handle });
        }

        let sequence: Vec<FileHandle> = registry
            .ordered(self.category)
            .into_iter()
            .map(|file| file.handle())
            .collect();
        let changed = registry.apply_order(self.category, &sequence)?;
        self.refresh(registry);
        Ok(changed)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn derive_rows(&self, registry: &FileRegistry) -> Vec<OrderRow> {
        registry
            .ordered(self.category)
            .into_iter()
            .enumerate()
            .map(|(rank, file)| OrderRow::from_file(file, rank, &self.config))
            .collect()
    }

    /// Place the dragged row under the pointer and collapse the others
    /// around it. Returns whether the sequence changed.
    fn layout(&mut self, gesture: &DragGesture) -> bool {
        let count = gesture.pre_drag.len();
        if count == 0 {
            return false;
        }

        let max_top = self.config.top_of(count - 1);
        let delta = gesture.pointer_y - gesture.start_pointer_y;
        let top = if self.config.is_valid() {
            (gesture.start_top + delta).clamp(0.0, max_top)
        } else {
            0.0
        };
        let target = if self.config.is_valid() && top.is_finite() {
            ((top / self.config.row_height).round() as usize).min(count - 1)
        } else {
            0
        };

        let mut sequence: Vec<FileHandle> = gesture
            .pre_drag
            .iter()
            .copied()
            .filter(|handle| *handle != gesture.handle)
            .collect();
        sequence.insert(target.min(sequence.len()), gesture.handle);

        let changed = self.sequence() != sequence;
        self.arrange(&sequence);
        if let Some(row) = self.rows.iter_mut().find(|row| row.handle == gesture.handle) {
            row.top = top;
        }
        changed
    }

    /// Sort rows into `sequence` and snap them to their slots.
    fn arrange(&mut self, sequence: &[FileHandle]) {
        self.rows.sort_by_key(|row| {
            sequence
                .iter()
                .position(|handle| *handle == row.handle)
                .unwrap_or(usize::MAX)
        });
        for (rank, row) in self.rows.iter_mut().enumerate() {
            row.rank = rank;
            row.top = self.config.top_of(rank);
        }
    }

    fn mark_dragged(&mut self, handle: Option<FileHandle>) {
        for row in &mut self.rows {
            row.is_dragged = Some(row.handle) == handle;
        }
    }

    fn sync_flags(&mut self, registry: &FileRegistry) {
        for row in &mut self.rows {
            if let Some(file) = registry.get(row.handle) {
                row.is_checked = file.is_checked();
                row.is_active = file.is_active();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nv_model::InMemoryFile;

    fn setup(names: &[&str]) -> (FileRegistry, Vec<FileHandle>, OrderState) {
        let mut registry = FileRegistry::new();
        let added = registry
            .add_local_files(
                names
                    .iter()
                    .map(|name| InMemoryFile::new(*name, Vec::<u8>::new()).shared()),
            )
            .added;
        let state = OrderState::new(&registry, FileCategory::Volume, true, OrderConfig::default());
        (registry, added, state)
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Key::from_name("Control"), Key::Modifier);
        assert_eq!(Key::from_name("Meta"), Key::Modifier);
        assert_eq!(Key::from_name("Escape"), Key::Escape);
        assert_eq!(Key::from_name("Shift"), Key::Other);
    }

    #[test]
    fn test_rows_follow_insertion_when_unplaced() {
        let (_, added, state) = setup(&["a.mgz", "b.mgz"]);
        assert_eq!(state.sequence(), added);
        assert_eq!(state.rows()[1].top, 26.0);
    }

    #[test]
    fn test_start_drag_errors() {
        let (_, added, mut state) = setup(&["a.mgz"]);
        assert!(matches!(
            state.start_drag(0.0, FileHandle::from_raw(99)),
            Err(OrderError::UnknownRow { .. })
        ));
        state.start_drag(0.0, added[0]).unwrap();
        assert!(matches!(
            state.start_drag(0.0, added[0]),
            Err(OrderError::DragInProgress { .. })
        ));
        assert!(matches!(state.update_drag(1.0), Ok(false)));
    }

    #[test]
    fn test_update_without_drag_fails() {
        let (mut registry, _, mut state) = setup(&["a.mgz"]);
        assert!(matches!(state.update_drag(1.0), Err(OrderError::NotDragging)));
        assert!(matches!(state.drop(&mut registry), Err(OrderError::NotDragging)));
    }

    #[test]
    fn test_small_move_is_a_click() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz"]);
        state.start_drag(30.0, added[1]).unwrap();
        state.update_drag(32.0).unwrap();
        let outcome = state.drop(&mut registry).unwrap();
        assert_eq!(outcome, DropOutcome::Activated(added[1]));
        assert!(state.row(added[1]).unwrap().is_active);
        assert!(registry.iter().all(|file| file.order().is_none()));
    }

    #[test]
    fn test_modifier_click_toggles_checked() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz"]);
        assert!(state.handle_key_down(Key::Modifier));
        let outcome = state.click(added[0], &mut registry).unwrap();
        assert_eq!(
            outcome,
            DropOutcome::Toggled {
                handle: added[0],
                checked: false
            }
        );
        assert!(registry.active().is_none());

        state.handle_key_up(Key::Modifier);
        assert_eq!(
            state.click(added[0], &mut registry).unwrap(),
            DropOutcome::Activated(added[0])
        );
    }

    #[test]
    fn test_modifier_ignored_without_multiselect() {
        let (mut registry, added, _) = setup(&["a.mgz"]);
        let mut state =
            OrderState::new(&registry, FileCategory::Volume, false, OrderConfig::default());
        state.handle_key_down(Key::Modifier);
        assert_eq!(
            state.click(added[0], &mut registry).unwrap(),
            DropOutcome::Activated(added[0])
        );
    }

    #[test]
    fn test_escape_restores_ranks() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz", "c.mgz"]);
        let revision = registry.revision();
        state.start_drag(5.0, added[0]).unwrap();
        assert!(state.update_drag(60.0).unwrap());
        assert_eq!(state.sequence(), vec![added[1], added[2], added[0]]);

        assert!(state.handle_key_down(Key::Escape));
        assert!(!state.is_dragging());
        assert_eq!(state.sequence(), added);
        assert!(state.rows().iter().all(|row| !row.is_dragged));
        assert!(matches!(state.drop(&mut registry), Err(OrderError::NotDragging)));
        assert_eq!(registry.revision(), revision);
    }

    #[test]
    fn test_drag_clamps_at_both_ends() {
        let (_, added, mut state) = setup(&["a.mgz", "b.mgz", "c.mgz"]);
        state.start_drag(40.0, added[1]).unwrap();

        state.update_drag(-500.0).unwrap();
        assert_eq!(state.sequence()[0], added[1]);
        assert_eq!(state.row(added[1]).unwrap().top, 0.0);

        state.update_drag(900.0).unwrap();
        assert_eq!(state.sequence()[2], added[1]);
        assert_eq!(state.row(added[1]).unwrap().top, 52.0);
    }

    #[test]
    fn test_stationary_pointer_is_stable() {
        let (_, added, mut state) = setup(&["a.mgz", "b.mgz", "c.mgz"]);
        state.start_drag(0.0, added[0]).unwrap();
        assert!(state.update_drag(13.0).unwrap());
        let sequence = state.sequence();
        for _ in 0..5 {
            assert!(!state.update_drag(13.0).unwrap());
            assert_eq!(state.sequence(), sequence);
        }
    }

    #[test]
    fn test_drop_back_in_place_is_noop() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz", "c.mgz"]);
        let revision = registry.revision();
        state.start_drag(0.0, added[0]).unwrap();
        state.update_drag(40.0).unwrap();
        state.update_drag(2.0).unwrap();
        assert_eq!(state.drop(&mut registry).unwrap(), DropOutcome::Unchanged);
        assert_eq!(registry.revision(), revision);
    }

    #[test]
    fn test_refresh_cancels_drag_of_removed_file() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz"]);
        state.start_drag(0.0, added[0]).unwrap();
        registry.remove(added[0]).unwrap();
        state.refresh(&registry);
        assert!(!state.is_dragging());
        assert_eq!(state.sequence(), vec![added[1]]);
    }

    #[test]
    fn test_refresh_keeps_drag_of_surviving_file() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz", "c.mgz"]);
        state.start_drag(0.0, added[0]).unwrap();
        registry.remove(added[2]).unwrap();
        state.refresh(&registry);
        assert_eq!(state.dragged(), Some(added[0]));
        assert!(state.row(added[0]).unwrap().is_dragged);
        assert_eq!(state.rows().len(), 2);
    }

    #[test]
    fn test_refresh_keeps_dragged_row_under_pointer() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz", "c.mgz"]);
        state.start_drag(13.0, added[0]).unwrap();
        state.update_drag(65.0).unwrap();
        assert_eq!(state.sequence(), vec![added[1], added[2], added[0]]);
        assert_eq!(state.row(added[0]).unwrap().top, 52.0);

        registry.set_checked(added[1], false).unwrap();
        state.refresh(&registry);
        assert_eq!(state.sequence(), vec![added[1], added[2], added[0]]);
        assert_eq!(state.row(added[0]).unwrap().top, 52.0);

        assert!(!state.update_drag(65.0).unwrap());
        assert_eq!(state.row(added[0]).unwrap().top, 52.0);
        state.update_drag(39.0).unwrap();
        assert_eq!(state.sequence(), vec![added[1], added[0], added[2]]);
    }

    #[test]
    fn test_invalid_row_height_does_not_panic() {
        for row_height in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            let (registry, added, _) = setup(&["a.mgz", "b.mgz"]);
            let config = OrderConfig {
                row_height,
                ..OrderConfig::default()
            };
            let mut state = OrderState::new(&registry, FileCategory::Volume, false, config);
            state.start_drag(0.0, added[1]).unwrap();
            state.update_drag(10.0).unwrap();
            assert_eq!(state.sequence()[0], added[1]);
        }
    }

    #[test]
    fn test_commit_initial_places_files() {
        let (mut registry, added, mut state) = setup(&["a.mgz", "b.mgz"]);
        assert!(state.commit_initial(&mut registry).unwrap());
        assert_eq!(registry.get(added[1]).unwrap().order(), Some(1));
        assert!(!state.commit_initial(&mut registry).unwrap());
    }
}
