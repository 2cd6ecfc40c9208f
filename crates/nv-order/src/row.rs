//! Row layout and its configuration.

use serde::{Deserialize, Serialize};

use nv_model::{FileHandle, ProjectFile};

/// Layout constants of a reorderable list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    /// Height of one row in pixels.
    pub row_height: f64,
    /// Pointer travel in pixels below which a gesture counts as a click.
    pub click_threshold: f64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            row_height: 26.0,
            click_threshold: 3.0,
        }
    }
}

impl OrderConfig {
    /// Row height is finite and positive, click threshold finite and not
    /// negative.
    pub fn is_valid(&self) -> bool {
        self.row_height.is_finite()
            && self.row_height > 0.0
            && self.click_threshold.is_finite()
            && self.click_threshold >= 0.0
    }

    /// Top offset of the row at `rank`.
    #[inline]
    pub fn top_of(&self, rank: usize) -> f64 {
        rank as f64 * self.row_height
    }
}

/// Projection of one file for the reorder UI. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub handle: FileHandle,
    pub label: String,
    /// Position in the list, zero-based. Provisional while dragging.
    pub rank: usize,
    /// Vertical pixel offset of the row.
    pub top: f64,
    pub is_checked: bool,
    pub is_active: bool,
    /// This row follows the pointer.
    pub is_dragged: bool,
}

impl OrderRow {
    pub(crate) fn from_file(file: &ProjectFile, rank: usize, config: &OrderConfig) -> Self {
        Self {
            handle: file.handle(),
            label: file.name().to_string(),
            rank,
            top: config.top_of(rank),
            is_checked: file.is_checked(),
            is_active: file.is_active(),
            is_dragged: false,
        }
    }
}
