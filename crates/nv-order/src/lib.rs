//! Drag-to-reorder lists for neuroview file categories.
//!
//! [`OrderState`] turns the files of one category into a list of rows and
//! runs the reorder gesture:
//!
//! ```text
//!            start_drag             drop / cancel
//!   Idle ───────────────▶ Dragging ───────────────▶ Idle
//!                          │    ▲
//!                          └────┘ update_drag
//! ```
//!
//! Ranks are provisional while dragging and written to the registry in a
//! single step on drop. A gesture shorter than the click threshold is a click
//! and changes the selection instead.
//!
//! The state is platform-agnostic: the host feeds it pointer positions and
//! key names.

mod error;
mod row;
mod state;

pub use error::{OrderError, Result};
pub use row::{OrderConfig, OrderRow};
pub use state::{DragGesture, DragPhase, DropOutcome, Key, OrderState};
