//! Replay harness for neuroview project sessions.
//!
//! Drives the project model with scripted UI sessions and in-memory
//! adapters, standing in for the viewer's UI.

pub mod logging;
pub mod replay;
pub mod settings;
pub mod summary;
