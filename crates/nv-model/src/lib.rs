//! Project file model for the neuroview viewer.
//!
//! A project holds volumes, surfaces and point sets. Each file knows where
//! its bytes live (picked from disk, stored in the backend, or held in
//! memory), how it is displayed, and its position in the user's list.
//!
//! # Features
//!
//! - **Single source of truth**: [`FileRegistry`] owns every file and
//!   enforces that at most one file is active
//! - **Classification** of picked files by a configurable suffix table
//! - **Change events** over a channel for every effective mutation
//! - **Backend DTOs** for opening persisted projects
//!
//! # Example
//!
//! ```ignore
//! use nv_model::{FileRegistry, InMemoryFile};
//!
//! let mut registry = FileRegistry::new();
//! let outcome = registry.add_local_files([InMemoryFile::new("T1.mgz", bytes).shared()]);
//! registry.set_active(outcome.added[0])?;
//! ```
//!
//! # Architecture
//!
//! - `category.rs` - File categories, provenance and handles
//! - `classify.rs` - Suffix-based file classification
//! - `file.rs` - Project files and category-specific details
//! - `registry.rs` - The registry and its change events
//! - `dto.rs` - Backend project shapes
//! - `raw.rs` - Sources of raw file bytes

mod category;
mod classify;
mod color;
mod dto;
mod error;
mod file;
mod point_set;
mod raw;
mod registry;

pub use category::{FileCategory, FileHandle, Provenance};
pub use classify::FileClassifier;
pub use color::{ColorMap, Rgb};
pub use dto::{AttachmentDto, BackendProject, PointSetDto, SurfaceDto, VolumeDto};
pub use error::{FileError, RegistryError, Result};
pub use file::{
    AttachedFile, DEFAULT_OPACITY, FileDetails, FileField, FileLocation, PointSetDetails,
    ProjectFile, SurfaceDetails, VolumeDetails,
};
pub use point_set::{
    Coordinates, POINT_SET_DATA_TYPE, POINT_SET_VOX2RAS, PointSetData, Waypoint, WaypointComment,
};
pub use raw::{DiskFile, InMemoryFile, RawFile, SharedRawFile};
pub use registry::{AddOutcome, DEFAULT_POINT_SET_NAME, FileRegistry, RegistryChange, RegistryEvent};
