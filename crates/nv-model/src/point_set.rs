//! Point set content in the FreeSurfer `fs_pointset` JSON layout.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// Data type tag written into every point set file.
pub const POINT_SET_DATA_TYPE: &str = "fs_pointset";

/// Coordinate frame of the stored points.
pub const POINT_SET_VOX2RAS: &str = "scanner_ras";

/// Position of a waypoint in scanner RAS space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A comment left on a waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointComment {
    pub text: String,
    pub user: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefilled: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub edited: bool,
}

/// A single waypoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinates: Coordinates,
    #[serde(default)]
    pub comments: Vec<WaypointComment>,
}

impl Waypoint {
    /// Create a waypoint without comments.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            coordinates: Coordinates { x, y, z },
            comments: Vec::new(),
        }
    }
}

/// Full content of a point set file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSetData {
    #[serde(with = "rgb_triplet")]
    pub color: Rgb,
    pub data_type: String,
    pub points: Vec<Waypoint>,
    pub version: u32,
    pub vox2ras: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_level: Option<u32>,
}

impl PointSetData {
    /// Empty point set drawn in the given color.
    pub fn new(color: Rgb) -> Self {
        Self {
            color,
            data_type: POINT_SET_DATA_TYPE.to_string(),
            points: Vec::new(),
            version: 1,
            vox2ras: POINT_SET_VOX2RAS.to_string(),
            overall_quality: None,
            qa_level: None,
        }
    }
}

impl Default for PointSetData {
    fn default() -> Self {
        Self::new(Rgb::WHITE)
    }
}

/// The file format stores colors as `[r, g, b]`.
mod rgb_triplet {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::color::Rgb;

    pub fn serialize<S: Serializer>(color: &Rgb, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(color.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rgb, D::Error> {
        <[u8; 3]>::deserialize(deserializer).map(Rgb)
    }
}
