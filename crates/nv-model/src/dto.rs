//! Backend project DTOs, as returned by the REST API (camelCase JSON).

use serde::{Deserialize, Serialize};

use crate::point_set::PointSetData;

/// A project with all its files, as returned when opening it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub volumes: Vec<VolumeDto>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceDto>,
    #[serde(default)]
    pub point_sets: Vec<PointSetDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDto {
    pub id: u64,
    pub file_name: String,
    pub file_size: u64,
    pub order: Option<u32>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub opacity: Option<u8>,
    pub color_map: Option<String>,
    pub contrast_min: Option<f64>,
    pub contrast_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceDto {
    pub id: u64,
    pub file_name: String,
    pub file_size: u64,
    pub order: Option<u32>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub opacity: Option<u8>,
    pub color: Option<String>,
    #[serde(default)]
    pub overlays: Vec<AttachmentDto>,
    #[serde(default)]
    pub annotations: Vec<AttachmentDto>,
}

/// Overlay or annotation stored with a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    pub id: u64,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSetDto {
    pub id: u64,
    pub file_name: String,
    pub file_size: u64,
    pub order: Option<u32>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub data: Option<PointSetData>,
}

fn default_visible() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project() {
        let json = r##"{
            "id": 3,
            "name": "subject-01",
            "volumes": [{
                "id": 5, "fileName": "T1.mgz", "fileSize": 1024, "order": 0,
                "visible": true, "opacity": null, "colorMap": "heat",
                "contrastMin": 10.0, "contrastMax": 80.0
            }],
            "surfaces": [{
                "id": 7, "fileName": "lh.pial", "fileSize": 2048, "order": null,
                "opacity": 50, "color": "#ff0000",
                "overlays": [{"id": 1, "fileName": "lh.thickness"}]
            }]
        }"##;
        let project: BackendProject = serde_json::from_str(json).unwrap();
        assert_eq!(project.volumes[0].color_map.as_deref(), Some("heat"));
        assert!(project.surfaces[0].visible);
        assert_eq!(project.surfaces[0].overlays.len(), 1);
        assert!(project.point_sets.is_empty());
    }
}
