//! File classification by name suffix.

use serde::{Deserialize, Serialize};

use crate::category::FileCategory;
use crate::error::FileError;

/// Suffix table mapping file names to top-level categories.
///
/// Matching is case-insensitive. Categories are tried in the order volume,
/// surface, point set; the first matching suffix wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileClassifier {
    /// Suffixes of volume files.
    pub volume: Vec<String>,
    /// Suffixes of surface meshes.
    pub surface: Vec<String>,
    /// Suffixes of point set files.
    pub point_set: Vec<String>,
}

impl Default for FileClassifier {
    fn default() -> Self {
        let owned = |suffixes: &[&str]| suffixes.iter().map(|s| (*s).to_string()).collect();
        Self {
            volume: owned(&[".mgz", ".nii.gz", ".nii"]),
            surface: owned(&[".inflated", ".pial", ".white", ".sphere"]),
            point_set: owned(&[".json"]),
        }
    }
}

impl FileClassifier {
    /// Category for a file name, if any suffix matches.
    pub fn classify(&self, file_name: &str) -> Option<FileCategory> {
        let tables = [
            (FileCategory::Volume, &self.volume),
            (FileCategory::Surface, &self.surface),
            (FileCategory::PointSet, &self.point_set),
        ];

        tables
            .into_iter()
            .find(|(_, suffixes)| suffixes.iter().any(|suffix| has_suffix(file_name, suffix)))
            .map(|(category, _)| category)
    }

    /// Like [`classify`](Self::classify) but reports unknown names as an error.
    pub fn require(&self, file_name: &str) -> Result<FileCategory, FileError> {
        self.classify(file_name)
            .ok_or_else(|| FileError::UnsupportedFileType {
                name: file_name.to_string(),
            })
    }
}

fn has_suffix(file_name: &str, suffix: &str) -> bool {
    if suffix.is_empty() || file_name.len() < suffix.len() {
        return false;
    }
    let start = file_name.len() - suffix.len();
    file_name
        .get(start..)
        .map(|tail| tail.eq_ignore_ascii_case(suffix))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify("brain.nii.gz"), Some(FileCategory::Volume));
        assert_eq!(classifier.classify("T1.mgz"), Some(FileCategory::Volume));
        assert_eq!(classifier.classify("lh.pial"), Some(FileCategory::Surface));
        assert_eq!(classifier.classify("points.json"), Some(FileCategory::PointSet));
        assert_eq!(classifier.classify("notes.txt"), None);
    }

    #[test]
    fn test_case_insensitive() {
        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify("BRAIN.NII.GZ"), Some(FileCategory::Volume));
        assert_eq!(classifier.classify("rh.White"), Some(FileCategory::Surface));
    }

    #[test]
    fn test_multibyte_names_do_not_panic() {
        let classifier = FileClassifier::default();
        assert_eq!(classifier.classify("ü"), None);
        assert_eq!(classifier.classify("größe.mgz"), Some(FileCategory::Volume));
    }

    #[test]
    fn test_require_unknown() {
        let err = FileClassifier::default().require("readme.md").unwrap_err();
        assert!(matches!(err, FileError::UnsupportedFileType { .. }));
    }

    #[test]
    fn test_partial_table_keeps_other_defaults() {
        let classifier: FileClassifier =
            serde_json::from_str(r#"{"surface": [".obj"]}"#).unwrap();
        assert_eq!(classifier.classify("mesh.obj"), Some(FileCategory::Surface));
        assert_eq!(classifier.classify("lh.pial"), None);
        assert_eq!(classifier.classify("brain.mgz"), Some(FileCategory::Volume));
    }
}
