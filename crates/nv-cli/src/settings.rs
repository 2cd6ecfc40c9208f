//! User settings for the `nv` harness.
//!
//! Stored as TOML in the platform config directory. A missing or unreadable
//! file is not an error: defaults are used and a warning is logged.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nv_model::FileClassifier;
use nv_order::OrderConfig;
use nv_sync::SyncConfig;

/// Harness settings.
///
/// ```toml
/// [order]
/// row_height = 26.0
///
/// [sync]
/// debounce_ms = 500
///
/// [file_types]
/// volume = [".mgz", ".nii.gz", ".nii"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Layout of the reorderable lists.
    pub order: OrderConfig,

    /// Sync debounce timing.
    pub sync: SyncConfig,

    /// Suffix table used to classify picked files.
    pub file_types: FileClassifier,
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::config_path()),
        }
    }

    /// Load settings from a specific path, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Self::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read settings, using defaults");
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(settings) => settings.validated(path),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "invalid settings, using defaults");
                Self::default()
            }
        }
    }

    /// Replace sections holding unusable values with their defaults.
    fn validated(mut self, path: &Path) -> Self {
        if !self.order.is_valid() {
            warn!(
                path = %path.display(),
                row_height = self.order.row_height,
                click_threshold = self.order.click_threshold,
                "invalid [order] settings, using defaults"
            );
            self.order = OrderConfig::default();
        }
        self
    }

    /// Save settings to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write settings to {}", path.display()))
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize settings")
    }

    /// Get the default config file path.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("org", "Neuroview", "nv")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
            .unwrap_or_else(|| PathBuf::from("settings.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [order]
            row_height = 30.0

            [file_types]
            point_set = [".label"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.order.row_height, 30.0);
        assert_eq!(settings.order.click_threshold, 3.0);
        assert_eq!(settings.sync, SyncConfig::default());
        assert_eq!(settings.file_types.point_set, vec![".label".to_string()]);
        assert_eq!(settings.file_types.volume, FileClassifier::default().volume);
    }

    #[test]
    fn test_invalid_row_height_resets_order_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[order]\nrow_height = -1.0\n\n[file_types]\nsurface = [\".obj\"]\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.order, OrderConfig::default());
        assert_eq!(settings.file_types.surface, vec![".obj".to_string()]);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut settings = Settings::default();
        settings.sync.debounce_ms = 250;
        let parsed: Settings = toml::from_str(&settings.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, settings);
    }
}
