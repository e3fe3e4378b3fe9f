//! Settings Persistence System
//!
//! Provides persistent subtitle settings with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Migration support for schema changes
//!
//! Storage location: {settings_dir}/settings.json

use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::captions::{SubtitleFormat, SubtitleStyle};
use crate::core::fs::atomic_write_json_pretty;
use crate::core::{CoreError, CoreResult, Ratio, Size2D};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 2;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

const DEFAULT_FILE_STEM: &str = "subtitles";

/// Subtitle track settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Project frame rate used for every frame conversion
    #[serde(default)]
    pub frame_rate: Ratio,

    /// Frame display size, used for the ASS style header
    #[serde(default)]
    pub frame_size: Size2D,

    #[serde(default)]
    pub output: OutputSettings,

    /// Default style written to generated ASS files
    #[serde(default)]
    pub style: SubtitleStyle,

    #[serde(default)]
    pub history: HistorySettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            frame_rate: Ratio::default(),
            frame_size: Size2D::default(),
            output: OutputSettings::default(),
            style: SubtitleStyle::default(),
            history: HistorySettings::default(),
        }
    }
}

impl SubtitleSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Bad values are corrected rather than rejected, so an old or hand-edited file
    /// still loads.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        if !self.frame_rate.is_valid_rate() {
            self.frame_rate = Ratio::default();
        }
        if self.frame_size.width == 0 || self.frame_size.height == 0 {
            self.frame_size = Size2D::default();
        }

        let stem = self.output.file_stem.trim();
        if stem.is_empty() || stem.contains(['/', '\\', ':']) || stem.contains("..") {
            self.output.file_stem = DEFAULT_FILE_STEM.to_string();
        } else {
            self.output.file_stem = stem.to_string();
        }

        self.style.font_size = self.style.font_size.min(500);
        self.style.outline_width = clamp_f32(self.style.outline_width, 0.0, 20.0);
        self.style.shadow_offset = clamp_f32(self.style.shadow_offset, 0.0, 20.0);
        if self.style.font_family.trim().is_empty() {
            self.style.font_family = SubtitleStyle::default().font_family;
        }

        self.history.max_undo = self.history.max_undo.clamp(1, 1000);
    }

    /// Output file path for the render attachment, if a directory is configured
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output.directory.as_ref().map(|dir| {
            dir.join(format!(
                "{}.{}",
                self.output.file_stem,
                self.output.format.extension()
            ))
        })
    }
}

fn clamp_f32(value: f32, min: f32, max: f32) -> f32 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

/// Where and how the subtitle track is written to disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputSettings {
    /// Directory for generated subtitle files; no automatic output when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default = "default_file_stem")]
    pub file_stem: String,

    #[serde(default)]
    pub format: SubtitleFormat,

    /// Rewrite the output file after every structural change
    #[serde(default = "default_true")]
    pub auto_export: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: None,
            file_stem: default_file_stem(),
            format: SubtitleFormat::Srt,
            auto_export: true,
        }
    }
}

fn default_file_stem() -> String {
    DEFAULT_FILE_STEM.to_string()
}

fn default_true() -> bool {
    true
}

/// Undo history settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistorySettings {
    /// Maximum number of undoable commands kept
    #[serde(default = "default_max_undo")]
    pub max_undo: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_undo: default_max_undo(),
        }
    }
}

fn default_max_undo() -> usize {
    100
}

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager with the given settings directory
    pub fn new(settings_dir: PathBuf) -> Self {
        Self {
            settings_path: settings_dir.join(SETTINGS_FILE),
        }
    }

    /// Settings manager rooted in the platform config directory
    pub fn for_user() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join("subtrack")))
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> SubtitleSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(SubtitleSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<SubtitleSettings>(&content)?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings = self.migrate(settings);
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                SubtitleSettings::default()
            }
        }
    }

    /// Save settings to disk using an atomic write, returning what was persisted
    pub fn save(&self, settings: &SubtitleSettings) -> CoreResult<SubtitleSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            atomic_write_json_pretty(&self.settings_path, &normalized)?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<SubtitleSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path).map_err(|e| {
                    CoreError::Internal(format!("Failed to delete settings file: {}", e))
                })?;
                info!("Settings file deleted");
            }
            Ok(SubtitleSettings::default())
        })
    }

    /// Migrate settings from older version
    fn migrate(&self, mut settings: SubtitleSettings) -> SubtitleSettings {
        // Version 1 files predate the configurable style; a zero font size there meant 48pt.
        if settings.version < 2 && settings.style.font_size == 0 {
            settings.style.font_size = 48;
        }
        settings.version = SETTINGS_VERSION;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = SubtitleSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.frame_rate, Ratio::new(25, 1));
        assert_eq!(settings.output.file_stem, "subtitles");
        assert_eq!(settings.output.format, SubtitleFormat::Srt);
        assert!(settings.output.auto_export);
        assert_eq!(settings.history.max_undo, 100);
        assert!(settings.output_path().is_none());
    }

    #[test]
    fn test_settings_serialization() {
        let settings = SubtitleSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"frameRate\""));
        assert!(json.contains("\"autoExport\":true"));
        let deserialized: SubtitleSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, deserialized);
    }

    #[test]
    fn test_normalize_clamps_bad_values() {
        let mut settings = SubtitleSettings::default();
        settings.frame_rate = Ratio { num: 0, den: 1 };
        settings.frame_size = Size2D::new(0, 720);
        settings.output.file_stem = "../escape".to_string();
        settings.style.outline_width = f32::NAN;
        settings.history.max_undo = 0;

        settings.normalize();

        assert_eq!(settings.frame_rate, Ratio::default());
        assert_eq!(settings.frame_size, Size2D::default());
        assert_eq!(settings.output.file_stem, "subtitles");
        assert_eq!(settings.style.outline_width, 0.0);
        assert_eq!(settings.history.max_undo, 1);
    }

    #[test]
    fn test_output_path() {
        let mut settings = SubtitleSettings::default();
        settings.output.directory = Some(PathBuf::from("/tmp/project"));
        settings.output.format = SubtitleFormat::Ass;
        assert_eq!(
            settings.output_path(),
            Some(PathBuf::from("/tmp/project/subtitles.ass"))
        );
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        let settings = manager.load();
        assert_eq!(settings, SubtitleSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        let mut settings = SubtitleSettings::default();
        settings.frame_rate = Ratio::new(30000, 1001);
        settings.output.format = SubtitleFormat::Vtt;

        manager.save(&settings).unwrap();
        let loaded = manager.load();

        assert_eq!(loaded.frame_rate, Ratio::new(30000, 1001));
        assert_eq!(loaded.output.format, SubtitleFormat::Vtt);
        assert!(!manager.settings_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_reset_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        manager.save(&SubtitleSettings::default()).unwrap();
        assert!(manager.settings_path().exists());

        let reset_settings = manager.reset().unwrap();
        assert!(!manager.settings_path().exists());
        assert_eq!(reset_settings, SubtitleSettings::default());
    }

    #[test]
    fn test_invalid_json_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SETTINGS_FILE), "invalid json {{{").unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        assert_eq!(manager.load(), SubtitleSettings::default());
    }

    #[test]
    fn test_partial_json_uses_defaults_and_migrates() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(SETTINGS_FILE),
            r#"{"version": 1, "output": {"format": "ass"}}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        let settings = manager.load();

        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.output.format, SubtitleFormat::Ass);
        assert_eq!(settings.output.file_stem, "subtitles");
        assert_eq!(settings.style.font_size, 48);
    }
}
