// Settings management and persistence
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::ClipLocator;
use crate::notify::TableKey;

/// Where the per-table clips live and which ones to preload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSettings {
    pub directory: PathBuf,
    pub file_template: String, // must contain "{table}"
    pub preload_tables: Vec<String>,
    pub auto_preload: bool, // preload every clip found in `directory`
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("sounds"),
            file_template: "table{table}.mp3".to_string(),
            preload_tables: (1..=12).map(|n| n.to_string()).collect(),
            auto_preload: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub volume: f32, // 0.0-1.0
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self { volume: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: i32, // Settings schema version for future migrations
    pub clips: ClipSettings,
    pub playback: PlaybackSettings,
    pub polling: PollingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            clips: ClipSettings::default(),
            playback: PlaybackSettings::default(),
            polling: PollingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse settings file {}", path.display()))?;

        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;

        tracing::debug!("saved settings to {}", path.display());
        Ok(())
    }

    pub fn locator(&self) -> Result<ClipLocator> {
        ClipLocator::new(&self.clips.directory, &self.clips.file_template).with_context(|| {
            format!(
                "clip file template '{}' has no {{table}} placeholder",
                self.clips.file_template
            )
        })
    }

    /// Configured preload tables, normalized. Entries without digits are skipped.
    pub fn preload_keys(&self) -> Vec<TableKey> {
        let mut keys = Vec::new();
        for raw in &self.clips.preload_tables {
            match TableKey::parse(raw) {
                Ok(key) if !keys.contains(&key) => keys.push(key),
                Ok(_) => {}
                Err(e) => tracing::warn!("ignoring preload entry: {}", e),
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.clips.preload_tables = vec!["3".into(), "14".into()];
        settings.playback.volume = 0.5;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"polling": {"interval_secs": 2}}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.polling.interval_secs, 2);
        assert_eq!(settings.clips, ClipSettings::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_preload_keys_normalize_and_dedupe() {
        let mut settings = Settings::default();
        settings.clips.preload_tables = vec!["T1".into(), "1".into(), "bar".into(), "07".into()];
        let keys: Vec<String> = settings
            .preload_keys()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(keys, vec!["1", "07"]);
    }

    #[test]
    fn test_bad_template() {
        let mut settings = Settings::default();
        settings.clips.file_template = "alert.mp3".into();
        assert!(settings.locator().is_err());
    }
}
