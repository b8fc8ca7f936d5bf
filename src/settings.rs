//! Settings management for chimer
//!
//! Handles persistent configuration:
//! - Default alarm interval
//! - Custom alert sound
//! - Notifications and volume

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Interval used when none is given, in minutes
    pub interval_minutes: f64,

    /// Last accepted custom sound file
    pub custom_sound: Option<PathBuf>,

    /// Play `custom_sound` instead of the built-in tone
    pub use_custom_sound: bool,

    /// Whether to show desktop notifications when the alarm fires
    pub show_notifications: bool,

    /// Playback volume (0-100)
    pub volume: u8,

    /// How long stopping waits for the alarm worker, in milliseconds
    pub stop_grace_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_minutes: 20.0,
            custom_sound: None,
            use_custom_sound: false,
            show_notifications: true,
            volume: 100,
            stop_grace_ms: 2000,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("Chimer").join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to disk
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }

    /// Custom sound that should be active at startup, if any
    pub fn active_custom_sound(&self) -> Option<&Path> {
        if self.use_custom_sound {
            self.custom_sound.as_deref()
        } else {
            None
        }
    }

    pub fn stop_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stop_grace_ms)
    }

    /// Check values that serde alone cannot
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.interval_minutes.is_finite() && self.interval_minutes > 0.0) {
            problems.push(format!(
                "interval_minutes must be positive (got {})",
                self.interval_minutes
            ));
        }
        if self.volume > 100 {
            problems.push(format!("volume must be 0-100 (got {})", self.volume));
        }
        if self.use_custom_sound && self.custom_sound.is_none() {
            problems.push("use_custom_sound is set but custom_sound is empty".to_string());
        }
        problems
    }
}
