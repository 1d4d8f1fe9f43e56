//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default focus and break durations
//! - Reward unlock threshold and collectible catalog
//! - Notification and live-status toggles
//!
//! Configuration is stored at `~/.config/focusdial/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::reward::RewardCatalog;
use crate::timer::{EngineConfig, DEFAULT_DRIFT_THRESHOLD_SECS};

/// Timer durations. Minutes, or seconds in test mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u32,
    #[serde(default = "default_break_duration")]
    pub break_duration: u32,
    /// Read every configured duration as seconds instead of minutes.
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Focus time required to unlock a reward.
    #[serde(default = "default_unlock_threshold")]
    pub unlock_threshold: u32,
    #[serde(default = "default_catalog")]
    pub catalog: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStatusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusdial/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub live_status: LiveStatusConfig,
}

// Default functions
fn default_focus_duration() -> u32 {
    25
}
fn default_break_duration() -> u32 {
    5
}
fn default_unlock_threshold() -> u32 {
    25
}
fn default_catalog() -> Vec<String> {
    ["fern", "koi", "lantern", "moth", "pebble", "comet"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            break_duration: default_break_duration(),
            test_mode: false,
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            unlock_threshold: default_unlock_threshold(),
            catalog: default_catalog(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LiveStatusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u32>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                    serde_json::Value::Array(_) => {
                        if value.trim_start().starts_with('[') {
                            serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                        } else {
                            // Comma-separated shorthand for string lists.
                            serde_json::Value::Array(
                                value
                                    .split(',')
                                    .map(str::trim)
                                    .filter(|s| !s.is_empty())
                                    .map(|s| serde_json::Value::String(s.to_string()))
                                    .collect(),
                            )
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a value in memory without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value has the wrong type.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Seconds per configured duration unit.
    fn unit_secs(&self) -> i64 {
        if self.timer.test_mode {
            1
        } else {
            60
        }
    }

    pub fn focus_duration_secs(&self) -> i64 {
        i64::from(self.timer.focus_duration) * self.unit_secs()
    }

    pub fn break_duration_secs(&self) -> i64 {
        i64::from(self.timer.break_duration) * self.unit_secs()
    }

    /// Convert a user-entered duration in configured units to seconds.
    pub fn duration_secs(&self, amount: u32) -> i64 {
        i64::from(amount) * self.unit_secs()
    }

    /// Settings injected into the engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            reward_threshold_secs: i64::from(self.rewards.unlock_threshold) * self.unit_secs(),
            drift_threshold_secs: DEFAULT_DRIFT_THRESHOLD_SECS,
        }
    }

    pub fn reward_catalog(&self) -> RewardCatalog {
        RewardCatalog::from_names(self.rewards.catalog.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.focus_duration, 25);
        assert_eq!(parsed.rewards.catalog, cfg.rewards.catalog);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[timer]\nfocus_duration = 50\n").unwrap();
        assert_eq!(parsed.timer.focus_duration, 50);
        assert_eq!(parsed.timer.break_duration, 5);
        assert!(parsed.notifications.enabled);
        assert_eq!(parsed.rewards.unlock_threshold, 25);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.focus_duration").as_deref(), Some("25"));
        assert_eq!(cfg.get("live_status.enabled").as_deref(), Some("true"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("timer").is_none());
    }

    #[test]
    fn set_value_updates_nested_fields() {
        let mut cfg = Config::default();
        cfg.set_value("timer.break_duration", "10").unwrap();
        cfg.set_value("notifications.enabled", "false").unwrap();
        assert_eq!(cfg.timer.break_duration, 10);
        assert!(!cfg.notifications.enabled);
    }

    #[test]
    fn set_value_accepts_comma_separated_catalog() {
        let mut cfg = Config::default();
        cfg.set_value("rewards.catalog", "owl, fox,,heron").unwrap();
        assert_eq!(cfg.rewards.catalog, vec!["owl", "fox", "heron"]);
        cfg.set_value("rewards.catalog", r#"["moss"]"#).unwrap();
        assert_eq!(cfg.rewards.catalog, vec!["moss"]);
    }

    #[test]
    fn set_value_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("timer.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set_value("", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set_value("timer", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_value_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("timer.test_mode", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set_value("timer.focus_duration", "-5"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg.timer.focus_duration, 25);
    }

    #[test]
    fn test_mode_reads_durations_as_seconds() {
        let mut cfg = Config::default();
        assert_eq!(cfg.focus_duration_secs(), 1500);
        assert_eq!(cfg.engine_config().reward_threshold_secs, 1500);
        cfg.timer.test_mode = true;
        assert_eq!(cfg.focus_duration_secs(), 25);
        assert_eq!(cfg.break_duration_secs(), 5);
        assert_eq!(cfg.duration_secs(40), 40);
        assert_eq!(cfg.engine_config().reward_threshold_secs, 25);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.timer.focus_duration, 25);
        assert!(path.exists());

        std::fs::write(&path, "timer = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
