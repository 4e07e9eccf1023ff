//! TOML-based application configuration.
//!
//! Stores:
//! - Decay model parameters (half-life, display floor, poll interval)
//! - Storage key names and database file name
//! - First-launch behavior for the source history
//!
//! Configuration is stored at `~/.config/caffeine-in/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::decay::{DecayModel, DEFAULT_FLOOR_MG, DEFAULT_HALF_LIFE_HOURS};
use crate::error::{ConfigError, Result};

/// Decay model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    #[serde(default = "default_floor_mg")]
    pub floor_mg: f64,
    /// Seconds between recomputations of the displayed level.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Key-value storage layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_file")]
    pub database_file: String,
    #[serde(default = "default_initial_mg_key")]
    pub initial_mg_key: String,
    #[serde(default = "default_last_dose_key")]
    pub last_dose_key: String,
    #[serde(default = "default_history_key")]
    pub history_key: String,
    #[serde(default = "default_launched_key")]
    pub launched_key: String,
}

/// Source history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Write the showcase source list the first time the app runs.
    #[serde(default = "default_true")]
    pub seed_on_first_launch: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/caffeine-in/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decay: DecayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

// Default functions
fn default_half_life_hours() -> f64 {
    DEFAULT_HALF_LIFE_HOURS
}
fn default_floor_mg() -> f64 {
    DEFAULT_FLOOR_MG
}
fn default_poll_interval_secs() -> u64 {
    2
}
fn default_database_file() -> String {
    "caffeine.db".into()
}
fn default_initial_mg_key() -> String {
    "initial_caffeine_mg".into()
}
fn default_last_dose_key() -> String {
    "last_ingestion_time_millis".into()
}
fn default_history_key() -> String {
    "caffeine_history_list".into()
}
fn default_launched_key() -> String {
    "app_has_been_launched_before".into()
}
fn default_true() -> bool {
    true
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life_hours(),
            floor_mg: default_floor_mg(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            initial_mg_key: default_initial_mg_key(),
            last_dose_key: default_last_dose_key(),
            history_key: default_history_key(),
            launched_key: default_launched_key(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            seed_on_first_launch: true,
        }
    }
}

impl DecayConfig {
    pub fn model(&self) -> DecayModel {
        DecayModel::new(self.half_life_hours, self.floor_mg)
    }

    /// Poll interval, never shorter than one second.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
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
    ) -> std::result::Result<(), ConfigError> {
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
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
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

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if no file exists.
    /// A file holding values the decay engine cannot use is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.message().to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
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

    /// Set a config value by key without saving. Returns error if key is
    /// unknown or the value does not fit the field.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()
    }

    /// Reject values the decay engine cannot work with.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.decay.half_life_hours.is_finite() && self.decay.half_life_hours > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "decay.half_life_hours".into(),
                message: "must be a positive number of hours".into(),
            });
        }
        if !(self.decay.floor_mg.is_finite() && self.decay.floor_mg >= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "decay.floor_mg".into(),
                message: "must not be negative".into(),
            });
        }
        if self.storage.database_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.database_file".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn model(&self) -> DecayModel {
        self.decay.model()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default configuration");
                Self::default()
            }
        }
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
        assert_eq!(parsed.decay.half_life_hours, 5.0);
        assert_eq!(parsed.storage, StorageConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[decay]\nhalf_life_hours = 6.0\n").unwrap();
        assert_eq!(parsed.decay.half_life_hours, 6.0);
        assert_eq!(parsed.decay.floor_mg, 1.0);
        assert_eq!(parsed.decay.poll_interval_secs, 2);
        assert_eq!(parsed.storage.history_key, "caffeine_history_list");
        assert!(parsed.history.seed_on_first_launch);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("decay.half_life_hours").as_deref(), Some("5.0"));
        assert_eq!(cfg.get("decay.poll_interval_secs").as_deref(), Some("2"));
        assert_eq!(
            cfg.get("storage.last_dose_key").as_deref(),
            Some("last_ingestion_time_millis")
        );
        assert!(cfg.get("decay").is_none());
        assert!(cfg.get("decay.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("decay.half_life_hours", "6.5").unwrap();
        cfg.apply("history.seed_on_first_launch", "false").unwrap();
        cfg.apply("storage.database_file", "other.db").unwrap();
        assert_eq!(cfg.decay.half_life_hours, 6.5);
        assert!(!cfg.history.seed_on_first_launch);
        assert_eq!(cfg.storage.database_file, "other.db");
    }

    #[test]
    fn apply_accepts_integer_for_float_field() {
        let mut cfg = Config::default();
        cfg.apply("decay.half_life_hours", "4").unwrap();
        assert_eq!(cfg.decay.half_life_hours, 4.0);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(cfg.apply("decay.nonexistent", "1").is_err());
        assert!(cfg.apply("", "1").is_err());
        assert!(cfg.apply("decay", "1").is_err());
    }

    #[test]
    fn apply_rejects_invalid_type_and_range() {
        let mut cfg = Config::default();
        assert!(cfg.apply("history.seed_on_first_launch", "sometimes").is_err());
        assert!(cfg.apply("decay.half_life_hours", "zero").is_err());
        assert!(cfg.apply("decay.half_life_hours", "0").is_err());
        assert_eq!(cfg.decay.half_life_hours, 5.0);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.decay.poll_interval_secs, 2);
        assert!(path.exists());

        let mut cfg = cfg;
        cfg.apply("decay.floor_mg", "0.5").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().decay.floor_mg, 0.5);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[decay\nhalf_life_hours = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn load_from_rejects_unusable_decay_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[decay]\nhalf_life_hours = 0.0\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("decay.half_life_hours"), "{err}");

        std::fs::write(&path, "[decay]\nhalf_life_hours = nan\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "[decay]\nhalf_life_hours = -5.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "[decay]\nfloor_mg = -1.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn validate_rejects_non_finite_values() {
        let mut cfg = Config::default();
        cfg.decay.half_life_hours = f64::INFINITY;
        assert!(cfg.validate().is_err());
        cfg.decay.half_life_hours = 5.0;
        cfg.decay.floor_mg = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn poll_interval_has_a_minimum() {
        let mut cfg = Config::default();
        cfg.decay.poll_interval_secs = 0;
        assert_eq!(cfg.decay.poll_interval(), std::time::Duration::from_secs(1));
    }
}
