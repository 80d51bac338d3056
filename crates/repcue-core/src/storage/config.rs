//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Playback cadence
//! - Cue delivery (enable, deferral) and voice parameters for speech sinks
//!
//! Configuration is stored at `~/.config/repcue/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How often the host calls `tick()`.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Record completed and abandoned runs in the workout log.
    #[serde(default = "default_true")]
    pub record_history: bool,
}

/// Cue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Deferral between a transition and delivery of its cue.
    #[serde(default = "default_cue_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_one")]
    pub rate: f64,
    #[serde(default = "default_one")]
    pub pitch: f64,
    #[serde(default = "default_one")]
    pub volume: f64,
    #[serde(default = "default_language")]
    pub language: String,
}

/// Parameters handed to speech-rendering sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub rate: f64,
    pub pitch: f64,
    pub volume: f64,
    pub language: String,
}

impl CueConfig {
    pub fn voice(&self) -> VoiceSettings {
        VoiceSettings {
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume.clamp(0.0, 1.0),
            language: self.language.clone(),
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/repcue/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub cues: CueConfig,
}

fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_cue_delay_ms() -> u64 {
    100
}
fn default_true() -> bool {
    true
}
fn default_one() -> f64 {
    1.0
}
fn default_language() -> String {
    "en-US".into()
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            record_history: true,
        }
    }
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: default_cue_delay_ms(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            language: default_language(),
        }
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

        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(n) => {
                        if n.is_u64() {
                            let parsed = value
                                .parse::<u64>()
                                .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                            serde_json::Value::Number(parsed.into())
                        } else {
                            value
                                .parse::<f64>()
                                .ok()
                                .and_then(serde_json::Number::from_f64)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
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

    /// Persist to the data directory.
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
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
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
        assert_eq!(parsed.playback.tick_interval_ms, 1000);
        assert_eq!(parsed.cues.delay_ms, 100);
        assert_eq!(parsed.cues.language, "en-US");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[cues]\nenabled = false\n").unwrap();
        assert!(!parsed.cues.enabled);
        assert_eq!(parsed.cues.delay_ms, 100);
        assert_eq!(parsed.playback.tick_interval_ms, 1000);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("cues.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("playback.tick_interval_ms").as_deref(), Some("1000"));
        assert_eq!(cfg.get("cues.language").as_deref(), Some("en-US"));
        assert!(cfg.get("cues.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("cues.enabled", "false").unwrap();
        cfg.set("cues.delay_ms", "250").unwrap();
        cfg.set("cues.rate", "1.25").unwrap();
        cfg.set("cues.language", "fr-FR").unwrap();
        assert!(!cfg.cues.enabled);
        assert_eq!(cfg.cues.delay_ms, 250);
        assert_eq!(cfg.cues.rate, 1.25);
        assert_eq!(cfg.cues.language, "fr-FR");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("cues.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("cues.enabled", "not_a_bool"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("playback.tick_interval_ms", "-5").is_err());
        assert!(cfg.cues.enabled);
    }

    #[test]
    fn voice_clamps_volume() {
        let mut cfg = Config::default();
        cfg.cues.volume = 3.0;
        assert_eq!(cfg.cues.voice().volume, 1.0);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.playback.tick_interval_ms, 1000);

        let mut edited = cfg.clone();
        edited.set("playback.tick_interval_ms", "500").unwrap();
        edited.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().playback.tick_interval_ms, 500);
    }
}
