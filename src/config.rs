//! Engine configuration.
//!
//! [`EngineConfig`] carries every tunable of the engine: path history cap,
//! movement threshold, pacing fallback and cleanup thresholds. It is
//! serializable so deployments can keep it in a JSON file; missing fields take
//! their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracker::MOVEMENT_THRESHOLD;

/// Path cap used by interactive front-ends.
pub const INTERACTIVE_PATH_LEN: usize = 1000;

/// Hard upper bound on targets per session.
pub const MAX_TARGETS: usize = 9;

/// Largest accepted age threshold, about a century.
pub const MAX_AGE_HOURS: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum retained path points per target; the oldest point is evicted on
    /// overflow. `None` keeps the full history. Default: **None**.
    pub max_path_len: Option<usize>,

    /// Step in pixels a target must exceed to count as moving. Default: **2.0**.
    pub movement_threshold: f64,

    /// Frame rate assumed when a source reports none, and the interval used
    /// when two samples share a timestamp. Default: **30.0**.
    pub nominal_fps: f64,

    /// Sessions created longer ago than this are evicted by cleanup. Default: **24**.
    pub session_max_age_hours: f64,

    /// Temporary frame artifacts older than this are deleted by cleanup. Default: **1**.
    pub temp_max_age_hours: f64,

    /// Directory holding temporary frame artifacts. Default: **None**.
    pub temp_dir: Option<PathBuf>,

    /// How long stopping a frame pump waits for the worker. Default: **1000 ms**.
    pub shutdown_timeout_ms: u64,

    /// Maximum targets per session, at most [`MAX_TARGETS`]. Default: **9**.
    pub max_targets: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_path_len: None,
            movement_threshold: MOVEMENT_THRESHOLD,
            nominal_fps: 30.0,
            session_max_age_hours: 24.0,
            temp_max_age_hours: 1.0,
            temp_dir: None,
            shutdown_timeout_ms: 1000,
            max_targets: MAX_TARGETS,
        }
    }
}

impl EngineConfig {
    /// Defaults with the interactive path cap of [`INTERACTIVE_PATH_LEN`] points.
    pub fn interactive() -> Self {
        Self {
            max_path_len: Some(INTERACTIVE_PATH_LEN),
            ..Self::default()
        }
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FileRead`] if the file cannot be read,
    /// [`ConfigError::Parse`] if the JSON is malformed and
    /// [`ConfigError::InvalidValue`] if a field fails validation.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field, reporting the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_path_len == Some(0) {
            return Err(ConfigError::invalid_value(
                "max_path_len",
                "must be at least 1 when set",
            ));
        }
        if !(self.movement_threshold.is_finite() && self.movement_threshold >= 0.0) {
            return Err(ConfigError::invalid_value(
                "movement_threshold",
                format!("must be a non-negative number, got {}", self.movement_threshold),
            ));
        }
        positive("nominal_fps", self.nominal_fps)?;
        age_hours("session_max_age_hours", self.session_max_age_hours)?;
        age_hours("temp_max_age_hours", self.temp_max_age_hours)?;
        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "shutdown_timeout_ms",
                "must be positive",
            ));
        }
        if !(1..=MAX_TARGETS).contains(&self.max_targets) {
            return Err(ConfigError::invalid_value(
                "max_targets",
                format!("must be within 1..={MAX_TARGETS}, got {}", self.max_targets),
            ));
        }
        Ok(())
    }

    /// Seconds between two frames at the nominal rate.
    pub fn nominal_interval(&self) -> f64 {
        1.0 / self.nominal_fps
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Temporary artifact age threshold. Values no `Duration` can hold
    /// saturate to [`Duration::MAX`], so nothing counts as stale.
    pub fn temp_max_age(&self) -> Duration {
        Duration::try_from_secs_f64(self.temp_max_age_hours * 3600.0).unwrap_or(Duration::MAX)
    }
}

fn age_hours(field: &'static str, value: f64) -> Result<(), ConfigError> {
    positive(field, value)?;
    if value > MAX_AGE_HOURS {
        return Err(ConfigError::invalid_value(
            field,
            format!("must be at most {MAX_AGE_HOURS} hours, got {value}"),
        ));
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(
            field,
            format!("must be positive, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        config.validate().expect("default config should be valid");
        assert_eq!(config.max_path_len, None);
        assert_eq!(config.movement_threshold, 2.0);
        assert_eq!(config.session_max_age_hours, 24.0);
        assert_eq!(config.temp_max_age_hours, 1.0);
    }

    #[test]
    fn interactive_caps_path() {
        let config = EngineConfig::interactive();
        assert_eq!(config.max_path_len, Some(1000));
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_takes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "max_path_len": 50, "nominal_fps": 25.0 }"#).unwrap();

        let config = EngineConfig::from_json(&path).unwrap();
        assert_eq!(config.max_path_len, Some(50));
        assert_eq!(config.nominal_fps, 25.0);
        assert_eq!(config.max_targets, MAX_TARGETS);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.max_path_len = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "max_path_len", .. })
        ));

        let mut config = EngineConfig::default();
        config.nominal_fps = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.max_targets = 10;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.session_max_age_hours = 1e12;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "session_max_age_hours", .. })
        ));

        let mut config = EngineConfig::default();
        config.temp_max_age_hours = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unrepresentable_temp_age_saturates() {
        let mut config = EngineConfig::default();
        config.temp_max_age_hours = -1.0;
        assert_eq!(config.temp_max_age(), Duration::MAX);
        config.temp_max_age_hours = 1e300;
        assert_eq!(config.temp_max_age(), Duration::MAX);
        config.temp_max_age_hours = 1.0;
        assert_eq!(config.temp_max_age(), Duration::from_secs(3600));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = EngineConfig::from_json(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
