//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! nominal_fps = 60.0
//! noise_floor_ms = 1.0
//! max_delta_ms = 250.0
//! label_policy = "reject"
//! target_frame_ms = 16.666
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::DEFAULT_NOISE_FLOOR_MS;
use crate::ecs::LabelPolicy;
use crate::error::{EngineError, EngineResult};

/// Nominal frame rate the loop feeds to the clock.
pub const DEFAULT_NOMINAL_FPS: f64 = 60.0;

/// Frame budget used by wall-clock hosts, in milliseconds.
pub const DEFAULT_TARGET_FRAME_MS: f64 = 1000.0 / 60.0;

/// Kernel configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Fps passed to the clock on every tick, regardless of measured rate.
    pub nominal_fps: f64,
    /// Clock deltas below this (ms) are ignored.
    pub noise_floor_ms: f64,
    /// Optional clamp applied to tick deltas before they reach systems and
    /// the clock. `None` keeps raw deltas.
    pub max_delta_ms: Option<f64>,
    /// Duplicate label handling in the registry.
    pub label_policy: LabelPolicy,
    /// Frame budget used by wall-clock hosts (ms).
    pub target_frame_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nominal_fps: DEFAULT_NOMINAL_FPS,
            noise_floor_ms: DEFAULT_NOISE_FLOOR_MS,
            max_delta_ms: None,
            label_policy: LabelPolicy::default(),
            target_frame_ms: DEFAULT_TARGET_FRAME_MS,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] on syntax errors, unknown keys or
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigIo`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EngineError::ConfigIo(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.nominal_fps.is_finite() && self.nominal_fps > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "nominal_fps must be positive, got {}",
                self.nominal_fps
            )));
        }
        if !(self.noise_floor_ms.is_finite() && self.noise_floor_ms >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "noise_floor_ms must be non-negative, got {}",
                self.noise_floor_ms
            )));
        }
        if let Some(max) = self.max_delta_ms {
            if !(max.is_finite() && max >= self.noise_floor_ms) {
                return Err(EngineError::InvalidConfig(format!(
                    "max_delta_ms must be at least noise_floor_ms, got {max}"
                )));
            }
        }
        if !(self.target_frame_ms.is_finite() && self.target_frame_ms > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "target_frame_ms must be positive, got {}",
                self.target_frame_ms
            )));
        }
        Ok(())
    }

    /// Applies `max_delta_ms` to a raw delta.
    #[must_use]
    pub fn clamp_delta(&self, delta_ms: f64) -> f64 {
        match self.max_delta_ms {
            Some(max) if delta_ms > max => max,
            _ => delta_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!((config.nominal_fps - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.label_policy, LabelPolicy::LastWriteWins);
        assert!(config.max_delta_ms.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            nominal_fps = 30.0
            max_delta_ms = 100.0
            label_policy = "reject"
            "#,
        )
        .unwrap();
        assert!((config.nominal_fps - 30.0).abs() < f64::EPSILON);
        assert_eq!(config.max_delta_ms, Some(100.0));
        assert_eq!(config.label_policy, LabelPolicy::Reject);
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("fps = 60.0"),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("nominal_fps = 0.0"),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("max_delta_ms = 0.5"),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_shipped_config_parses() {
        let config =
            EngineConfig::from_toml_str(include_str!("../../../config/regatta.toml")).unwrap();
        assert_eq!(config.max_delta_ms, Some(250.0));
        assert_eq!(config.label_policy, LabelPolicy::LastWriteWins);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::load("/definitely/not/here/regatta.toml").unwrap_err();
        assert!(matches!(err, EngineError::ConfigIo(_)));
    }

    #[test]
    fn test_clamp_delta() {
        let mut config = EngineConfig::default();
        assert!((config.clamp_delta(5000.0) - 5000.0).abs() < f64::EPSILON);
        config.max_delta_ms = Some(250.0);
        assert!((config.clamp_delta(5000.0) - 250.0).abs() < f64::EPSILON);
        assert!((config.clamp_delta(16.0) - 16.0).abs() < f64::EPSILON);
    }
}
