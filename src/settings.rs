//! Physics tunables
//!
//! Passed into the collision engine and simulation at construction, so
//! independent simulations (tests, replays) can run with different damping.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Physics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Velocity factor applied after every collision (0.0 - 1.0)
    pub impulse_loss: f64,
    /// Resolved collisions per tick before the rest of the tick is abandoned
    pub max_collisions_per_tick: usize,
    /// Time-of-impact precision (ns)
    pub max_collision_time_error_ns: i64,
    /// Run overlap sanity checks around every resolution
    pub sanity_checks: bool,
    /// Ticks per second for the background driver (<= 0 = uncapped)
    pub target_fps: i32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            impulse_loss: DEFAULT_IMPULSE_LOSS,
            max_collisions_per_tick: MAX_COLLISIONS_PER_TICK,
            max_collision_time_error_ns: MAX_COLLISION_TIME_ERROR,
            sanity_checks: cfg!(debug_assertions),
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

impl PhysicsConfig {
    /// Builder-style override of the impulse loss
    pub fn with_impulse_loss(mut self, impulse_loss: f64) -> Self {
        self.impulse_loss = impulse_loss;
        self
    }

    /// Builder-style override of the sanity check flag
    pub fn with_sanity_checks(mut self, enabled: bool) -> Self {
        self.sanity_checks = enabled;
        self
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file, falling back to defaults on any error
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .and_then(|json| Self::from_json(&json))
        {
            Ok(config) => {
                log::info!("Loaded physics config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Using default physics config ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Tick period for the background driver, None when uncapped
    pub fn tick_period(&self) -> Option<std::time::Duration> {
        if self.target_fps <= 0 {
            return None;
        }
        Some(std::time::Duration::from_nanos(
            1_000_000_000 / self.target_fps as u64,
        ))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.impulse_loss) {
            return Err(ConfigError::Invalid("impulse_loss must be within 0.0..=1.0"));
        }
        if self.max_collisions_per_tick == 0 {
            return Err(ConfigError::Invalid("max_collisions_per_tick must be positive"));
        }
        if self.max_collision_time_error_ns < 1 {
            return Err(ConfigError::Invalid(
                "max_collision_time_error_ns must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PhysicsConfig::default();
        assert_eq!(config.impulse_loss, 0.9);
        assert_eq!(config.max_collisions_per_tick, 10);
        assert_eq!(config.max_collision_time_error_ns, 5);
        assert_eq!(
            config.tick_period(),
            Some(std::time::Duration::from_millis(10))
        );
    }

    #[test]
    fn test_partial_json() {
        let config = PhysicsConfig::from_json(r#"{ "impulse_loss": 0.5 }"#).unwrap();
        assert_eq!(config.impulse_loss, 0.5);
        assert_eq!(config.max_collisions_per_tick, MAX_COLLISIONS_PER_TICK);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            PhysicsConfig::from_json(r#"{ "impulse_loss": 1.5 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PhysicsConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_uncapped_has_no_period() {
        let config = PhysicsConfig {
            target_fps: -1,
            ..Default::default()
        };
        assert!(config.tick_period().is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let config = PhysicsConfig::default().with_impulse_loss(0.75);
        let json = config.to_json().unwrap();
        assert_eq!(PhysicsConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = PhysicsConfig::load("/nonexistent/physics.json");
        assert_eq!(config, PhysicsConfig::default());
    }
}
