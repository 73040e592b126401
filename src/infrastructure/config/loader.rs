use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid poll_interval_ms: {0}. Must be at least 1")]
    InvalidPollInterval(u64),

    #[error("Invalid step_interval_ms: {0}. Must be at least 1")]
    InvalidStepInterval(u64),

    #[error("Invalid decay_rate: {0}. Must be a positive finite number")]
    InvalidDecayRate(f64),

    #[error("Invalid iteration_cap: 0. Omit it for an unbounded producer")]
    InvalidIterationCap,

    #[error("Invalid projection increment: {0}. Must be non-negative")]
    InvalidIncrement(f64),

    #[error("Invalid stop_margin: {0}. Must be non-negative")]
    InvalidStopMargin(f64),

    #[error("Invalid confirm_polls: 0. Must be at least 1")]
    InvalidConfirmPolls,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .metacontrol/config.yaml (project config)
    /// 3. .metacontrol/local.yaml (project local overrides, optional)
    /// 4. Environment variables (METACONTROL_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("METACONTROL_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".metacontrol/config.yaml"))
            .merge(Yaml::file(".metacontrol/local.yaml"))
            .merge(Env::prefixed("METACONTROL_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let control = &config.control;

        if control.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(control.poll_interval_ms));
        }

        if control.step_interval_ms == 0 {
            return Err(ConfigError::InvalidStepInterval(control.step_interval_ms));
        }

        if !control.decay_rate.is_finite() || control.decay_rate <= 0.0 {
            return Err(ConfigError::InvalidDecayRate(control.decay_rate));
        }

        if control.iteration_cap == Some(0) {
            return Err(ConfigError::InvalidIterationCap);
        }

        let increment = control.projection.increment;
        if !increment.is_finite() || increment < 0.0 {
            return Err(ConfigError::InvalidIncrement(increment));
        }

        if !control.stop_margin.is_finite() || control.stop_margin < 0.0 {
            return Err(ConfigError::InvalidStopMargin(control.stop_margin));
        }

        if control.confirm_polls == 0 {
            return Err(ConfigError::InvalidConfirmPolls);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
