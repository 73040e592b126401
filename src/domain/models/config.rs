use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for metacontrol
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Control loop configuration
    #[serde(default)]
    pub control: ControlConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for a single control run.
///
/// Durations are stored in milliseconds so they round-trip cleanly through
/// YAML and environment variables; use the accessor methods to get
/// [`Duration`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControlConfig {
    /// Interval between monitor polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Work-simulation delay after each producer step
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    /// The monitor never decides on a trend before this much time has elapsed
    #[serde(default = "default_min_run_time_ms")]
    pub min_run_time_ms: u64,

    /// Decay-rate constant `k` of the exponential time cost
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Vertical shift of the time cost curve
    #[serde(default)]
    pub cost_offset: CostOffset,

    /// Hard ceiling on producer iterations (None = unbounded)
    #[serde(default = "default_iteration_cap")]
    pub iteration_cap: Option<u32>,

    /// Quality projection policy
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Projected utility must fall at least this far below current utility
    #[serde(default)]
    pub stop_margin: f64,

    /// Consecutive non-improving polls required before stopping
    #[serde(default = "default_confirm_polls")]
    pub confirm_polls: u32,
}

const fn default_poll_interval_ms() -> u64 {
    600
}

const fn default_step_interval_ms() -> u64 {
    500
}

const fn default_min_run_time_ms() -> u64 {
    2000
}

const fn default_decay_rate() -> f64 {
    0.15
}

#[allow(clippy::unnecessary_wraps)]
const fn default_iteration_cap() -> Option<u32> {
    Some(60)
}

const fn default_confirm_polls() -> u32 {
    1
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            step_interval_ms: default_step_interval_ms(),
            min_run_time_ms: default_min_run_time_ms(),
            decay_rate: default_decay_rate(),
            cost_offset: CostOffset::default(),
            iteration_cap: default_iteration_cap(),
            projection: ProjectionConfig::default(),
            stop_margin: 0.0,
            confirm_polls: default_confirm_polls(),
        }
    }
}

impl ControlConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    pub const fn min_run_time(&self) -> Duration {
        Duration::from_millis(self.min_run_time_ms)
    }
}

/// Selects the constant `c` in `time_cost(t) = exp(k * t) - c`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostOffset {
    /// `c = 1`: time cost is zero at the start of the run
    #[default]
    ZeroAtStart,
    /// `c = 0`: time cost starts at one
    Raw,
}

impl CostOffset {
    pub const fn constant(self) -> f64 {
        match self {
            Self::ZeroAtStart => 1.0,
            Self::Raw => 0.0,
        }
    }
}

/// Quality projection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectionConfig {
    /// Which projection policy the monitor uses
    #[serde(default)]
    pub policy: ProjectionPolicy,

    /// Fixed quality gain assumed by the constant-increment policy
    #[serde(default = "default_increment")]
    pub increment: f64,

    /// What to do when regression cannot be fitted
    #[serde(default)]
    pub fallback: ProjectionFallback,
}

const fn default_increment() -> f64 {
    0.5
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            policy: ProjectionPolicy::default(),
            increment: default_increment(),
            fallback: ProjectionFallback::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionPolicy {
    /// Least-squares fit of `ln(q + 1)` against sample index
    Regression,
    /// Current quality plus a fixed increment
    #[default]
    Constant,
}

impl ProjectionPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Constant => "constant",
        }
    }
}

impl std::str::FromStr for ProjectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regression" => Ok(Self::Regression),
            "constant" => Ok(Self::Constant),
            other => Err(format!(
                "unknown projection policy '{other}' (expected regression or constant)"
            )),
        }
    }
}

/// Behaviour when the regression policy lacks usable history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionFallback {
    /// Use the constant-increment policy for that poll
    #[default]
    Constant,
    /// Treat the projection as unknown and never stop on that poll
    Defer,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (None = stderr only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation policy for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
