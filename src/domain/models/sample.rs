//! Monitor observations: per-poll utility samples and the frozen decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the meta-level monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    /// Elapsed time has not yet exceeded the minimum run time
    Warmup,
    /// Trend-based stopping is armed
    Observing,
    /// Terminal; no further samples are taken
    Decided,
}

impl MonitorPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warmup => "warmup",
            Self::Observing => "observing",
            Self::Decided => "decided",
        }
    }
}

impl std::fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a projected quality came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionSource {
    Regression,
    Constant,
    /// Regression could not be fitted and the fallback is to defer
    Deferred,
}

/// One entry of the sample trace, taken at a monitor poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilitySample {
    /// 1-based poll index
    pub poll: u32,
    /// Seconds since the run started
    pub elapsed_time: f64,
    pub quality: f64,
    pub intrinsic_value: f64,
    pub time_cost: f64,
    pub utility: f64,
    /// Projected quality one step ahead (None when deferred)
    pub projected_quality: Option<f64>,
    /// Utility of the projected quality one poll interval ahead
    pub projected_utility: Option<f64>,
    pub projection: ProjectionSource,
    /// Phase the monitor was in when the sample was taken
    pub phase: MonitorPhase,
}

impl UtilitySample {
    /// True when the projected utility does not beat the current utility by
    /// more than `margin`. A deferred projection is never non-improving.
    pub fn is_non_improving(&self, margin: f64) -> bool {
        self.projected_utility
            .is_some_and(|future| future <= self.utility - margin)
    }
}

/// Why the monitor reached [`MonitorPhase::Decided`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Projected utility stopped improving after the minimum run time
    UtilityTrend,
    /// The producer finished or aborted before a trend decision
    ProducerStopped,
    /// The stop flag was raised by someone other than the monitor
    ExternalStop,
}

impl DecisionReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UtilityTrend => "utility_trend",
            Self::ProducerStopped => "producer_stopped",
            Self::ExternalStop => "external_stop",
        }
    }
}

/// Snapshot frozen at the stopping instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub elapsed_time: f64,
    pub quality: f64,
    pub utility: f64,
    pub poll: u32,
    pub reason: DecisionReason,
    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn from_sample(sample: &UtilitySample, reason: DecisionReason) -> Self {
        Self {
            elapsed_time: sample.elapsed_time,
            quality: sample.quality,
            utility: sample.utility,
            poll: sample.poll,
            reason,
            decided_at: Utc::now(),
        }
    }

    /// Whether this record was frozen from `sample`.
    pub fn matches_sample(&self, sample: &UtilitySample) -> bool {
        self.poll == sample.poll
            && self.elapsed_time.to_bits() == sample.elapsed_time.to_bits()
            && self.quality.to_bits() == sample.quality.to_bits()
            && self.utility.to_bits() == sample.utility.to_bits()
    }
}
