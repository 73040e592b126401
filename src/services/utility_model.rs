//! Time-dependent utility: quality minus an exponential cost of time.
//!
//! ```text
//! intrinsic_value(q) = q
//! time_cost(t)       = exp(k * t) - c
//! utility(q, t)      = intrinsic_value(q) - time_cost(t)
//! ```
//!
//! The cost grows faster than any polynomial in `t`, so for quality that grows
//! slower than exponentially the utility eventually decreases and the monitor
//! always reaches a stopping point.

use serde::{Deserialize, Serialize};

use crate::domain::models::{ControlConfig, CostOffset};

/// The three parts of a utility evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityComponents {
    pub intrinsic_value: f64,
    pub time_cost: f64,
    pub utility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilityModel {
    decay_rate: f64,
    cost_offset: CostOffset,
}

impl UtilityModel {
    pub const fn new(decay_rate: f64, cost_offset: CostOffset) -> Self {
        Self {
            decay_rate,
            cost_offset,
        }
    }

    pub const fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.decay_rate, config.cost_offset)
    }

    pub const fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub const fn intrinsic_value(&self, quality: f64) -> f64 {
        quality
    }

    pub fn time_cost(&self, elapsed_secs: f64) -> f64 {
        (self.decay_rate * elapsed_secs).exp() - self.cost_offset.constant()
    }

    pub fn utility(&self, quality: f64, elapsed_secs: f64) -> f64 {
        self.components(quality, elapsed_secs).utility
    }

    pub fn components(&self, quality: f64, elapsed_secs: f64) -> UtilityComponents {
        let intrinsic_value = self.intrinsic_value(quality);
        let time_cost = self.time_cost(elapsed_secs);
        UtilityComponents {
            intrinsic_value,
            time_cost,
            utility: intrinsic_value - time_cost,
        }
    }

    /// Elapsed time at which one extra `gain` of quality, delivered over
    /// `interval_secs`, no longer pays for the time it costs.
    ///
    /// Solves `exp(k * (t + dt)) - exp(k * t) = gain` for `t`. Returns 0 when
    /// the gain is already too small at `t = 0`.
    pub fn break_even_time(&self, gain: f64, interval_secs: f64) -> f64 {
        let growth = (self.decay_rate * interval_secs).exp() - 1.0;
        if growth <= 0.0 {
            return f64::INFINITY;
        }
        ((gain / growth).ln() / self.decay_rate).max(0.0)
    }
}
