//! Short-horizon projection of producer quality.
//!
//! Two policies are supported:
//!
//! - **Regression**: least-squares fit of `ln(q + 1)` against the sample index,
//!   extrapolated `horizon` steps past the last sample and mapped back with
//!   `exp(y) - 1`. Needs at least two samples with `q + 1 > 0`.
//! - **Constant**: current quality plus a fixed increment per step.
//!
//! Neither policy mutates the history it is given.

use crate::domain::errors::{ControlError, ControlResult};
use crate::domain::models::{ProjectionConfig, ProjectionFallback, ProjectionPolicy, ProjectionSource};

/// Result of a projection, tagged with the policy that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// None when the regression could not be fitted and the fallback defers
    pub value: Option<f64>,
    pub source: ProjectionSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityProjector {
    policy: ProjectionPolicy,
    increment: f64,
    fallback: ProjectionFallback,
}

impl QualityProjector {
    pub const fn new(policy: ProjectionPolicy, increment: f64, fallback: ProjectionFallback) -> Self {
        Self {
            policy,
            increment,
            fallback,
        }
    }

    pub const fn from_config(config: &ProjectionConfig) -> Self {
        Self::new(config.policy, config.increment, config.fallback)
    }

    pub const fn policy(&self) -> ProjectionPolicy {
        self.policy
    }

    /// Project quality `horizon` steps ahead, applying the configured fallback
    /// when the regression cannot be fitted.
    pub fn project(&self, current_quality: f64, history: &[f64], horizon: u32) -> Projection {
        match self.policy {
            ProjectionPolicy::Constant => Projection {
                value: Some(constant_increment(current_quality, self.increment, horizon)),
                source: ProjectionSource::Constant,
            },
            ProjectionPolicy::Regression => match log_linear(history, horizon) {
                Ok(value) => Projection {
                    value: Some(value),
                    source: ProjectionSource::Regression,
                },
                Err(err) => {
                    tracing::trace!(error = %err, fallback = ?self.fallback, "regression unavailable");
                    match self.fallback {
                        ProjectionFallback::Constant => Projection {
                            value: Some(constant_increment(current_quality, self.increment, horizon)),
                            source: ProjectionSource::Constant,
                        },
                        ProjectionFallback::Defer => Projection {
                            value: None,
                            source: ProjectionSource::Deferred,
                        },
                    }
                }
            },
        }
    }
}

/// `current + increment * horizon`.
pub fn constant_increment(current_quality: f64, increment: f64, horizon: u32) -> f64 {
    current_quality + increment * f64::from(horizon)
}

/// Log-linear least-squares extrapolation.
///
/// Fits `ln(q_i + 1) = slope * i + intercept` for `i in 0..n` and evaluates
/// the fit at `i = n - 1 + horizon`.
pub fn log_linear(history: &[f64], horizon: u32) -> ControlResult<f64> {
    let n = history.len();
    if n < 2 || history.iter().any(|q| !q.is_finite() || *q + 1.0 <= 0.0) {
        let usable = history
            .iter()
            .filter(|q| q.is_finite() && **q + 1.0 > 0.0)
            .count();
        return Err(ControlError::InsufficientHistory { samples: usable });
    }

    #[allow(clippy::cast_precision_loss)]
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = history.iter().map(|q| (q + 1.0).ln()).sum::<f64>() / n_f;

    let (sxy, sxx) = history
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (i, q)| {
            #[allow(clippy::cast_precision_loss)]
            let dx = i as f64 - mean_x;
            let dy = (q + 1.0).ln() - mean_y;
            (dx.mul_add(dy, sxy), dx.mul_add(dx, sxx))
        });

    let slope = sxy / sxx;
    let intercept = slope.mul_add(-mean_x, mean_y);
    let x_next = n_f - 1.0 + f64::from(horizon);
    let projected = slope.mul_add(x_next, intercept).exp() - 1.0;

    if projected.is_finite() {
        Ok(projected)
    } else {
        Err(ControlError::InsufficientHistory { samples: n })
    }
}
