//! Object level: the incrementally improving producer.
//!
//! Each iteration checks the stop flag, performs one work unit, publishes the
//! new quality and the full history, then sleeps for the step interval. The
//! stop flag is only honoured at iteration boundaries.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::run_clock::whole_millis;
use super::shared_state::{keys, SharedState};
use crate::domain::errors::{ControlError, ControlResult};
use crate::domain::models::{ControlConfig, ProducerExit};
use crate::domain::ports::WorkUnit;

/// What the producer hands back when its loop ends.
#[derive(Debug)]
pub struct ProducerReport<A> {
    /// Completed production steps
    pub steps: u32,
    /// How the loop ended; an error when the work unit failed or misbehaved
    pub outcome: ControlResult<ProducerExit>,
    /// Last successful artifact, returned as produced
    pub artifact: Option<A>,
    /// Shared-state writes that failed after the loop ended
    pub publish_errors: Vec<ControlError>,
}

pub struct QualityProducer<W: WorkUnit> {
    state: SharedState,
    work_unit: W,
    step_interval: Duration,
    iteration_cap: Option<u32>,
}

/// Mutable progress of one producer run.
struct Progress<A> {
    steps: u32,
    history: Vec<f64>,
    artifact: Option<A>,
}

impl<W: WorkUnit> QualityProducer<W> {
    pub fn new(state: SharedState, work_unit: W, config: &ControlConfig) -> Self {
        Self {
            state,
            work_unit,
            step_interval: config.step_interval(),
            iteration_cap: config.iteration_cap,
        }
    }

    /// Run until the stop flag is observed, the iteration cap is reached, or
    /// the work unit fails.
    ///
    /// The last successful artifact is published under `final_artifact`
    /// whatever the outcome. A failed publish never replaces the outcome; it
    /// is reported in [`ProducerReport::publish_errors`].
    pub async fn run(self) -> ProducerReport<W::Artifact> {
        info!(
            step_interval_ms = whole_millis(self.step_interval),
            iteration_cap = ?self.iteration_cap,
            "producer started"
        );

        let mut progress = Progress {
            steps: 0,
            history: Vec::new(),
            artifact: None,
        };

        let outcome = self.produce(&mut progress).await;
        let mut publish_errors = Vec::new();

        if let Some(artifact) = &progress.artifact {
            if let Err(err) = self.state.set(keys::FINAL_ARTIFACT, artifact).await {
                warn!(error = %err, "could not publish final artifact");
                publish_errors.push(err);
            }
        }

        match &outcome {
            Ok(exit) => info!(steps = progress.steps, exit = ?exit, "producer stopped"),
            Err(err) => {
                warn!(steps = progress.steps, error = %err, "producer aborted");
                if let Err(publish_err) = self.state.set(keys::PRODUCER_ERROR, &err.to_string()).await
                {
                    publish_errors.push(publish_err);
                }
            }
        }

        ProducerReport {
            steps: progress.steps,
            outcome,
            artifact: progress.artifact,
            publish_errors,
        }
    }

    async fn produce(&self, progress: &mut Progress<W::Artifact>) -> ControlResult<ProducerExit> {
        loop {
            if self.state.stop_requested().await? {
                debug!(steps = progress.steps, "stop flag observed");
                return Ok(ProducerExit::StopRequested);
            }

            let step = progress.steps + 1;
            let (artifact, quality) = self
                .work_unit
                .step(progress.artifact.as_ref())
                .await
                .map_err(|e| ControlError::ProducerFailure {
                    step,
                    message: format!("{e:#}"),
                })?;

            if !quality.is_finite() || quality < 0.0 {
                return Err(ControlError::InvalidQuality {
                    step,
                    value: quality,
                });
            }
            if progress.history.last().is_some_and(|prev| quality < *prev) {
                warn!(step, quality, "quality decreased between steps");
            }

            progress.steps = step;
            progress.history.push(quality);
            progress.artifact = Some(artifact);

            self.state.set(keys::QUALITY_HISTORY, &progress.history).await?;
            self.state.set(keys::CURRENT_QUALITY, &quality).await?;
            self.state.set(keys::STEP_COUNT, &step).await?;
            debug!(step, quality, "step published");

            sleep(self.step_interval).await;

            if self.iteration_cap.is_some_and(|cap| progress.steps >= cap) {
                debug!(steps = progress.steps, "iteration cap reached");
                return Ok(ProducerExit::IterationCap);
            }
        }
    }
}
