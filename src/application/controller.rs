//! Controller - runs one anytime computation under meta-level control
//!
//! Owns the shared state of a run and drives two concurrent tokio tasks:
//! - the quality producer (object level)
//! - the meta monitor (meta level)
//!
//! The tasks never call each other; they communicate only through
//! [`SharedState`]. Failures of one task are collected into the
//! [`RunReport`] and never abort the other.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinError;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{ControlError, ControlResult};
use crate::domain::models::{Activity, ActivityFailure, ControlConfig, RunReport};
use crate::domain::ports::WorkUnit;
use crate::services::{
    keys, MetaMonitor, MonitorReport, ProducerReport, QualityProducer, RunClock, SharedState,
    StopHandle,
};

/// Controller for a single run
///
/// # Examples
///
/// ```no_run
/// use metacontrol::application::Controller;
/// use metacontrol::domain::models::ControlConfig;
/// use metacontrol::domain::ports::work_unit_fn;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let controller = Controller::new(ControlConfig::default());
///     let unit = work_unit_fn(|prev: Option<&u64>| {
///         let next = prev.copied().unwrap_or(0) + 1;
///         Ok((next, next as f64))
///     });
///
///     let report = controller.run("count", unit).await.into_result()?;
///     println!("stopped after {} steps", report.steps);
///     Ok(())
/// }
/// ```
pub struct Controller {
    config: ControlConfig,
    state: SharedState,
}

impl Controller {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            state: SharedState::for_run(),
        }
    }

    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub const fn shared_state(&self) -> &SharedState {
        &self.state
    }

    /// Handle for raising the stop flag from outside the run (e.g. Ctrl-C).
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.state.clone())
    }

    /// Run the producer and monitor to completion.
    ///
    /// Waits for the producer, marks it as no longer running, then waits for
    /// the monitor. Never returns early on a failure: inspect
    /// [`RunReport::failures`] or call [`RunReport::into_result`].
    pub async fn run<W>(self, goal: &str, work_unit: W) -> RunReport<W::Artifact>
    where
        W: WorkUnit + 'static,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("control_run", %run_id, goal);

        async move {
            let mut failures = Vec::new();

            if let Err(err) = self.seed(goal, started_at).await {
                failures.push(ActivityFailure {
                    activity: Activity::Controller,
                    error: err,
                });
            }

            let clock = RunClock::start();
            let producer = QualityProducer::new(self.state.clone(), work_unit, &self.config);
            let monitor = MetaMonitor::new(self.state.clone(), &self.config, clock);

            let producer_handle = tokio::spawn(producer.run().in_current_span());
            let monitor_handle = tokio::spawn(
                supervise_monitor(self.state.clone(), monitor.run()).in_current_span(),
            );

            let producer_joined = producer_handle.await;
            if let Err(err) = self.state.set_producer_running(false).await {
                failures.push(ActivityFailure {
                    activity: Activity::Controller,
                    error: err,
                });
            }
            let monitor_result = flatten(monitor_handle.await, Activity::Monitor);

            let (steps, producer_exit, final_artifact) = match producer_joined {
                Ok(ProducerReport {
                    steps,
                    outcome,
                    artifact,
                    publish_errors,
                }) => {
                    let exit = collect(outcome, Activity::Producer, &mut failures);
                    failures.extend(publish_errors.into_iter().map(|error| ActivityFailure {
                        activity: Activity::Producer,
                        error,
                    }));
                    (steps, exit, artifact)
                }
                Err(join_err) => {
                    failures.push(ActivityFailure {
                        activity: Activity::Producer,
                        error: join_failure(&join_err, Activity::Producer),
                    });
                    let steps = self
                        .state
                        .get::<u32>(keys::STEP_COUNT)
                        .await
                        .ok()
                        .flatten()
                        .unwrap_or(0);
                    (steps, None, None)
                }
            };

            let monitor_report = collect(monitor_result, Activity::Monitor, &mut failures);
            let MonitorReport { trace, decision } = monitor_report.unwrap_or_else(|| MonitorReport {
                trace: Vec::new(),
                decision: None,
            });

            let report = RunReport {
                run_id,
                goal: goal.to_string(),
                started_at,
                finished_at: Utc::now(),
                final_artifact,
                steps,
                producer_exit,
                trace,
                decision,
                failures,
            };

            if report.failures.is_empty() {
                info!(
                    steps = report.steps,
                    samples = report.trace.len(),
                    reason = ?report.decision.as_ref().map(|d| d.reason),
                    "run finished"
                );
            } else {
                warn!(
                    steps = report.steps,
                    failures = report.failures.len(),
                    success = report.is_success(),
                    "run finished with failures"
                );
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn seed(&self, goal: &str, started_at: chrono::DateTime<Utc>) -> ControlResult<()> {
        self.state.set(keys::STARTED_AT, &started_at).await?;
        self.state.set(keys::GOAL, goal).await
    }
}

/// Run the monitor, turning errors and panics into a cooperative stop so the
/// producer cannot outlive a dead monitor.
async fn supervise_monitor<T>(
    state: SharedState,
    monitor: impl Future<Output = ControlResult<T>>,
) -> ControlResult<T> {
    let result = match AssertUnwindSafe(monitor).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ControlError::MonitorFailure(panic_message(&*panic))),
    };

    if let Err(err) = &result {
        error!(error = %err, "monitor failed; requesting producer stop");
        if let Err(stop_err) = state.request_stop().await {
            error!(error = %stop_err, "could not raise stop flag");
        }
    }
    result
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}

fn join_failure(join_err: &JoinError, activity: Activity) -> ControlError {
    let message = format!("task did not complete: {join_err}");
    match activity {
        Activity::Producer => ControlError::ProducerFailure { step: 0, message },
        Activity::Monitor | Activity::Controller => ControlError::MonitorFailure(message),
    }
}

fn flatten<T>(joined: Result<ControlResult<T>, JoinError>, activity: Activity) -> ControlResult<T> {
    joined.unwrap_or_else(|join_err| Err(join_failure(&join_err, activity)))
}

fn collect<T>(
    result: ControlResult<T>,
    activity: Activity,
    failures: &mut Vec<ActivityFailure>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            failures.push(ActivityFailure { activity, error });
            None
        }
    }
}

/// Run `work_unit` towards `goal` under a fresh [`Controller`].
pub async fn run<W>(goal: &str, config: ControlConfig, work_unit: W) -> RunReport<W::Artifact>
where
    W: WorkUnit + 'static,
{
    Controller::new(config).run(goal, work_unit).await
}
