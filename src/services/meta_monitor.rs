//! Meta level: decides when the producer should stop.
//!
//! ```text
//! Warmup --(elapsed > min_run_time)--> Observing --(non-improving trend)--> Decided
//!    \                                     \
//!     `----(producer stopped / external stop)----> Decided
//! ```
//!
//! The decision core ([`StopRule`] and [`MetaMonitor::record`]) is synchronous
//! so it can be exercised without a clock; [`MetaMonitor::run`] wraps it in a
//! fixed-interval polling loop over the shared state.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::quality_projector::QualityProjector;
use super::run_clock::{whole_millis, RunClock};
use super::shared_state::{keys, SharedState};
use super::utility_model::UtilityModel;
use crate::domain::errors::ControlResult;
use crate::domain::models::{
    ControlConfig, DecisionReason, DecisionRecord, MonitorPhase, UtilitySample,
};

/// Projection horizon used at every poll, in producer steps.
const PROJECTION_HORIZON: u32 = 1;

/// Turns one observation into a [`UtilitySample`].
#[derive(Debug, Clone)]
pub struct StopRule {
    utility: UtilityModel,
    projector: QualityProjector,
    min_run_time_secs: f64,
    poll_interval_secs: f64,
    stop_margin: f64,
    confirm_polls: u32,
}

impl StopRule {
    pub fn from_config(config: &ControlConfig) -> Self {
        Self {
            utility: UtilityModel::from_config(config),
            projector: QualityProjector::from_config(&config.projection),
            min_run_time_secs: config.min_run_time().as_secs_f64(),
            poll_interval_secs: config.poll_interval().as_secs_f64(),
            stop_margin: config.stop_margin,
            confirm_polls: config.confirm_polls.max(1),
        }
    }

    pub const fn utility_model(&self) -> &UtilityModel {
        &self.utility
    }

    /// Trend stopping is armed only strictly after the minimum run time.
    pub fn phase_at(&self, elapsed_secs: f64) -> MonitorPhase {
        if elapsed_secs > self.min_run_time_secs {
            MonitorPhase::Observing
        } else {
            MonitorPhase::Warmup
        }
    }

    /// Evaluate current and projected utility for one poll.
    pub fn assess(
        &self,
        poll: u32,
        elapsed_secs: f64,
        quality: f64,
        history: &[f64],
    ) -> UtilitySample {
        let now = self.utility.components(quality, elapsed_secs);
        let projection = self.projector.project(quality, history, PROJECTION_HORIZON);
        let projected_utility = projection
            .value
            .map(|q| self.utility.utility(q, elapsed_secs + self.poll_interval_secs));

        UtilitySample {
            poll,
            elapsed_time: elapsed_secs,
            quality,
            intrinsic_value: now.intrinsic_value,
            time_cost: now.time_cost,
            utility: now.utility,
            projected_quality: projection.value,
            projected_utility,
            projection: projection.source,
            phase: self.phase_at(elapsed_secs),
        }
    }
}

/// What the monitor hands back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub trace: Vec<UtilitySample>,
    /// None only if the producer stopped before any quality was observed
    pub decision: Option<DecisionRecord>,
}

pub struct MetaMonitor {
    state: SharedState,
    rule: StopRule,
    clock: RunClock,
    poll_interval: Duration,
    phase: MonitorPhase,
    streak: u32,
    trace: Vec<UtilitySample>,
    decision: Option<DecisionRecord>,
}

impl MetaMonitor {
    pub fn new(state: SharedState, config: &ControlConfig, clock: RunClock) -> Self {
        Self {
            state,
            rule: StopRule::from_config(config),
            clock,
            poll_interval: config.poll_interval(),
            phase: MonitorPhase::Warmup,
            streak: 0,
            trace: Vec::new(),
            decision: None,
        }
    }

    pub const fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn trace(&self) -> &[UtilitySample] {
        &self.trace
    }

    pub const fn decision(&self) -> Option<&DecisionRecord> {
        self.decision.as_ref()
    }

    /// Append a sample and apply the trend rule.
    ///
    /// Returns the decision when this sample moves the monitor to
    /// [`MonitorPhase::Decided`]. Samples offered after the decision are ignored.
    pub fn record(&mut self, sample: UtilitySample) -> Option<DecisionRecord> {
        if self.phase == MonitorPhase::Decided {
            return None;
        }

        if self.phase == MonitorPhase::Warmup && sample.phase == MonitorPhase::Observing {
            info!(elapsed = sample.elapsed_time, "monitor observing");
            self.phase = MonitorPhase::Observing;
        }

        if sample.phase == MonitorPhase::Observing && sample.is_non_improving(self.rule.stop_margin) {
            self.streak += 1;
        } else {
            self.streak = 0;
        }

        let decision = (self.streak >= self.rule.confirm_polls)
            .then(|| self.decide(&sample, DecisionReason::UtilityTrend));
        self.trace.push(sample);
        decision
    }

    /// Freeze the decision from the last sample without asserting the trend.
    pub fn decide_from_last(&mut self, reason: DecisionReason) -> Option<DecisionRecord> {
        if self.phase == MonitorPhase::Decided {
            return self.decision.clone();
        }
        self.phase = MonitorPhase::Decided;
        let record = self
            .trace
            .last()
            .map(|last| DecisionRecord::from_sample(last, reason));
        self.decision.clone_from(&record);
        record
    }

    fn decide(&mut self, sample: &UtilitySample, reason: DecisionReason) -> DecisionRecord {
        self.phase = MonitorPhase::Decided;
        let record = DecisionRecord::from_sample(sample, reason);
        self.decision = Some(record.clone());
        record
    }

    /// Poll the shared state until a decision is reached.
    pub async fn run(mut self) -> ControlResult<MonitorReport> {
        info!(
            poll_interval_ms = whole_millis(self.poll_interval),
            min_run_time_secs = self.rule.min_run_time_secs,
            decay_rate = self.rule.utility.decay_rate(),
            policy = self.rule.projector.policy().as_str(),
            "monitor started"
        );

        let mut poll: u32 = 0;
        loop {
            sleep(self.poll_interval).await;
            poll += 1;

            let stop_requested = self.state.stop_requested().await?;

            // Keys are read separately; the history's tail is the freshest quality.
            let history: Vec<f64> = self
                .state
                .get(keys::QUALITY_HISTORY)
                .await?
                .unwrap_or_default();
            let quality = match history.last() {
                Some(&latest) => Some(latest),
                None => self.state.get::<f64>(keys::CURRENT_QUALITY).await?,
            };

            match quality {
                Some(quality) => {
                    let sample =
                        self.rule
                            .assess(poll, self.clock.elapsed_secs(), quality, &history);
                    debug!(
                        poll,
                        elapsed = sample.elapsed_time,
                        quality = sample.quality,
                        utility_now = sample.utility,
                        utility_future = ?sample.projected_utility,
                        time_cost = sample.time_cost,
                        phase = %sample.phase,
                        "monitor sample"
                    );

                    if !stop_requested {
                        if let Some(decision) = self.record(sample) {
                            info!(
                                elapsed = decision.elapsed_time,
                                quality = decision.quality,
                                utility = decision.utility,
                                "projected utility no longer improves; stopping producer"
                            );
                            self.state.request_stop().await?;
                            self.state.set(keys::DECISION, &decision).await?;
                            break;
                        }
                    } else {
                        self.trace.push(sample);
                    }
                }
                None => debug!(poll, "no quality published yet"),
            }

            if stop_requested {
                warn!(poll, "stop requested externally");
                self.finish(DecisionReason::ExternalStop).await?;
                break;
            }

            if !self.state.producer_running().await? {
                info!(poll, "producer stopped before a trend decision");
                self.finish(DecisionReason::ProducerStopped).await?;
                break;
            }
        }

        Ok(MonitorReport {
            trace: self.trace,
            decision: self.decision,
        })
    }

    async fn finish(&mut self, reason: DecisionReason) -> ControlResult<()> {
        if let Some(decision) = self.decide_from_last(reason) {
            self.state.set(keys::DECISION, &decision).await?;
        }
        Ok(())
    }
}
