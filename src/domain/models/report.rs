//! The result of a control run handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::sample::{DecisionRecord, UtilitySample};
use crate::domain::errors::{ControlError, ControlResult};

/// Which concurrent activity a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Producer,
    Monitor,
    Controller,
}

impl Activity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Monitor => "monitor",
            Self::Controller => "controller",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityFailure {
    pub activity: Activity,
    #[serde(serialize_with = "serialize_display")]
    pub error: ControlError,
}

fn serialize_display<S: Serializer>(error: &ControlError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// How the producer loop ended when it ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerExit {
    /// The stop flag was observed at an iteration boundary
    StopRequested,
    /// The configured iteration cap was reached
    IterationCap,
}

/// Everything a run produced: final artifact, sample trace, decision and
/// the failures collected from both activities.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<A> {
    pub run_id: Uuid,
    pub goal: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_artifact: Option<A>,
    /// Completed production steps
    pub steps: u32,
    /// Set when the producer completed normally
    pub producer_exit: Option<ProducerExit>,
    pub trace: Vec<UtilitySample>,
    /// Set when the monitor reached the decided phase
    pub decision: Option<DecisionRecord>,
    pub failures: Vec<ActivityFailure>,
}

impl<A> RunReport<A> {
    /// A run succeeds when the monitor decided or the producer completed normally.
    pub const fn is_success(&self) -> bool {
        self.decision.is_some() || self.producer_exit.is_some()
    }

    pub fn failures_for(&self, activity: Activity) -> impl Iterator<Item = &ControlError> {
        self.failures
            .iter()
            .filter(move |f| f.activity == activity)
            .map(|f| &f.error)
    }

    /// Convert an unsuccessful report into [`ControlError::RunFailed`].
    pub fn into_result(self) -> ControlResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ControlError::RunFailed(
                self.failures
                    .iter()
                    .map(|f| format!("{}: {}", f.activity.as_str(), f.error))
                    .collect(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_report() -> RunReport<Vec<String>> {
        RunReport {
            run_id: Uuid::new_v4(),
            goal: "test".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            final_artifact: None,
            steps: 0,
            producer_exit: None,
            trace: vec![],
            decision: None,
            failures: vec![],
        }
    }

    #[test]
    fn test_success_requires_decision_or_clean_producer() {
        let mut report = empty_report();
        assert!(!report.is_success());

        report.producer_exit = Some(ProducerExit::IterationCap);
        assert!(report.is_success());
    }

    #[test]
    fn test_into_result_lists_every_failure() {
        let mut report = empty_report();
        report.failures.push(ActivityFailure {
            activity: Activity::Producer,
            error: ControlError::ProducerFailure {
                step: 2,
                message: "disk full".into(),
            },
        });
        report.failures.push(ActivityFailure {
            activity: Activity::Monitor,
            error: ControlError::MonitorFailure("panicked".into()),
        });

        assert_eq!(report.failures_for(Activity::Monitor).count(), 1);

        match report.into_result() {
            Err(ControlError::RunFailed(failures)) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("producer:"));
                assert!(failures[1].starts_with("monitor:"));
            }
            other => panic!("Expected RunFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_serializes_as_message() {
        let failure = ActivityFailure {
            activity: Activity::Monitor,
            error: ControlError::StopFlagReverted,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["activity"], "monitor");
        assert_eq!(json["error"], "Stop flag cannot be reverted once set");
    }
}
