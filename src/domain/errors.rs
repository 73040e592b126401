//! Domain errors for the metacontrol run loop.

use thiserror::Error;

/// Errors that can occur while controlling an anytime computation.
///
/// Only [`ControlError::ProducerFailure`] and [`ControlError::MonitorFailure`]
/// end an activity. [`ControlError::InsufficientHistory`] and
/// [`ControlError::SharedStateKeyAbsent`] are recoverable and handled by the
/// caller (fallback projection, re-poll).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ControlError {
    #[error("Producer failed at step {step}: {message}")]
    ProducerFailure { step: u32, message: String },

    #[error("Producer reported invalid quality {value} at step {step}")]
    InvalidQuality { step: u32, value: f64 },

    #[error("Monitor failed: {0}")]
    MonitorFailure(String),

    #[error("Insufficient history for projection: {samples} usable sample(s)")]
    InsufficientHistory { samples: usize },

    #[error("Shared state key not yet written: {0}")]
    SharedStateKeyAbsent(String),

    #[error("Stop flag cannot be reverted once set")]
    StopFlagReverted,

    #[error("Serialization error for key {key}: {message}")]
    Serialization { key: String, message: String },

    #[error("Run failed: {}", format_failures(.0))]
    RunFailed(Vec<String>),
}

pub type ControlResult<T> = Result<T, ControlError>;

fn format_failures(failures: &[String]) -> String {
    if failures.is_empty() {
        "no activity completed".to_string()
    } else {
        failures.join("; ")
    }
}

impl ControlError {
    /// Whether the error leaves the run usable (caller should retry or fall back).
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientHistory { .. } | Self::SharedStateKeyAbsent(_)
        )
    }

    pub(crate) fn serialization(key: &str, err: &serde_json::Error) -> Self {
        Self::Serialization {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(ControlError::InsufficientHistory { samples: 1 }.is_recoverable());
        assert!(ControlError::SharedStateKeyAbsent("current_quality".into()).is_recoverable());
        assert!(!ControlError::StopFlagReverted.is_recoverable());
        assert!(!ControlError::ProducerFailure {
            step: 3,
            message: "boom".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_run_failed_message_joins_failures() {
        let err = ControlError::RunFailed(vec!["producer: a".into(), "monitor: b".into()]);
        assert_eq!(err.to_string(), "Run failed: producer: a; monitor: b");

        let empty = ControlError::RunFailed(vec![]);
        assert!(empty.to_string().contains("no activity completed"));
    }
}
