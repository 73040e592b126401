pub mod config;
pub mod report;
pub mod sample;

pub use config::{
    Config, ControlConfig, CostOffset, LoggingConfig, ProjectionConfig, ProjectionFallback,
    ProjectionPolicy,
};
pub use report::{Activity, ActivityFailure, ProducerExit, RunReport};
pub use sample::{DecisionReason, DecisionRecord, MonitorPhase, ProjectionSource, UtilitySample};
