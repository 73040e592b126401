//! metacontrol - meta-level control of anytime computations
//!
//! A producer incrementally improves an artifact while a monitor samples its
//! quality, projects the next quality, and halts the producer once the
//! utility `quality - time cost` stops improving.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the `WorkUnit` port
//! - **Service Layer** (`services`): shared state, producer, monitor, utility and projection
//! - **Application Layer** (`application`): the controller that runs both activities
//! - **Adapters** (`adapters`): the reference plan-step producer
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use metacontrol::adapters::PlanStepProducer;
//! use metacontrol::domain::models::ControlConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let report = metacontrol::run(
//!         "write the report",
//!         ControlConfig::default(),
//!         PlanStepProducer::new("write the report"),
//!     )
//!     .await
//!     .into_result()?;
//!
//!     if let Some(decision) = &report.decision {
//!         println!("stopped at {:.2}s", decision.elapsed_time);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{run, Controller};
pub use domain::errors::{ControlError, ControlResult};
pub use domain::models::{
    Config, ControlConfig, DecisionReason, DecisionRecord, RunReport, UtilitySample,
};
pub use domain::ports::WorkUnit;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{SharedState, StopHandle};
