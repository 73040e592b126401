//! Concrete work units plugged into the control loop.

pub mod plan_steps;

pub use plan_steps::{Plan, PlanStepProducer};
