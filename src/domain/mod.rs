//! Domain layer for metacontrol
//!
//! Core data model of a control run (configuration, samples, decisions,
//! reports), the error type, and the work-unit port implemented by producers.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ControlError, ControlResult};
