//! Port trait definitions (Hexagonal Architecture)
//!
//! - WorkUnit: one step of object-level work performed by the quality producer
//!
//! Producers of concrete artifacts live in `adapters`; the control loop only
//! depends on this contract.
pub mod work_unit;

pub use work_unit::{work_unit_fn, FnWorkUnit, WorkUnit};
