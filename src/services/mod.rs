//! Control-loop services: the shared blackboard, the two concurrent
//! activities, and the pure utility/projection functions they use.

pub mod meta_monitor;
pub mod quality_producer;
pub mod quality_projector;
pub mod run_clock;
pub mod shared_state;
pub mod utility_model;

pub use meta_monitor::{MetaMonitor, MonitorReport, StopRule};
pub use quality_producer::{ProducerReport, QualityProducer};
pub use quality_projector::{constant_increment, log_linear, Projection, QualityProjector};
pub use run_clock::{whole_millis, RunClock};
pub use shared_state::{keys, SharedState, StopHandle};
pub use utility_model::{UtilityComponents, UtilityModel};
