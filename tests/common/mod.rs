//! Common test utilities for integration tests
//!
//! Shared fixtures and helpers used across the integration test files.

use metacontrol::domain::models::{ControlConfig, ProjectionConfig, ProjectionPolicy};
use metacontrol::domain::ports::{work_unit_fn, WorkUnit};

/// Setup test logging
///
/// Initializes a tracing subscriber that writes through the test harness.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fast control settings: 100ms polls and steps, 500ms warm-up, k = 0.15,
/// constant projection with an increment of one.
#[allow(dead_code)]
pub fn fast_config() -> ControlConfig {
    ControlConfig {
        poll_interval_ms: 100,
        step_interval_ms: 100,
        min_run_time_ms: 500,
        decay_rate: 0.15,
        iteration_cap: Some(1000),
        projection: ProjectionConfig {
            policy: ProjectionPolicy::Constant,
            increment: 1.0,
            ..ProjectionConfig::default()
        },
        ..ControlConfig::default()
    }
}

/// Work unit whose artifact and quality both equal the step count.
#[allow(dead_code)]
pub fn counting_unit() -> impl WorkUnit<Artifact = u32> {
    work_unit_fn(|prev: Option<&u32>| {
        let next = prev.copied().unwrap_or(0) + 1;
        Ok((next, f64::from(next)))
    })
}

/// Counting work unit that fails while producing step `fail_at`.
#[allow(dead_code)]
pub fn failing_unit(fail_at: u32) -> impl WorkUnit<Artifact = u32> {
    work_unit_fn(move |prev: Option<&u32>| {
        let next = prev.copied().unwrap_or(0) + 1;
        if next == fail_at {
            anyhow::bail!("work unit exhausted at step {next}");
        }
        Ok((next, f64::from(next)))
    })
}
