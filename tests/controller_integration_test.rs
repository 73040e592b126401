//! End-to-end runs of the controller under tokio's paused clock.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use metacontrol::adapters::PlanStepProducer;
use metacontrol::domain::models::{
    Activity, ControlConfig, DecisionReason, MonitorPhase, ProducerExit, ProjectionPolicy,
};
use metacontrol::domain::ports::work_unit_fn;
use metacontrol::services::{keys, SharedState, UtilityModel};
use metacontrol::{ControlError, Controller};

use common::{counting_unit, failing_unit, fast_config, setup_test_logging};

#[tokio::test(start_paused = true)]
async fn test_decision_lands_at_analytic_crossing() {
    setup_test_logging();
    let config = fast_config();
    let model = UtilityModel::from_config(&config);
    let crossing = model.break_even_time(1.0, 0.1);
    assert!((crossing - 27.95).abs() < 0.01, "crossing at {crossing}");

    let report = Controller::new(config).run("count", counting_unit()).await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    let decision = report.decision.clone().expect("monitor should decide");
    assert_eq!(decision.reason, DecisionReason::UtilityTrend);
    assert!(
        decision.elapsed_time >= crossing && decision.elapsed_time <= crossing + 0.11,
        "decided at {} but crossing is {crossing}",
        decision.elapsed_time
    );

    let last = report.trace.last().expect("trace should not be empty");
    assert!(decision.matches_sample(last));
    assert!(report
        .trace
        .iter()
        .rev()
        .skip(1)
        .all(|s| s.elapsed_time < crossing));

    assert_eq!(report.producer_exit, Some(ProducerExit::StopRequested));
    assert_eq!(report.final_artifact, Some(report.steps));
    assert!(report.steps >= 279);
}

#[tokio::test(start_paused = true)]
async fn test_capped_producer_ends_run_before_warmup() {
    let config = ControlConfig {
        iteration_cap: Some(5),
        min_run_time_ms: 2000,
        ..fast_config()
    };

    let report = Controller::new(config).run("count", counting_unit()).await;

    assert!(report.is_success());
    assert_eq!(report.steps, 5);
    assert_eq!(report.producer_exit, Some(ProducerExit::IterationCap));
    assert_eq!(report.final_artifact, Some(5));

    let decision = report.decision.as_ref().expect("independent stop decides");
    assert_eq!(decision.reason, DecisionReason::ProducerStopped);
    let last = report.trace.last().expect("at least one sample");
    assert!(decision.matches_sample(last));
    assert!((decision.quality - 5.0).abs() < f64::EPSILON);
    assert!(report.trace.iter().all(|s| s.phase == MonitorPhase::Warmup));
}

#[tokio::test(start_paused = true)]
async fn test_producer_failure_keeps_last_artifact() {
    let config = ControlConfig {
        min_run_time_ms: 60_000,
        ..fast_config()
    };

    let report = Controller::new(config).run("count", failing_unit(3)).await;

    assert_eq!(report.final_artifact, Some(2));
    assert_eq!(report.steps, 2);
    assert_eq!(report.producer_exit, None);

    let failures: Vec<_> = report.failures_for(Activity::Producer).collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0],
        ControlError::ProducerFailure { step: 3, .. }
    ));
    assert_eq!(report.failures_for(Activity::Monitor).count(), 0);

    let decision = report.decision.as_ref().expect("monitor still decides");
    assert_eq!(decision.reason, DecisionReason::ProducerStopped);
    assert!((decision.quality - 2.0).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_external_stop_handle_halts_run() {
    let config = ControlConfig {
        min_run_time_ms: 60_000,
        iteration_cap: None,
        ..fast_config()
    };
    let controller = Controller::new(config);
    let stop = controller.stop_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1050)).await;
        stop.request_stop().await.unwrap();
    });

    let report = controller.run("count", counting_unit()).await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.producer_exit, Some(ProducerExit::StopRequested));
    let decision = report.decision.as_ref().expect("external stop decides");
    assert_eq!(decision.reason, DecisionReason::ExternalStop);
    assert!(decision.elapsed_time >= 1.05);
    assert!(report.steps >= 10 && report.steps <= 12, "steps = {}", report.steps);
}

#[tokio::test(start_paused = true)]
async fn test_plan_producer_with_regression_projection() {
    let config = ControlConfig {
        projection: metacontrol::domain::models::ProjectionConfig {
            policy: ProjectionPolicy::Regression,
            ..Default::default()
        },
        ..fast_config()
    };

    let report = Controller::new(config)
        .run("write a thesis", PlanStepProducer::new("write a thesis"))
        .await
        .into_result()
        .expect("run should succeed");

    let plan = report.final_artifact.expect("plan");
    assert_eq!(plan.len() as u32, report.steps);
    assert_eq!(plan.steps[0], "Step 1 towards write a thesis");
    let decision = report.decision.expect("decision");
    assert!(decision.elapsed_time > 0.5);
}

#[tokio::test(start_paused = true)]
async fn test_shared_state_reflects_finished_run() {
    let controller = Controller::new(ControlConfig {
        iteration_cap: Some(3),
        min_run_time_ms: 2000,
        ..fast_config()
    });
    let state = controller.shared_state().clone();

    let report = controller.run("count", counting_unit()).await;

    assert_eq!(state.get::<u32>(keys::STEP_COUNT).await.unwrap(), Some(3));
    assert_eq!(
        state.get::<Vec<f64>>(keys::QUALITY_HISTORY).await.unwrap(),
        Some(vec![1.0, 2.0, 3.0])
    );
    assert_eq!(state.get::<String>(keys::GOAL).await.unwrap().as_deref(), Some("count"));
    assert!(!state.producer_running().await.unwrap());
    let stored: metacontrol::DecisionRecord = state.require(keys::DECISION).await.unwrap();
    let decision = report.decision.expect("decision");
    assert_eq!(stored.poll, decision.poll);
    assert_eq!(stored.reason, DecisionReason::ProducerStopped);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_failure_stops_producer() {
    let controller = Controller::new(ControlConfig {
        min_run_time_ms: 60_000,
        iteration_cap: None,
        ..fast_config()
    });
    let state = controller.shared_state().clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(450)).await;
        state
            .set_value(keys::PRODUCER_RUNNING, serde_json::json!("garbage"))
            .await
            .unwrap();
    });

    let report = controller.run("count", counting_unit()).await;

    let monitor_failures: Vec<_> = report.failures_for(Activity::Monitor).collect();
    assert_eq!(monitor_failures.len(), 1);
    assert!(matches!(
        monitor_failures[0],
        ControlError::Serialization { key, .. } if key == keys::PRODUCER_RUNNING
    ));
    assert_eq!(report.failures_for(Activity::Producer).count(), 0);
    assert_eq!(report.producer_exit, Some(ProducerExit::StopRequested));
    assert!(report.steps >= 5 && report.steps <= 7, "steps = {}", report.steps);
    assert_eq!(report.final_artifact, Some(report.steps));
    assert!(report.decision.is_none());
    assert!(report.is_success());
}

/// JSON object keys must be strings, so this artifact cannot be published.
type Grid = HashMap<(u8, u8), u8>;

#[tokio::test(start_paused = true)]
async fn test_unpublishable_artifact_is_reported_without_hiding_exit() {
    let grid_unit = work_unit_fn(|prev: Option<&Grid>| {
        let mut grid = prev.cloned().unwrap_or_default();
        let next = u8::try_from(grid.len() + 1)?;
        grid.insert((next, next), next);
        Ok((grid, f64::from(next)))
    });
    let config = ControlConfig {
        iteration_cap: Some(3),
        min_run_time_ms: 2000,
        ..fast_config()
    };

    let report = Controller::new(config).run("grid", grid_unit).await;

    assert_eq!(report.producer_exit, Some(ProducerExit::IterationCap));
    assert_eq!(report.steps, 3);
    assert_eq!(report.final_artifact.as_ref().map(HashMap::len), Some(3));

    let producer_failures: Vec<_> = report.failures_for(Activity::Producer).collect();
    assert_eq!(producer_failures.len(), 1);
    assert!(matches!(
        producer_failures[0],
        ControlError::Serialization { key, .. } if key == keys::FINAL_ARTIFACT
    ));
    assert!(report.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_work_unit_failure_survives_unpublishable_artifact() {
    let grid_unit = work_unit_fn(|prev: Option<&Grid>| {
        let mut grid = prev.cloned().unwrap_or_default();
        let next = u8::try_from(grid.len() + 1)?;
        if next == 3 {
            anyhow::bail!("grid is full");
        }
        grid.insert((next, next), next);
        Ok((grid, f64::from(next)))
    });
    let controller = Controller::new(ControlConfig {
        min_run_time_ms: 60_000,
        ..fast_config()
    });
    let state = controller.shared_state().clone();

    let report = controller.run("grid", grid_unit).await;

    assert_eq!(report.producer_exit, None);
    let producer_failures: Vec<_> = report.failures_for(Activity::Producer).collect();
    assert_eq!(producer_failures.len(), 2);
    assert!(matches!(
        producer_failures[0],
        ControlError::ProducerFailure { step: 3, message } if message == "grid is full"
    ));
    assert!(matches!(
        producer_failures[1],
        ControlError::Serialization { key, .. } if key == keys::FINAL_ARTIFACT
    ));
    let recorded: String = state.require(keys::PRODUCER_ERROR).await.unwrap();
    assert!(recorded.contains("grid is full"));
}

#[tokio::test(start_paused = true)]
async fn test_final_artifact_is_returned_as_produced() {
    let nan_unit = work_unit_fn(|prev: Option<&(u32, f64)>| {
        let next = prev.map_or(0, |(n, _)| *n) + 1;
        Ok(((next, f64::NAN), f64::from(next)))
    });
    let config = ControlConfig {
        iteration_cap: Some(2),
        min_run_time_ms: 2000,
        ..fast_config()
    };

    let report = Controller::new(config).run("nan", nan_unit).await;

    assert!(report.failures.is_empty(), "{:?}", report.failures);
    let (steps, payload) = report.final_artifact.expect("artifact kept in memory");
    assert_eq!(steps, 2);
    assert!(payload.is_nan());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_flag_never_reverts_for_concurrent_readers() {
    let state = SharedState::for_run();
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move {
                let mut seen_true = false;
                let mut reads_after = 0;
                while reads_after < 200 {
                    let stopped = state.stop_requested().await.unwrap();
                    if seen_true {
                        assert!(stopped, "stop flag reverted");
                        reads_after += 1;
                    }
                    seen_true |= stopped;
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let writer = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        writer.request_stop().await.unwrap();
        writer.request_stop().await.unwrap();
        let revert = writer
            .set_value(keys::STOP_FLAG, serde_json::Value::Bool(false))
            .await;
        assert!(matches!(revert, Err(ControlError::StopFlagReverted)));
    })
    .await
    .unwrap();

    for reader in readers {
        reader.await.unwrap();
    }
    assert!(state.stop_requested().await.unwrap());
}
