//! Implementation of the `metacontrol run` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{error, warn};

use crate::adapters::{Plan, PlanStepProducer};
use crate::application::Controller;
use crate::cli::output::{output, truncate, CommandOutput, TableFormatter};
use crate::domain::models::{
    Config, ControlConfig, DecisionRecord, ProducerExit, ProjectionPolicy, RunReport,
    UtilitySample,
};
use crate::infrastructure::config::ConfigLoader;

const DEFAULT_GOAL: &str = "finish the project";

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Goal the plan steps work towards
    #[arg(default_value = DEFAULT_GOAL)]
    pub goal: String,

    /// Interval between monitor polls in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Delay after each producer step in milliseconds
    #[arg(long)]
    pub step_interval_ms: Option<u64>,

    /// Minimum run time before a trend decision, in milliseconds
    #[arg(long)]
    pub min_run_time_ms: Option<u64>,

    /// Decay-rate constant of the exponential time cost
    #[arg(long)]
    pub decay_rate: Option<f64>,

    /// Hard ceiling on producer iterations
    #[arg(long)]
    pub iteration_cap: Option<u32>,

    /// Quality projection policy (regression, constant)
    #[arg(long)]
    pub projection: Option<ProjectionPolicy>,

    /// Quality gain assumed by the constant projection
    #[arg(long)]
    pub increment: Option<f64>,

    /// Required drop of projected utility below current utility
    #[arg(long)]
    pub stop_margin: Option<f64>,

    /// Consecutive non-improving polls required before stopping
    #[arg(long)]
    pub confirm_polls: Option<u32>,
}

impl RunArgs {
    /// Overlay command-line options on the loaded configuration.
    pub fn apply(&self, control: &mut ControlConfig) {
        if let Some(ms) = self.poll_interval_ms {
            control.poll_interval_ms = ms;
        }
        if let Some(ms) = self.step_interval_ms {
            control.step_interval_ms = ms;
        }
        if let Some(ms) = self.min_run_time_ms {
            control.min_run_time_ms = ms;
        }
        if let Some(k) = self.decay_rate {
            control.decay_rate = k;
        }
        if let Some(cap) = self.iteration_cap {
            control.iteration_cap = Some(cap);
        }
        if let Some(policy) = self.projection {
            control.projection.policy = policy;
        }
        if let Some(increment) = self.increment {
            control.projection.increment = increment;
        }
        if let Some(margin) = self.stop_margin {
            control.stop_margin = margin;
        }
        if let Some(polls) = self.confirm_polls {
            control.confirm_polls = polls;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub goal: String,
    pub steps: u32,
    pub producer_exit: Option<ProducerExit>,
    pub decision: Option<DecisionRecord>,
    pub plan: Vec<String>,
    pub trace: Vec<UtilitySample>,
    pub failures: Vec<String>,
}

impl From<&RunReport<Plan>> for RunOutput {
    fn from(report: &RunReport<Plan>) -> Self {
        Self {
            run_id: report.run_id.to_string(),
            goal: report.goal.clone(),
            steps: report.steps,
            producer_exit: report.producer_exit,
            decision: report.decision.clone(),
            plan: report
                .final_artifact
                .as_ref()
                .map(|plan| plan.steps.clone())
                .unwrap_or_default(),
            trace: report.trace.clone(),
            failures: report
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.activity.as_str(), f.error))
                .collect(),
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Run {} towards \"{}\"", &self.run_id[..8], self.goal)];

        let decided_poll = self.decision.as_ref().map(|d| d.poll);
        if !self.trace.is_empty() {
            lines.push(TableFormatter::new().format_trace(&self.trace, decided_poll));
        }

        match &self.decision {
            Some(decision) => lines.push(format!(
                "Stopped at {:.2}s ({}): quality {:.2}, utility {:.4}",
                decision.elapsed_time,
                decision.reason.as_str(),
                decision.quality,
                decision.utility
            )),
            None => lines.push("No decision was reached.".to_string()),
        }

        lines.push(format!("\nPlan ({} step(s)):", self.plan.len()));
        for step in &self.plan {
            lines.push(format!("  - {}", truncate(step, 72)));
        }

        if !self.failures.is_empty() {
            lines.push("\nFailures:".to_string());
            for failure in &self.failures {
                lines.push(format!("  ✗ {failure}"));
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply(&mut config.control);
    ConfigLoader::validate(&config).context("Invalid run options")?;

    let controller = Controller::new(config.control);
    let stop = controller.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; requesting stop");
            if let Err(err) = stop.request_stop().await {
                error!(error = %err, "could not request stop");
            }
        }
    });

    let report = controller
        .run(&args.goal, PlanStepProducer::new(args.goal.as_str()))
        .await;
    interrupt.abort();

    output(&RunOutput::from(&report), json_mode);
    report.into_result()?;
    Ok(())
}
