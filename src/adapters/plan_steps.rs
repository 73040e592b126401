//! Reference producer: an anytime planner that appends one plan step per
//! work unit. Quality is the number of steps, so each step adds exactly 1.0.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ports::WorkUnit;

/// Plan built incrementally towards a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<String>,
}

impl Plan {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            steps: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PlanStepProducer {
    goal: String,
}

impl PlanStepProducer {
    pub fn new(goal: impl Into<String>) -> Self {
        Self { goal: goal.into() }
    }
}

#[async_trait]
impl WorkUnit for PlanStepProducer {
    type Artifact = Plan;

    async fn step(&self, previous: Option<&Plan>) -> Result<(Plan, f64)> {
        let mut plan = previous.cloned().unwrap_or_else(|| Plan::new(&self.goal));
        plan.steps
            .push(format!("Step {} towards {}", plan.steps.len() + 1, self.goal));
        #[allow(clippy::cast_precision_loss)]
        let quality = plan.len() as f64;
        Ok((plan, quality))
    }
}
