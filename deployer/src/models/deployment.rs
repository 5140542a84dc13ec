//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deploy::fsm::PipelineState;
use crate::deploy::task::{DeploymentTask, Step};
use crate::webhook::event::Trigger;

/// How a step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    Skipped { reason: String },
    Failed { error: String },
}

/// A step the pipeline reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,

    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Report of one deployment task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: Uuid,
    pub trigger: Trigger,
    pub origin: String,

    /// Steps in the order they were reached
    pub steps: Vec<StepRecord>,

    /// Final pipeline state: `idle` on success, `failed` otherwise
    pub state: PipelineState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskReport {
    pub fn new(task: &DeploymentTask) -> Self {
        Self {
            id: task.id,
            trigger: task.trigger,
            origin: task.origin.clone(),
            steps: Vec::new(),
            state: PipelineState::Idle,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn finish(&mut self, state: PipelineState, error: Option<String>) {
        self.state = state;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    /// Steps that ran to completion, in order
    pub fn completed_steps(&self) -> Vec<Step> {
        self.steps
            .iter()
            .filter(|record| record.outcome == StepOutcome::Completed)
            .map(|record| record.step)
            .collect()
    }

    pub fn succeeded(&self) -> bool {
        self.state != PipelineState::Failed
    }
}
