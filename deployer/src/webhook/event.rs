//! Webhook event decoding
//!
//! Payloads are decoded once, at the receiver, into a closed set of variants
//! carrying only what the deploy pipeline needs.

use serde::{Deserialize, Serialize};

use crate::errors::DeployerError;

/// Header naming the event family
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the provider's delivery id
pub const DELIVERY_HEADER: &str = "x-github-delivery";

const WORKFLOW_RUN_EVENT: &str = "workflow_run";
const PUSH_EVENT: &str = "push";
const COMPLETED_ACTION: &str = "completed";

/// A verified, decoded webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A CI workflow run changed state
    WorkflowRun {
        action: String,
        run: WorkflowRunInfo,
    },

    /// Commits were pushed
    Push {
        git_ref: Option<String>,
        head_commit: Option<String>,
    },

    /// Anything else (including `ping`)
    Unrecognized { event_type: String },
}

/// Fields of a workflow run the pipeline logs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunInfo {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub conclusion: Option<String>,

    #[serde(default)]
    pub head_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunPayload {
    action: String,
    #[serde(default)]
    workflow_run: WorkflowRunInfo,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(default, rename = "ref")]
    git_ref: Option<String>,
    #[serde(default)]
    after: Option<String>,
}

/// What a deployment task has to do for a given event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// CI finished: sync sources, install the new artifact, rebuild, restart
    CiRunCompleted,

    /// Source push: sync sources, rebuild, restart
    SourcePush,
}

impl Trigger {
    /// Whether the pipeline includes the artifact install step
    pub fn installs_artifact(&self) -> bool {
        matches!(self, Trigger::CiRunCompleted)
    }
}

impl WebhookEvent {
    /// Decode a raw payload given the value of the event header.
    ///
    /// Unknown event families decode to [`WebhookEvent::Unrecognized`]
    /// without looking at the body. A known family with a body that does
    /// not match its shape is an error.
    pub fn decode(event_type: Option<&str>, body: &[u8]) -> Result<Self, DeployerError> {
        match event_type {
            Some(WORKFLOW_RUN_EVENT) => {
                let payload: WorkflowRunPayload = serde_json::from_slice(body)?;
                Ok(WebhookEvent::WorkflowRun {
                    action: payload.action,
                    run: payload.workflow_run,
                })
            }
            Some(PUSH_EVENT) => {
                let payload: PushPayload = serde_json::from_slice(body)?;
                Ok(WebhookEvent::Push {
                    git_ref: payload.git_ref,
                    head_commit: payload.after,
                })
            }
            other => Ok(WebhookEvent::Unrecognized {
                event_type: other.unwrap_or_default().to_string(),
            }),
        }
    }

    /// The deployment this event asks for, if any
    pub fn trigger(&self) -> Option<Trigger> {
        match self {
            WebhookEvent::WorkflowRun { action, .. } if action == COMPLETED_ACTION => {
                Some(Trigger::CiRunCompleted)
            }
            WebhookEvent::WorkflowRun { .. } => None,
            WebhookEvent::Push { .. } => Some(Trigger::SourcePush),
            WebhookEvent::Unrecognized { .. } => None,
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            WebhookEvent::WorkflowRun { action, run } => format!(
                "workflow_run {} (workflow: {}, branch: {}, conclusion: {})",
                action,
                run.name.as_deref().unwrap_or("?"),
                run.head_branch.as_deref().unwrap_or("?"),
                run.conclusion.as_deref().unwrap_or("none"),
            ),
            WebhookEvent::Push { git_ref, head_commit } => format!(
                "push to {} ({})",
                git_ref.as_deref().unwrap_or("?"),
                head_commit.as_deref().unwrap_or("?"),
            ),
            WebhookEvent::Unrecognized { event_type } => {
                format!("unrecognized event '{}'", event_type)
            }
        }
    }
}
