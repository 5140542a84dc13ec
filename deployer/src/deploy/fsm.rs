//! Finite state machine for a single deployment task

use serde::{Deserialize, Serialize};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No task running
    Idle,

    /// Pulling the latest sources into the work tree
    SourceSync,

    /// Fetching and installing the release artifact
    ArtifactInstall,

    /// Installing application dependencies
    DependencyInstall,

    /// Building the application
    Build,

    /// Handing the restart to the process supervisor
    Restart,

    /// A step failed; the task was abandoned
    Failed,
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Start a task
    Begin,

    /// Sources synced; the flag says whether an artifact step follows
    SourceSynced { install_artifact: bool },

    /// Artifact installed or skipped
    ArtifactHandled,

    /// Dependencies installed
    DependenciesInstalled,

    /// Build finished
    Built,

    /// Restart handed to the supervisor
    RestartIssued,

    /// The current step failed
    StepFailed(String),
}

/// Deployment pipeline FSM
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: PipelineState,
    error: Option<String>,
}

impl PipelineFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PipelineEvent) -> Result<PipelineState, String> {
        let new_state = match (&self.state, &event) {
            (PipelineState::Idle, PipelineEvent::Begin) => {
                self.error = None;
                PipelineState::SourceSync
            }

            (PipelineState::SourceSync, PipelineEvent::SourceSynced { install_artifact }) => {
                if *install_artifact {
                    PipelineState::ArtifactInstall
                } else {
                    PipelineState::DependencyInstall
                }
            }

            (PipelineState::ArtifactInstall, PipelineEvent::ArtifactHandled) => {
                PipelineState::DependencyInstall
            }

            (PipelineState::DependencyInstall, PipelineEvent::DependenciesInstalled) => {
                PipelineState::Build
            }

            (PipelineState::Build, PipelineEvent::Built) => PipelineState::Restart,

            (PipelineState::Restart, PipelineEvent::RestartIssued) => PipelineState::Idle,

            // Any running step can fail
            (
                PipelineState::SourceSync
                | PipelineState::ArtifactInstall
                | PipelineState::DependencyInstall
                | PipelineState::Build
                | PipelineState::Restart,
                PipelineEvent::StepFailed(err),
            ) => {
                self.error = Some(err.clone());
                PipelineState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
