//! Deployment tasks

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::webhook::event::Trigger;

/// One step of the deploy pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    SourceSync,
    ArtifactInstall,
    DependencyInstall,
    Build,
    Restart,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::SourceSync => "source_sync",
            Step::ArtifactInstall => "artifact_install",
            Step::DependencyInstall => "dependency_install",
            Step::Build => "build",
            Step::Restart => "restart",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployment requested by one webhook event
#[derive(Debug, Clone)]
pub struct DeploymentTask {
    pub id: Uuid,
    pub trigger: Trigger,

    /// Human readable description of the triggering event
    pub origin: String,
}

impl DeploymentTask {
    pub fn new(trigger: Trigger, origin: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            origin: origin.into(),
        }
    }
}
