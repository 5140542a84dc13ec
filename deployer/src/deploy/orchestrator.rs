//! Deployment orchestrator
//!
//! Runs one [`DeploymentTask`] at a time through the pipeline
//! `SourceSync -> [ArtifactInstall] -> DependencyInstall -> Build -> Restart`.
//! Every step is awaited and checked before the next one starts. The first
//! failing step abandons the task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::deploy::command::{CommandRunner, ShellCommand};
use crate::deploy::fsm::{PipelineEvent, PipelineFsm, PipelineState};
use crate::deploy::task::{DeploymentTask, Step};
use crate::errors::DeployerError;
use crate::installer::install::install;
use crate::models::deployment::{StepOutcome, TaskReport};
use crate::models::release::AssetLookup;
use crate::release::fetcher::ArtifactSource;
use crate::release::target::TargetName;

/// Shell commands for the pipeline steps
#[derive(Debug, Clone)]
pub struct PipelineCommands {
    pub source_sync: String,
    pub dependency_install: String,
    pub build: String,
    pub restart: String,
}

impl Default for PipelineCommands {
    fn default() -> Self {
        Self {
            source_sync: "git pull".to_string(),
            dependency_install: "bun install".to_string(),
            build: "bun run build".to_string(),
            restart: "pm2 restart intoxicode".to_string(),
        }
    }
}

/// Pipeline options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Source tree the commands run in
    pub work_dir: PathBuf,

    /// Directory holding the installed artifact
    pub artifact_dir: PathBuf,

    /// Artifact name for this host
    pub target: TargetName,

    pub commands: PipelineCommands,

    /// Timeout for each shell step
    pub step_timeout: Duration,

    /// Timeout for the artifact lookup and download together
    pub fetch_timeout: Duration,
}

impl PipelineOptions {
    /// Where the artifact for this host is installed
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(self.target.as_str())
    }

    fn shell_command(&self, line: &str) -> ShellCommand {
        ShellCommand {
            line: line.to_string(),
            work_dir: self.work_dir.clone(),
            timeout: self.step_timeout,
        }
    }
}

/// Deployment orchestrator
pub struct Orchestrator {
    options: PipelineOptions,
    runner: Arc<dyn CommandRunner>,
    artifacts: Arc<dyn ArtifactSource>,

    /// Held for the whole run of a task
    run_lock: Mutex<()>,
    state: RwLock<PipelineState>,
    last_report: RwLock<Option<TaskReport>>,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(
        options: PipelineOptions,
        runner: Arc<dyn CommandRunner>,
        artifacts: Arc<dyn ArtifactSource>,
    ) -> Self {
        Self {
            options,
            runner,
            artifacts,
            run_lock: Mutex::new(()),
            state: RwLock::new(PipelineState::Idle),
            last_report: RwLock::new(None),
        }
    }

    /// Current pipeline state
    pub async fn state(&self) -> PipelineState {
        *self.state.read().await
    }

    /// Report of the most recently finished task
    pub async fn last_report(&self) -> Option<TaskReport> {
        self.last_report.read().await.clone()
    }

    /// Run a task to completion or first failure.
    ///
    /// Concurrent callers wait for the running task to finish. Failures are
    /// reported, never returned: nothing here may take the service down.
    pub async fn run(&self, task: DeploymentTask) -> TaskReport {
        let _guard = self.run_lock.lock().await;

        info!("Starting deployment {} ({})", task.id, task.origin);

        let mut fsm = PipelineFsm::new();
        let mut report = TaskReport::new(&task);

        match self.run_steps(&task, &mut fsm, &mut report).await {
            Ok(()) => {
                info!("Deployment {} completed", task.id);
                report.finish(fsm.state(), None);
            }
            Err(e) => {
                error!("Deployment {} failed: {}", task.id, e);
                if let Err(err) = fsm.process(PipelineEvent::StepFailed(e.to_string())) {
                    error!("{}", err);
                }
                report.finish(PipelineState::Failed, Some(e.to_string()));
            }
        }

        *self.state.write().await = PipelineState::Idle;
        *self.last_report.write().await = Some(report.clone());
        report
    }

    async fn run_steps(
        &self,
        task: &DeploymentTask,
        fsm: &mut PipelineFsm,
        report: &mut TaskReport,
    ) -> Result<(), DeployerError> {
        let commands = &self.options.commands;

        self.transition(fsm, PipelineEvent::Begin).await?;
        self.run_command(Step::SourceSync, &commands.source_sync, report)
            .await?;

        let install_artifact = task.trigger.installs_artifact();
        self.transition(fsm, PipelineEvent::SourceSynced { install_artifact })
            .await?;

        if install_artifact {
            self.install_artifact(report).await?;
            self.transition(fsm, PipelineEvent::ArtifactHandled).await?;
        }

        self.run_command(Step::DependencyInstall, &commands.dependency_install, report)
            .await?;
        self.transition(fsm, PipelineEvent::DependenciesInstalled)
            .await?;

        self.run_command(Step::Build, &commands.build, report).await?;
        self.transition(fsm, PipelineEvent::Built).await?;

        // The supervisor owns the service from here on; its health after the
        // restart is not observed.
        self.run_command(Step::Restart, &commands.restart, report)
            .await?;
        self.transition(fsm, PipelineEvent::RestartIssued).await?;

        Ok(())
    }

    async fn transition(
        &self,
        fsm: &mut PipelineFsm,
        event: PipelineEvent,
    ) -> Result<(), DeployerError> {
        let state = fsm.process(event).map_err(DeployerError::DeployError)?;
        *self.state.write().await = state;
        Ok(())
    }

    async fn run_command(
        &self,
        step: Step,
        line: &str,
        report: &mut TaskReport,
    ) -> Result<(), DeployerError> {
        if line.trim().is_empty() {
            info!("No command configured for {} step, skipping", step);
            report.record(
                step,
                StepOutcome::Skipped {
                    reason: "no command configured".to_string(),
                },
            );
            return Ok(());
        }

        let command = self.options.shell_command(line);
        match self.runner.run(step, &command).await {
            Ok(()) => {
                report.record(step, StepOutcome::Completed);
                Ok(())
            }
            Err(e) => {
                report.record(
                    step,
                    StepOutcome::Failed {
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Fetch and install the artifact for this host.
    ///
    /// A missing asset or an unreachable release API skips the step. A fetch
    /// that times out or a failed install fails the task.
    async fn install_artifact(&self, report: &mut TaskReport) -> Result<(), DeployerError> {
        let target = &self.options.target;

        let fetched = tokio::time::timeout(self.options.fetch_timeout, self.fetch(target)).await;
        let bytes = match fetched {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                report.record(
                    Step::ArtifactInstall,
                    StepOutcome::Skipped {
                        reason: DeployerError::AssetNotFound(target.to_string()).to_string(),
                    },
                );
                return Ok(());
            }
            Ok(Err(e)) if e.is_fetch_failure() => {
                warn!("Skipping artifact install: {}", e);
                report.record(
                    Step::ArtifactInstall,
                    StepOutcome::Skipped {
                        reason: e.to_string(),
                    },
                );
                return Ok(());
            }
            Ok(Err(e)) => {
                report.record(
                    Step::ArtifactInstall,
                    StepOutcome::Failed {
                        error: e.to_string(),
                    },
                );
                return Err(e);
            }
            Err(_) => {
                let e = DeployerError::Timeout(format!(
                    "artifact fetch exceeded {:?}",
                    self.options.fetch_timeout
                ));
                report.record(
                    Step::ArtifactInstall,
                    StepOutcome::Failed {
                        error: e.to_string(),
                    },
                );
                return Err(e);
            }
        };

        let destination = self.options.artifact_path();
        match install(&bytes, &destination).await {
            Ok(()) => {
                report.record(Step::ArtifactInstall, StepOutcome::Completed);
                Ok(())
            }
            Err(e) => {
                report.record(
                    Step::ArtifactInstall,
                    StepOutcome::Failed {
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Look up and download the asset; `None` when the release has no asset
    /// for `target`
    async fn fetch(&self, target: &TargetName) -> Result<Option<Vec<u8>>, DeployerError> {
        match self.artifacts.fetch_matching_asset(target).await? {
            AssetLookup::Found { tag, download_url } => {
                info!("Downloading {} from release {}", target, tag);
                let bytes = self.artifacts.download(&download_url).await?;
                Ok(Some(bytes))
            }
            AssetLookup::NotFound { tag } => {
                info!("Release {} has no asset named {}", tag, target);
                Ok(None)
            }
        }
    }
}
