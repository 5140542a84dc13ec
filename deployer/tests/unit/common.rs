//! Test doubles for the deploy pipeline

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use deployer::deploy::command::{CommandRunner, ShellCommand};
use deployer::deploy::orchestrator::{Orchestrator, PipelineCommands, PipelineOptions};
use deployer::deploy::task::Step;
use deployer::errors::DeployerError;
use deployer::models::release::AssetLookup;
use deployer::release::fetcher::ArtifactSource;
use deployer::release::target::TargetName;

/// What the recording runner saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Started(Step),
    Finished(Step),
}

/// Records steps instead of running them
#[derive(Default)]
pub struct RecordingRunner {
    pub records: Arc<Mutex<Vec<Record>>>,
    pub fail_on: Option<Step>,
    pub delay: Duration,
}

impl RecordingRunner {
    pub fn failing_on(step: Step) -> Self {
        Self {
            fail_on: Some(step),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Steps that were started, in order
    pub fn started(&self) -> Vec<Step> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|record| match record {
                Record::Started(step) => Some(*step),
                Record::Finished(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, step: Step, _command: &ShellCommand) -> Result<(), DeployerError> {
        self.records.lock().unwrap().push(Record::Started(step));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.records.lock().unwrap().push(Record::Finished(step));

        if self.fail_on == Some(step) {
            return Err(DeployerError::SubprocessError(format!(
                "{} step exited with exit status: 1",
                step
            )));
        }
        Ok(())
    }
}

/// Canned release lookups
pub enum StubSource {
    Found(Vec<u8>),
    NotFound,
    Unreachable,
}

#[async_trait]
impl ArtifactSource for StubSource {
    async fn fetch_matching_asset(&self, target: &TargetName) -> Result<AssetLookup, DeployerError> {
        match self {
            StubSource::Found(_) => Ok(AssetLookup::Found {
                tag: "v1.2.0".to_string(),
                download_url: format!("https://example.invalid/{}", target),
            }),
            StubSource::NotFound => Ok(AssetLookup::NotFound {
                tag: "v1.2.0".to_string(),
            }),
            StubSource::Unreachable => Err(DeployerError::FetchError(
                "connection refused".to_string(),
            )),
        }
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, DeployerError> {
        match self {
            StubSource::Found(bytes) => Ok(bytes.clone()),
            _ => Err(DeployerError::FetchError("no asset".to_string())),
        }
    }
}

/// Release API that never answers
pub struct HangingSource;

#[async_trait]
impl ArtifactSource for HangingSource {
    async fn fetch_matching_asset(&self, _target: &TargetName) -> Result<AssetLookup, DeployerError> {
        std::future::pending::<()>().await;
        Err(DeployerError::Internal("unreachable".to_string()))
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, DeployerError> {
        std::future::pending::<()>().await;
        Err(DeployerError::Internal("unreachable".to_string()))
    }
}

pub fn pipeline_options(artifact_dir: &Path) -> PipelineOptions {
    PipelineOptions {
        work_dir: artifact_dir.to_path_buf(),
        artifact_dir: artifact_dir.to_path_buf(),
        target: TargetName::resolve("linux").unwrap(),
        commands: PipelineCommands::default(),
        step_timeout: Duration::from_secs(5),
        fetch_timeout: Duration::from_secs(5),
    }
}

pub fn orchestrator(
    options: PipelineOptions,
    runner: Arc<RecordingRunner>,
    source: impl ArtifactSource + 'static,
) -> Orchestrator {
    Orchestrator::new(options, runner, Arc::new(source))
}
