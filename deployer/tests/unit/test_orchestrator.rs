//! Deploy pipeline tests

use std::sync::Arc;
use std::time::Duration;

use deployer::deploy::fsm::PipelineState;
use deployer::deploy::task::{DeploymentTask, Step};
use deployer::models::deployment::StepOutcome;
use deployer::webhook::event::Trigger;

use crate::common::{orchestrator, pipeline_options, HangingSource, RecordingRunner, StubSource};

const NEW_BINARY: &[u8] = b"\x7fELF new build";
const OLD_BINARY: &[u8] = b"\x7fELF previous build";

#[tokio::test]
async fn test_ci_run_installs_artifact_between_sync_and_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    let options = pipeline_options(dir.path());
    let artifact_path = options.artifact_path();
    std::fs::write(&artifact_path, OLD_BINARY).unwrap();

    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(options, runner.clone(), StubSource::Found(NEW_BINARY.to_vec()));

    let report = orch
        .run(DeploymentTask::new(Trigger::CiRunCompleted, "workflow_run completed"))
        .await;

    assert!(report.succeeded());
    assert_eq!(report.state, PipelineState::Idle);
    // The old binary was replaced in place; no temporary file is left behind
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(
        report.completed_steps(),
        vec![
            Step::SourceSync,
            Step::ArtifactInstall,
            Step::DependencyInstall,
            Step::Build,
            Step::Restart,
        ]
    );
    assert_eq!(
        runner.started(),
        vec![Step::SourceSync, Step::DependencyInstall, Step::Build, Step::Restart]
    );
    assert_eq!(std::fs::read(&artifact_path).unwrap(), NEW_BINARY);
    assert!(artifact_path.ends_with("intoxicode-linux-x86_64"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&artifact_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}

#[tokio::test]
async fn test_push_skips_artifact_install() {
    let dir = tempfile::tempdir().unwrap();
    let options = pipeline_options(dir.path());
    let artifact_path = options.artifact_path();
    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(options, runner.clone(), StubSource::Found(NEW_BINARY.to_vec()));

    let report = orch
        .run(DeploymentTask::new(Trigger::SourcePush, "push to refs/heads/main"))
        .await;

    assert!(report.succeeded());
    assert_eq!(
        report.completed_steps(),
        vec![Step::SourceSync, Step::DependencyInstall, Step::Build, Step::Restart]
    );
    assert!(report
        .steps
        .iter()
        .all(|record| record.step != Step::ArtifactInstall));
    assert!(!artifact_path.exists());
}

#[tokio::test]
async fn test_failing_build_prevents_restart_and_keeps_binary() {
    let dir = tempfile::tempdir().unwrap();
    let options = pipeline_options(dir.path());
    let artifact_path = options.artifact_path();
    std::fs::write(&artifact_path, OLD_BINARY).unwrap();

    let runner = Arc::new(RecordingRunner::failing_on(Step::Build));
    let orch = orchestrator(options, runner.clone(), StubSource::Found(NEW_BINARY.to_vec()));

    let report = orch
        .run(DeploymentTask::new(Trigger::SourcePush, "push to refs/heads/main"))
        .await;

    assert!(!report.succeeded());
    assert_eq!(report.state, PipelineState::Failed);
    assert!(report.error.as_deref().unwrap().contains("build"));
    assert_eq!(
        runner.started(),
        vec![Step::SourceSync, Step::DependencyInstall, Step::Build]
    );
    assert!(matches!(
        report.steps.last().unwrap().outcome,
        StepOutcome::Failed { .. }
    ));
    assert_eq!(std::fs::read(&artifact_path).unwrap(), OLD_BINARY);
    assert_eq!(orch.state().await, PipelineState::Idle);
}

#[tokio::test]
async fn test_failing_source_sync_runs_nothing_else() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::failing_on(Step::SourceSync));
    let orch = orchestrator(
        pipeline_options(dir.path()),
        runner.clone(),
        StubSource::Found(NEW_BINARY.to_vec()),
    );

    let report = orch
        .run(DeploymentTask::new(Trigger::CiRunCompleted, "workflow_run completed"))
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(runner.started(), vec![Step::SourceSync]);
    assert_eq!(report.steps.len(), 1);
}

#[tokio::test]
async fn test_missing_asset_skips_install_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let options = pipeline_options(dir.path());
    let artifact_path = options.artifact_path();
    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(options, runner.clone(), StubSource::NotFound);

    let report = orch
        .run(DeploymentTask::new(Trigger::CiRunCompleted, "workflow_run completed"))
        .await;

    assert!(report.succeeded());
    match &report.steps[1].outcome {
        StepOutcome::Skipped { reason } => assert!(reason.contains("intoxicode-linux-x86_64")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        runner.started(),
        vec![Step::SourceSync, Step::DependencyInstall, Step::Build, Step::Restart]
    );
    assert!(!artifact_path.exists());
}

#[tokio::test]
async fn test_unreachable_release_api_skips_install_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(pipeline_options(dir.path()), runner.clone(), StubSource::Unreachable);

    let report = orch
        .run(DeploymentTask::new(Trigger::CiRunCompleted, "workflow_run completed"))
        .await;

    assert!(report.succeeded());
    assert!(matches!(
        report.steps[1].outcome,
        StepOutcome::Skipped { .. }
    ));
    assert_eq!(runner.started().len(), 4);
}

#[tokio::test]
async fn test_install_failure_fails_task() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = pipeline_options(dir.path());
    // A regular file where the artifact directory should be
    let blocker = dir.path().join("releases");
    std::fs::write(&blocker, b"not a directory").unwrap();
    options.artifact_dir = blocker;

    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(options, runner.clone(), StubSource::Found(NEW_BINARY.to_vec()));

    let report = orch
        .run(DeploymentTask::new(Trigger::CiRunCompleted, "workflow_run completed"))
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(runner.started(), vec![Step::SourceSync]);
    let last = report.steps.last().unwrap();
    assert_eq!(last.step, Step::ArtifactInstall);
    assert!(matches!(last.outcome, StepOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_empty_command_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = pipeline_options(dir.path());
    options.commands.dependency_install = String::new();

    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(options, runner.clone(), StubSource::NotFound);

    let report = orch
        .run(DeploymentTask::new(Trigger::SourcePush, "push"))
        .await;

    assert!(report.succeeded());
    assert_eq!(
        runner.started(),
        vec![Step::SourceSync, Step::Build, Step::Restart]
    );
    assert_eq!(
        report.steps[1].outcome,
        StepOutcome::Skipped {
            reason: "no command configured".to_string()
        }
    );
}

#[tokio::test]
async fn test_last_report_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(pipeline_options(dir.path()), runner, StubSource::NotFound);
    assert!(orch.last_report().await.is_none());

    let task = DeploymentTask::new(Trigger::SourcePush, "push");
    let id = task.id;
    orch.run(task).await;

    let report = orch.last_report().await.unwrap();
    assert_eq!(report.id, id);
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_fetch_timeout_fails_task() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = pipeline_options(dir.path());
    options.fetch_timeout = Duration::from_millis(50);
    let artifact_path = options.artifact_path();
    std::fs::write(&artifact_path, OLD_BINARY).unwrap();

    let runner = Arc::new(RecordingRunner::default());
    let orch = orchestrator(options, runner.clone(), HangingSource);

    let report = orch
        .run(DeploymentTask::new(Trigger::CiRunCompleted, "workflow_run completed"))
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert!(report.error.as_deref().unwrap().contains("Timed out"));
    assert_eq!(runner.started(), vec![Step::SourceSync]);

    let last = report.steps.last().unwrap();
    assert_eq!(last.step, Step::ArtifactInstall);
    assert!(matches!(last.outcome, StepOutcome::Failed { .. }));
    assert_eq!(std::fs::read(&artifact_path).unwrap(), OLD_BINARY);
}
