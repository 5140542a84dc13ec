//! Deploy queue tests

use std::sync::Arc;
use std::time::Duration;

use deployer::deploy::task::{DeploymentTask, Step};
use deployer::webhook::event::Trigger;
use deployer::workers::deployer::{run, DeployQueue};

use crate::common::{orchestrator, pipeline_options, Record, RecordingRunner, StubSource};

fn assert_not_interleaved(records: &[Record]) {
    for pair in records.chunks(2) {
        match pair {
            [Record::Started(a), Record::Finished(b)] => assert_eq!(a, b),
            other => panic!("interleaved steps: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_queued_tasks_run_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::with_delay(Duration::from_millis(20)));
    let orch = Arc::new(orchestrator(
        pipeline_options(dir.path()),
        runner.clone(),
        StubSource::NotFound,
    ));

    let (queue, tasks) = DeployQueue::new();
    tokio_test::assert_ok!(queue.submit(DeploymentTask::new(Trigger::SourcePush, "push 1")));
    tokio_test::assert_ok!(queue.submit(DeploymentTask::new(Trigger::SourcePush, "push 2")));
    // Closing the queue lets the worker exit once it is drained
    drop(queue);

    run(orch.clone(), tasks, Box::pin(std::future::pending::<()>())).await;

    let records = runner.records.lock().unwrap().clone();
    assert_eq!(records.len(), 16);
    assert_not_interleaved(&records);

    let pipeline = [Step::SourceSync, Step::DependencyInstall, Step::Build, Step::Restart];
    let expected: Vec<Step> = pipeline.iter().chain(pipeline.iter()).copied().collect();
    assert_eq!(runner.started(), expected);

    assert_eq!(orch.last_report().await.unwrap().origin, "push 2");
}

#[tokio::test]
async fn test_concurrent_runs_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::with_delay(Duration::from_millis(10)));
    let orch = orchestrator(
        pipeline_options(dir.path()),
        runner.clone(),
        StubSource::NotFound,
    );

    let (first, second) = tokio::join!(
        orch.run(DeploymentTask::new(Trigger::CiRunCompleted, "workflow_run completed")),
        orch.run(DeploymentTask::new(Trigger::SourcePush, "push")),
    );
    assert!(first.succeeded());
    assert!(second.succeeded());

    let records = runner.records.lock().unwrap().clone();
    assert_eq!(records.len(), 16);
    assert_not_interleaved(&records);

    // Each task's steps form one contiguous, ordered block
    let started = runner.started();
    let pipeline = vec![Step::SourceSync, Step::DependencyInstall, Step::Build, Step::Restart];
    assert_eq!(started[..4], pipeline[..]);
    assert_eq!(started[4..], pipeline[..]);
}

#[tokio::test]
async fn test_submit_after_worker_is_gone_fails() {
    let (queue, tasks) = DeployQueue::new();
    drop(tasks);

    tokio_test::assert_err!(queue.submit(DeploymentTask::new(Trigger::SourcePush, "push")));
}

#[tokio::test]
async fn test_shutdown_discards_queued_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let orch = Arc::new(orchestrator(
        pipeline_options(dir.path()),
        runner.clone(),
        StubSource::NotFound,
    ));

    let (queue, tasks) = DeployQueue::new();
    tokio_test::assert_ok!(queue.submit(DeploymentTask::new(Trigger::SourcePush, "push 1")));
    tokio_test::assert_ok!(queue.submit(DeploymentTask::new(Trigger::SourcePush, "push 2")));

    // Shutdown already signalled: the worker runs nothing and closes the queue
    run(orch.clone(), tasks, Box::pin(async {})).await;

    assert!(runner.started().is_empty());
    assert!(orch.last_report().await.is_none());
    tokio_test::assert_err!(queue.submit(DeploymentTask::new(Trigger::SourcePush, "push 3")));
}
