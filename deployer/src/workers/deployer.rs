//! Deployment worker
//!
//! Drains the deploy queue one task at a time. Tasks submitted while another
//! is running wait in the queue. Tasks still queued at shutdown are logged
//! and discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::task::DeploymentTask;
use crate::errors::DeployerError;

/// Handle for submitting deployment tasks
#[derive(Debug, Clone)]
pub struct DeployQueue {
    tx: UnboundedSender<DeploymentTask>,
}

impl DeployQueue {
    /// Create a queue and the receiver the worker drains
    pub fn new() -> (Self, UnboundedReceiver<DeploymentTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a task; returns as soon as the task is queued
    pub fn submit(&self, task: DeploymentTask) -> Result<(), DeployerError> {
        debug!("Queueing deployment {}", task.id);
        self.tx
            .send(task)
            .map_err(|e| DeployerError::DeployError(format!("Deploy queue closed: {}", e)))
    }
}

/// Run the deployer worker
pub async fn run(
    orchestrator: Arc<Orchestrator>,
    mut tasks: UnboundedReceiver<DeploymentTask>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Deployer worker starting...");

    loop {
        let task = tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                discard_queued(&mut tasks);
                return;
            }
            task = tasks.recv() => task,
        };

        let Some(task) = task else {
            info!("Deploy queue closed, deployer worker exiting");
            return;
        };

        // A running task is never interrupted by the shutdown signal
        let report = orchestrator.run(task).await;
        if !report.succeeded() {
            error!(
                "Deployment {} ended in {:?}: {}",
                report.id,
                report.state,
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

/// Close the queue and log every task that will not run
fn discard_queued(tasks: &mut UnboundedReceiver<DeploymentTask>) {
    tasks.close();

    let mut discarded = 0;
    while let Ok(task) = tasks.try_recv() {
        warn!("Discarding queued deployment {} ({})", task.id, task.origin);
        discarded += 1;
    }
    if discarded > 0 {
        warn!("Discarded {} queued deployment(s) on shutdown", discarded);
    }
}
