//! Application state management

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::command::ShellRunner;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::task::DeploymentTask;
use crate::errors::DeployerError;
use crate::release::fetcher::ReleaseFetcher;
use crate::webhook::signature::SignatureVerifier;
use crate::workers::deployer::DeployQueue;

/// Main application state
pub struct AppState {
    /// Webhook signature verifier
    pub verifier: Arc<SignatureVerifier>,

    /// Deployment queue
    pub queue: DeployQueue,

    /// Deploy pipeline
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Initialize application state.
    ///
    /// Returns the receiving end of the deploy queue for the deployer worker.
    pub fn init(
        options: &AppOptions,
    ) -> Result<(Self, UnboundedReceiver<DeploymentTask>), DeployerError> {
        info!("Initializing application state...");
        info!(
            "Artifact target {} installs to {}",
            options.pipeline.target,
            options.pipeline.artifact_path().display()
        );

        let fetcher = ReleaseFetcher::new(&options.release)?;
        info!("Release manifest: {}", fetcher.latest_release_url());

        let orchestrator = Arc::new(Orchestrator::new(
            options.pipeline.clone(),
            Arc::new(ShellRunner),
            Arc::new(fetcher),
        ));

        let (queue, tasks) = DeployQueue::new();

        let state = Self {
            verifier: Arc::new(SignatureVerifier::new(options.secret.clone())),
            queue,
            orchestrator,
        };

        Ok((state, tasks))
    }
}
