//! Server state

use std::sync::Arc;

use crate::deploy::orchestrator::Orchestrator;
use crate::webhook::signature::SignatureVerifier;
use crate::workers::deployer::DeployQueue;

/// Server state shared across handlers
pub struct ServerState {
    pub verifier: Arc<SignatureVerifier>,
    pub queue: DeployQueue,
    pub orchestrator: Arc<Orchestrator>,
}

impl ServerState {
    pub fn new(
        verifier: Arc<SignatureVerifier>,
        queue: DeployQueue,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            verifier,
            queue,
            orchestrator,
        }
    }
}
