//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploy::task::DeploymentTask;
use crate::errors::DeployerError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::deployer;

/// Run the deployer service until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeployerError> {
    info!("Initializing intoxicode deployer...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start deployer: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DeployerError> {
    let (app_state, tasks) = AppState::init(options)?;

    init_deployer_worker(
        app_state.orchestrator.clone(),
        tasks,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    init_server(options, &app_state, shutdown_manager, shutdown_tx.subscribe()).await?;

    Ok(())
}

fn init_deployer_worker(
    orchestrator: Arc<Orchestrator>,
    tasks: UnboundedReceiver<DeploymentTask>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DeployerError> {
    info!("Initializing deployer worker...");

    let deployer_handle = tokio::spawn(async move {
        deployer::run(
            orchestrator,
            tasks,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_deployer_worker_handle(deployer_handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: &AppState,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DeployerError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(
        app_state.verifier.clone(),
        app_state.queue.clone(),
        app_state.orchestrator.clone(),
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    server_handle: Option<JoinHandle<Result<(), DeployerError>>>,
    deployer_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            server_handle: None,
            deployer_worker_handle: None,
        }
    }

    pub fn with_deployer_worker_handle(
        &mut self,
        handle: JoinHandle<()>,
    ) -> Result<(), DeployerError> {
        if self.deployer_worker_handle.is_some() {
            return Err(DeployerError::ShutdownError(
                "deployer_handle already set".to_string(),
            ));
        }
        self.deployer_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DeployerError>>,
    ) -> Result<(), DeployerError> {
        if self.server_handle.is_some() {
            return Err(DeployerError::ShutdownError(
                "server_handle already set".to_string(),
            ));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), DeployerError> {
        let _ = self.shutdown_tx.send(());

        let result = tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await;

        match result {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                self.abort().await;
                Err(DeployerError::ShutdownError(format!(
                    "timed out after {:?}",
                    self.lifecycle_options.max_shutdown_delay
                )))
            }
        }
    }

    /// Abort what is still running. Dropping the deployer worker's task
    /// kills a step subprocess in flight.
    async fn abort(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.deployer_worker_handle.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Deployer worker failed: {}", e);
                }
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), DeployerError> {
        info!("Shutting down intoxicode deployer...");

        // 1. Server; stop accepting webhooks first
        if let Some(handle) = self.server_handle.as_mut() {
            handle
                .await
                .map_err(|e| DeployerError::ShutdownError(e.to_string()))??;
            self.server_handle = None;
        }

        // 2. Deployer worker; a task in flight runs to completion. The handle
        // stays in place so a timed out shutdown can still abort it.
        if let Some(handle) = self.deployer_worker_handle.as_mut() {
            handle
                .await
                .map_err(|e| DeployerError::ShutdownError(e.to_string()))?;
            self.deployer_worker_handle = None;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
