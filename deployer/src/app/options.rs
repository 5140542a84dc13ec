//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::orchestrator::{PipelineCommands, PipelineOptions};
use crate::errors::DeployerError;
use crate::release::fetcher::ReleaseOptions;
use crate::release::target::{HostOs, TargetName};
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Release API options
    pub release: ReleaseOptions,

    /// Deploy pipeline options
    pub pipeline: PipelineOptions,

    /// Webhook secret
    pub secret: SecretString,
}

impl AppOptions {
    /// Build the runtime options from the settings file and the secret.
    ///
    /// Fails when the configured target OS has no release artifact.
    pub fn from_settings(settings: &Settings, secret: SecretString) -> Result<Self, DeployerError> {
        let target = match &settings.target_os {
            Some(os) => TargetName::resolve(os)?,
            None => {
                let os = HostOs::current().ok_or_else(|| {
                    DeployerError::ConfigError(format!(
                        "No release artifact for host OS '{}'; set target_os",
                        std::env::consts::OS
                    ))
                })?;
                TargetName::for_os(os)
            }
        };

        let release = ReleaseOptions {
            api_base_url: settings.release.api_base_url.clone(),
            owner: settings.release.owner.clone(),
            repo: settings.release.repo.clone(),
            user_agent: settings.release.user_agent.clone(),
            request_timeout: Duration::from_secs(settings.release.request_timeout_secs),
        };

        let pipeline = PipelineOptions {
            work_dir: settings.paths.work_dir.clone(),
            artifact_dir: settings.paths.resolved_artifact_dir(),
            target,
            commands: PipelineCommands {
                source_sync: settings.commands.source_sync.clone(),
                dependency_install: settings.commands.dependency_install.clone(),
                build: settings.commands.build.clone(),
                restart: settings.restart_command(),
            },
            step_timeout: Duration::from_secs(settings.step_timeout_secs),
            fetch_timeout: Duration::from_secs(settings.release.fetch_timeout_secs),
        };

        Ok(Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            release,
            pipeline,
            secret,
        })
    }
}

/// Lifecycle options for the deployer
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown, including a deployment in flight
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}
