//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::DeployerError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Placeholder in the restart command replaced by the service name
pub const SERVICE_PLACEHOLDER: &str = "{service}";

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to a daily file under the base directory
    #[serde(default)]
    pub log_to_file: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// OS the artifact is selected for; defaults to the OS of this binary
    #[serde(default)]
    pub target_os: Option<String>,

    /// Release API configuration
    #[serde(default)]
    pub release: ReleaseSettings,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathSettings,

    /// Pipeline commands
    #[serde(default)]
    pub commands: CommandSettings,

    /// Name of the service the supervisor restarts
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Timeout for each shell step in seconds
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Environment variable holding the webhook secret
    #[serde(default = "default_secret_env_var")]
    pub secret_env_var: String,
}

fn default_service_name() -> String {
    "intoxicode-web".to_string()
}

fn default_step_timeout() -> u64 {
    600
}

fn default_secret_env_var() -> String {
    "GITHUB_SECRET".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            target_os: None,
            release: ReleaseSettings::default(),
            paths: PathSettings::default(),
            commands: CommandSettings::default(),
            service_name: default_service_name(),
            step_timeout_secs: default_step_timeout(),
            secret_env_var: default_secret_env_var(),
        }
    }
}

impl Settings {
    /// Restart command with the service name filled in
    pub fn restart_command(&self) -> String {
        self.commands
            .restart
            .replace(SERVICE_PLACEHOLDER, &self.service_name)
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Release API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_repo")]
    pub repo: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for each request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for the manifest lookup and download together, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_owner() -> String {
    "intoxicode".to_string()
}

fn default_repo() -> String {
    "intoxicode".to_string()
}

fn default_user_agent() -> String {
    format!("intoxicode-deployer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    300
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            owner: default_owner(),
            repo: default_repo(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// Filesystem settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Source tree the pipeline commands run in
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Artifact directory; relative paths are resolved against `work_dir`
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("static/assets/releases")
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

impl PathSettings {
    /// Artifact directory, resolved against the work tree
    pub fn resolved_artifact_dir(&self) -> PathBuf {
        if self.artifact_dir.is_absolute() {
            self.artifact_dir.clone()
        } else {
            self.work_dir.join(&self.artifact_dir)
        }
    }
}

/// Pipeline command settings; an empty command skips its step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSettings {
    #[serde(default = "default_source_sync")]
    pub source_sync: String,

    #[serde(default = "default_dependency_install")]
    pub dependency_install: String,

    #[serde(default = "default_build")]
    pub build: String,

    /// May contain `{service}`
    #[serde(default = "default_restart")]
    pub restart: String,
}

fn default_source_sync() -> String {
    "git pull".to_string()
}

fn default_dependency_install() -> String {
    "bun install".to_string()
}

fn default_build() -> String {
    "bun run build".to_string()
}

fn default_restart() -> String {
    format!("pm2 restart {}", SERVICE_PLACEHOLDER)
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            source_sync: default_source_sync(),
            dependency_install: default_dependency_install(),
            build: default_build(),
            restart: default_restart(),
        }
    }
}

/// Load settings from `file`, falling back to defaults when it does not exist
pub async fn load_settings(file: &File) -> Result<Settings, DeployerError> {
    if !file.exists().await {
        return Ok(Settings::default());
    }

    file.read_json::<Settings>().await.map_err(|e| {
        DeployerError::ConfigError(format!(
            "Failed to read settings from {}: {}",
            file.path().display(),
            e
        ))
    })
}
