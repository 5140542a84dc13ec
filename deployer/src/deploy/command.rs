//! Shell step execution

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::deploy::task::Step;
use crate::errors::DeployerError;

/// Output kept from a failing step
const OUTPUT_TAIL_BYTES: usize = 2048;

/// A shell command for one pipeline step
#[derive(Debug, Clone)]
pub struct ShellCommand {
    /// Command line, run through the platform shell
    pub line: String,

    /// Working directory
    pub work_dir: PathBuf,

    /// Upper bound on the run time; the child is killed when exceeded
    pub timeout: Duration,
}

/// Runs pipeline steps
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` for `step` to completion; a non-zero exit is an error
    async fn run(&self, step: Step, command: &ShellCommand) -> Result<(), DeployerError>;
}

/// Runs steps through `sh -c` (`cmd /C` on Windows)
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, step: Step, command: &ShellCommand) -> Result<(), DeployerError> {
        info!("Running {} step: {}", step, command.line);

        let mut cmd = shell(&command.line);
        cmd.current_dir(&command.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(command.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                DeployerError::SubprocessError(format!("Failed to run {} step: {}", step, e))
            })?,
            Err(_) => {
                error!("{} step timed out after {:?}", step, command.timeout);
                return Err(DeployerError::Timeout(format!(
                    "{} step exceeded {:?}",
                    step, command.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = tail(&output.stderr);
            error!("{} step failed ({}): {}", step, output.status, stderr);
            return Err(DeployerError::SubprocessError(format!(
                "{} step exited with {}: {}",
                step, output.status, stderr
            )));
        }

        debug!("{} step output: {}", step, tail(&output.stdout));
        Ok(())
    }
}

fn shell(line: &str) -> Command {
    let (program, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let mut cmd = Command::new(program);
    cmd.args([flag, line]);
    cmd
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(OUTPUT_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}
