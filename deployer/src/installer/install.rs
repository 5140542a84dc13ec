//! Release artifact installation

use std::path::Path;

use tracing::{debug, info};

use crate::errors::DeployerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Install `bytes` as the executable at `destination`.
///
/// The destination directory is created if needed. The previous binary stays
/// in place, untouched, until the new one has been fully written; it is then
/// replaced by a rename.
pub async fn install(bytes: &[u8], destination: &Path) -> Result<(), DeployerError> {
    if bytes.is_empty() {
        return Err(DeployerError::InstallError(format!(
            "Refusing to install an empty artifact at {}",
            destination.display()
        )));
    }

    let parent = destination.parent().ok_or_else(|| {
        DeployerError::InstallError(format!(
            "Artifact path has no parent directory: {}",
            destination.display()
        ))
    })?;

    let dir = Dir::new(parent);
    if !dir.exists().await {
        debug!("Creating artifact directory {}", parent.display());
    }
    dir.create().await.map_err(|e| install_error("create artifact directory", parent, e))?;

    File::new(destination)
        .write_atomic_executable(bytes)
        .await
        .map_err(|e| install_error("write artifact", destination, e))?;

    info!(
        "Installed artifact {} ({} bytes)",
        destination.display(),
        bytes.len()
    );
    Ok(())
}

fn install_error(what: &str, path: &Path, err: DeployerError) -> DeployerError {
    DeployerError::InstallError(format!("Failed to {} {}: {}", what, path.display(), err))
}
