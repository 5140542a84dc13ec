//! File operations

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::DeployerError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as bytes
    pub async fn read_bytes(&self) -> Result<Vec<u8>, DeployerError> {
        Ok(fs::read(&self.path).await?)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, DeployerError> {
        let contents = fs::read_to_string(&self.path).await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Atomic write of an executable.
    ///
    /// The contents go to a uniquely named sibling file, which gets its mode
    /// (0o755 on Unix) and is then renamed over the target. Readers see either
    /// the old file or the complete new one, never a partial or non-executable
    /// file. The temporary file is removed on failure.
    pub async fn write_atomic_executable(&self, contents: &[u8]) -> Result<(), DeployerError> {
        let temp_path = self.temp_path()?;

        if let Err(e) = write_and_rename(&temp_path, &self.path, contents).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }

    fn temp_path(&self) -> Result<PathBuf, DeployerError> {
        let file_name = self.path.file_name().ok_or_else(|| {
            DeployerError::InstallError(format!("Not a file path: {}", self.path.display()))
        })?;
        let temp_name = format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        );
        Ok(self.path.with_file_name(temp_name))
    }
}

async fn write_and_rename(
    temp_path: &Path,
    target: &Path,
    contents: &[u8],
) -> Result<(), DeployerError> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp_path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    fs::rename(temp_path, target).await?;
    Ok(())
}
