//! Release target resolution

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DeployerError;

const ARTIFACT_PREFIX: &str = "intoxicode";
const ARTIFACT_ARCH: &str = "x86_64";

/// Host operating systems release artifacts are built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    Linux,
    Macos,
    Windows,
}

impl HostOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Linux => "linux",
            HostOs::Macos => "macos",
            HostOs::Windows => "windows",
        }
    }

    /// OS of the running binary, if it is one we have artifacts for
    pub fn current() -> Option<Self> {
        std::env::consts::OS.parse().ok()
    }
}

impl FromStr for HostOs {
    type Err = DeployerError;

    /// Accepts the CI runner spelling (`Linux`, `macOS`, `Windows`) as well as
    /// the Rust target spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linux" => Ok(HostOs::Linux),
            "macos" | "darwin" | "osx" => Ok(HostOs::Macos),
            "windows" | "win32" | "win64" => Ok(HostOs::Windows),
            other => Err(DeployerError::ConfigError(format!(
                "Unsupported target OS: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the release asset built for one platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetName(String);

impl TargetName {
    /// Resolve the artifact file name for `os`
    pub fn for_os(os: HostOs) -> Self {
        let mut name = format!("{}-{}-{}", ARTIFACT_PREFIX, os.as_str(), ARTIFACT_ARCH);
        if os == HostOs::Windows {
            name.push_str(".exe");
        }
        Self(name)
    }

    /// Parse an OS identifier and resolve its artifact name
    pub fn resolve(os: &str) -> Result<Self, DeployerError> {
        Ok(Self::for_os(os.parse()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
