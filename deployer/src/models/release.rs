//! Release API models

use serde::{Deserialize, Serialize};

use crate::release::target::TargetName;

/// The latest-release manifest returned by the release API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    /// Release tag, e.g. `v0.4.1`
    #[serde(rename = "tag_name")]
    pub tag: String,

    /// Downloadable files attached to the release
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,

    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

impl ReleaseManifest {
    /// First asset whose name equals the target name exactly
    pub fn find_asset(&self, target: &TargetName) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == target.as_str())
    }
}

/// Outcome of looking up the current platform's asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLookup {
    Found { tag: String, download_url: String },
    NotFound { tag: String },
}
