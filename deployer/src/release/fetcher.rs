//! Release API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::{debug, error};
use url::Url;

use crate::errors::DeployerError;
use crate::models::release::{AssetLookup, ReleaseManifest};
use crate::release::target::TargetName;

/// Release API options
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// Base URL of the release API
    pub api_base_url: String,

    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// User agent sent with every request (the API rejects requests without one)
    pub user_agent: String,

    /// Timeout for each manifest or asset request
    pub request_timeout: Duration,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            owner: "intoxicode".to_string(),
            repo: "intoxicode".to_string(),
            user_agent: format!("intoxicode-deployer/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Source of release artifacts for the deploy pipeline
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Look up the latest release's asset for `target`
    async fn fetch_matching_asset(&self, target: &TargetName) -> Result<AssetLookup, DeployerError>;

    /// Download an asset completely into memory
    async fn download(&self, url: &str) -> Result<Vec<u8>, DeployerError>;
}

/// Client for the "latest release" endpoint of the release API
pub struct ReleaseFetcher {
    client: Client,
    latest_release_url: Url,
}

impl ReleaseFetcher {
    /// Create a new release fetcher
    pub fn new(options: &ReleaseOptions) -> Result<Self, DeployerError> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(options.user_agent.clone())
            .build()?;

        let base = Url::parse(&format!("{}/", options.api_base_url.trim_end_matches('/')))
            .map_err(|e| {
                DeployerError::ConfigError(format!(
                    "Invalid release API URL '{}': {}",
                    options.api_base_url, e
                ))
            })?;
        let latest_release_url = base
            .join(&format!(
                "repos/{}/{}/releases/latest",
                options.owner, options.repo
            ))
            .map_err(|e| DeployerError::ConfigError(format!("Invalid release path: {}", e)))?;

        Ok(Self {
            client,
            latest_release_url,
        })
    }

    /// URL of the latest-release manifest
    pub fn latest_release_url(&self) -> &str {
        self.latest_release_url.as_str()
    }

    /// Fetch the latest-release manifest
    pub async fn latest_release(&self) -> Result<ReleaseManifest, DeployerError> {
        let url = self.latest_release_url.as_str();
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| fetch_error("fetch release manifest", url, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Release manifest request failed: {} - {}", status, body);
            return Err(DeployerError::FetchError(format!(
                "Release API returned {} for {}",
                status, url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error("read release manifest", url, e))?;

        serde_json::from_slice(&body).map_err(|e| {
            DeployerError::FetchError(format!("Malformed release manifest from {}: {}", url, e))
        })
    }
}

#[async_trait]
impl ArtifactSource for ReleaseFetcher {
    async fn fetch_matching_asset(&self, target: &TargetName) -> Result<AssetLookup, DeployerError> {
        let manifest = self.latest_release().await?;

        let lookup = match manifest.find_asset(target) {
            Some(asset) => AssetLookup::Found {
                tag: manifest.tag.clone(),
                download_url: asset.download_url.clone(),
            },
            None => AssetLookup::NotFound {
                tag: manifest.tag.clone(),
            },
        };

        Ok(lookup)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, DeployerError> {
        debug!("GET {} (asset)", url);

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/octet-stream")
            .send()
            .await
            .map_err(|e| fetch_error("download asset", url, e))?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Asset download failed: {}", status);
            return Err(DeployerError::FetchError(format!(
                "Asset download returned {} for {}",
                status, url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error("read asset body", url, e))?;

        Ok(bytes.to_vec())
    }
}

fn fetch_error(what: &str, url: &str, err: reqwest::Error) -> DeployerError {
    if err.is_timeout() {
        DeployerError::Timeout(format!("{} from {}", what, url))
    } else {
        DeployerError::FetchError(format!("Failed to {} from {}: {}", what, url, err))
    }
}
