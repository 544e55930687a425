// Remote permission snapshot source.
// One request per rendering returns the full permission state of that rendering.
use crate::config::PermissionsConfig;
use anyhow::Context;
use async_trait::async_trait;
use rendering_authz::{RenderingId, RenderingPermissionSnapshot};
use std::time::Duration;

const PERMISSIONS_PATH: &str = "/liana/v3/permissions";
const SECRET_HEADER: &str = "forest-secret-key";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("permissions request failed: {0}")]
    Request(String),
    #[error("permissions request returned status {0}")]
    Status(u16),
    #[error("permissions body could not be decoded: {0}")]
    Decode(String),
    #[error("permissions request timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of permission snapshots, one per rendering.
///
/// Implementations must be idempotent and safe to retry.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, rendering: RenderingId)
    -> Result<RenderingPermissionSnapshot, FetchError>;
}

/// Fetches snapshots from the authorization service over HTTP.
#[derive(Clone)]
pub struct HttpSnapshotFetcher {
    base_url: String,
    env_secret: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpSnapshotFetcher {
    pub fn new(config: &PermissionsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .context("build permissions http client")?;
        Ok(Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            env_secret: config.env_secret.clone(),
            client,
            timeout: config.fetch_timeout,
        })
    }

    fn map_request_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(
        &self,
        rendering: RenderingId,
    ) -> Result<RenderingPermissionSnapshot, FetchError> {
        let url = format!("{}{}", self.base_url, PERMISSIONS_PATH);
        tracing::debug!(rendering = %rendering, "fetching permission snapshot");
        let response = self
            .client
            .get(url)
            .query(&[("renderingId", rendering.get())])
            .header(SECRET_HEADER, &self.env_secret)
            .send()
            .await
            .map_err(|err| self.map_request_error(err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response
            .json::<RenderingPermissionSnapshot>()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Decode(err.to_string())
                }
            })
    }
}
