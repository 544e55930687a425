use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

// Permission runtime configuration sourced from environment variables.
#[derive(Clone)]
pub struct PermissionsConfig {
    // Base URL of the remote authorization service.
    pub server_url: String,
    // Environment secret sent with every snapshot request.
    pub env_secret: String,
    // Age after which a cached snapshot is refreshed in the background.
    pub snapshot_ttl: Duration,
    // Upper bound on a single snapshot fetch.
    pub fetch_timeout: Duration,
}

pub const DEFAULT_SERVER_URL: &str = "https://api.forestadmin.com";
const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 300;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
struct PermissionsConfigOverride {
    server_url: Option<String>,
    env_secret: Option<String>,
    snapshot_ttl_secs: Option<u64>,
    fetch_timeout_ms: Option<u64>,
}

impl PermissionsConfig {
    pub fn new(server_url: impl Into<String>, env_secret: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            env_secret: env_secret.into(),
            snapshot_ttl: Duration::from_secs(DEFAULT_SNAPSHOT_TTL_SECS),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }

    pub fn from_env() -> Result<Self> {
        let config = Self::env_defaults();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::env_defaults();
        if let Ok(path) = std::env::var("AUTHZ_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read AUTHZ_CONFIG: {path}"))?;
            let override_cfg: PermissionsConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse permissions config yaml")?;
            if let Some(value) = override_cfg.server_url {
                config.server_url = value;
            }
            if let Some(value) = override_cfg.env_secret {
                config.env_secret = value;
            }
            if let Some(value) = override_cfg.snapshot_ttl_secs
                && value > 0
            {
                config.snapshot_ttl = Duration::from_secs(value);
            }
            if let Some(value) = override_cfg.fetch_timeout_ms
                && value > 0
            {
                config.fetch_timeout = Duration::from_millis(value);
            }
        }
        config.validate()?;
        Ok(config)
    }

    fn env_defaults() -> Self {
        let server_url =
            std::env::var("AUTHZ_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let env_secret = std::env::var("AUTHZ_ENV_SECRET").unwrap_or_default();
        let snapshot_ttl_secs = std::env::var("AUTHZ_SNAPSHOT_TTL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_SNAPSHOT_TTL_SECS);
        let fetch_timeout_ms = std::env::var("AUTHZ_FETCH_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_MS);
        Self {
            server_url,
            env_secret,
            snapshot_ttl: Duration::from_secs(snapshot_ttl_secs),
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.env_secret.trim().is_empty() {
            bail!("AUTHZ_ENV_SECRET must be set");
        }
        if self.server_url.trim().is_empty() {
            bail!("AUTHZ_SERVER_URL must not be empty");
        }
        Ok(())
    }
}

impl std::fmt::Debug for PermissionsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The environment secret never reaches logs.
        f.debug_struct("PermissionsConfig")
            .field("server_url", &self.server_url)
            .field("env_secret", &"<redacted>")
            .field("snapshot_ttl", &self.snapshot_ttl)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}
