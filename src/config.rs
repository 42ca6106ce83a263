use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// Object store location.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Which workspace and sync connector this run archives.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    pub workspace_id: String,
    pub connector_id: String,
}

/// Key layout inside the bucket.
#[derive(Debug, Deserialize, Clone)]
pub struct LayoutConfig {
    /// Prefix under which sync detail record files land.
    #[serde(default = "default_details_prefix")]
    pub details_prefix: String,
    /// Prefix under which archived `.eml` files are written.
    #[serde(default = "default_raw_files_prefix")]
    pub raw_files_prefix: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            details_prefix: default_details_prefix(),
            raw_files_prefix: default_raw_files_prefix(),
        }
    }
}

fn default_details_prefix() -> String {
    "sync/details/".to_string()
}

fn default_raw_files_prefix() -> String {
    "raw_files/".to_string()
}

impl Config {
    /// Key prefix where this workspace's sync detail files live:
    /// `{detailsPrefix}{workspaceId}/{connectorId}/`.
    pub fn details_prefix(&self) -> String {
        format!(
            "{}{}/{}/",
            self.layout.details_prefix, self.workspace.workspace_id, self.workspace.connector_id
        )
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.store.bucket.is_empty() {
        anyhow::bail!("store.bucket must not be empty");
    }
    if config.workspace.workspace_id.is_empty() {
        anyhow::bail!("workspace.workspace_id must not be empty");
    }
    if config.workspace.connector_id.is_empty() {
        anyhow::bail!("workspace.connector_id must not be empty");
    }
    if !config.layout.details_prefix.ends_with('/') {
        anyhow::bail!("layout.details_prefix must end with '/'");
    }
    if !config.layout.raw_files_prefix.ends_with('/') {
        anyhow::bail!("layout.raw_files_prefix must end with '/'");
    }

    Ok(config)
}
