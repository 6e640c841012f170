//! Server configuration.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use derivative::Derivative;
use serde::Deserialize;
use xdg::BaseDirectories;

use crate::oobe;
use crate::storage::{LocalStorageConfig, S3StorageConfig};

/// Application prefix in XDG base directories.
///
/// This will be concatenated into `$XDG_CONFIG_HOME/hatch`.
const XDG_PREFIX: &str = "hatch";

/// Environment variable storing the Base64-encoded TOML configuration.
///
/// This is useful for deploying to certain application platforms like Fly.io
const ENV_CONFIG_BASE64: &str = "HATCH_SERVER_TOML_BASE64";

/// Configuration for the Hatch Server.
#[derive(Clone, Derivative, Deserialize)]
#[derivative(Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Socket address to listen on.
    #[serde(default = "default_listen_address")]
    pub listen: SocketAddr,

    /// Allowed `Host` headers.
    ///
    /// This _must_ be configured for production use. If unconfigured or the
    /// list is empty, all `Host` headers are allowed.
    #[serde(rename = "allowed-hosts")]
    #[serde(default = "Vec::new")]
    pub allowed_hosts: Vec<String>,

    /// Database connection.
    pub database: DatabaseConfig,

    /// Storage.
    pub storage: StorageConfig,

    /// Ingestion.
    #[serde(default = "Default::default")]
    pub ingest: IngestConfig,

    /// External asset service.
    #[serde(rename = "asset-service")]
    #[serde(default = "Default::default")]
    pub asset_service: AssetServiceConfig,
}

/// Database connection configuration.
#[derive(Clone, Derivative, Deserialize)]
#[derivative(Debug)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL.
    ///
    /// This may contain a password.
    #[derivative(Debug = "ignore")]
    pub url: String,

    /// Whether to enable sending of periodic heartbeat queries.
    ///
    /// If enabled, a heartbeat query will be sent every minute.
    #[serde(default = "default_db_heartbeat")]
    pub heartbeat: bool,
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Local file storage.
    #[serde(rename = "local")]
    Local(LocalStorageConfig),

    /// S3 storage.
    #[serde(rename = "s3")]
    S3(S3StorageConfig),
}

/// Ingestion configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Directory to create per-upload scratch directories in.
    ///
    /// Defaults to the system temporary directory.
    #[serde(rename = "scratch-dir")]
    pub scratch_dir: Option<PathBuf>,

    /// Maximum size of a single asset inside a project archive.
    #[serde(rename = "max-asset-size")]
    #[serde(default = "default_max_asset_size")]
    pub max_asset_size: u64,

    /// The smaller axis of stored images is scaled down to this.
    #[serde(rename = "max-image-dimension")]
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,

    /// Maximum request body size of image uploads.
    #[serde(rename = "max-image-upload-size")]
    #[serde(default = "default_max_image_upload_size")]
    pub max_image_upload_size: usize,

    /// Maximum request body size of project uploads.
    #[serde(rename = "max-project-upload-size")]
    #[serde(default = "default_max_project_upload_size")]
    pub max_project_upload_size: usize,
}

/// External asset service configuration.
///
/// Assets inside project archives that already exist on this
/// service are pruned before the archive is stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetServiceConfig {
    /// Whether to query the asset service at all.
    ///
    /// If disabled, archives are stored as uploaded.
    #[serde(default = "default_asset_service_enable")]
    pub enable: bool,

    /// URL of an asset, with `{}` standing in for the asset name.
    #[serde(rename = "url-template")]
    #[serde(default = "default_asset_url_template")]
    pub url_template: String,

    /// Timeout of each existence probe.
    #[serde(with = "humantime_serde", default = "default_asset_probe_timeout")]
    pub timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            max_asset_size: default_max_asset_size(),
            max_image_dimension: default_max_image_dimension(),
            max_image_upload_size: default_max_image_upload_size(),
            max_project_upload_size: default_max_project_upload_size(),
        }
    }
}

impl IngestConfig {
    /// Returns the directory to create scratch directories in.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

impl Default for AssetServiceConfig {
    fn default() -> Self {
        Self {
            enable: default_asset_service_enable(),
            url_template: default_asset_url_template(),
            timeout: default_asset_probe_timeout(),
        }
    }
}

impl AssetServiceConfig {
    /// Returns the probe URL of an asset.
    pub fn asset_url(&self, name: &str) -> String {
        self.url_template.replacen("{}", name, 1)
    }
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0u16; 8], 8080))
}

fn default_db_heartbeat() -> bool {
    false
}

fn default_max_asset_size() -> u64 {
    15_000_000
}

fn default_max_image_dimension() -> u32 {
    256
}

fn default_max_image_upload_size() -> usize {
    5 * 1024 * 1024
}

fn default_max_project_upload_size() -> usize {
    500 * 1024 * 1024
}

fn default_asset_service_enable() -> bool {
    true
}

fn default_asset_url_template() -> String {
    "https://assets.scratch.mit.edu/internalapi/{}/get/".to_string()
}

fn default_asset_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    tracing::info!("Using configurations: {:?}", path);

    let config = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&config)?)
}

fn load_config_from_str(s: &str) -> Result<Config> {
    tracing::info!("Using configurations from environment variable");
    Ok(toml::from_str(s)?)
}

/// Loads the configuration in the standard order.
///
/// If no configuration exists and `allow_oobe` is set, a starter
/// configuration is generated first.
pub async fn load_config(config_path: Option<&Path>, allow_oobe: bool) -> Result<Config> {
    if let Some(config_path) = config_path {
        load_config_from_path(config_path)
    } else if let Ok(config_env) = env::var(ENV_CONFIG_BASE64) {
        let decoded = String::from_utf8(BASE64_STANDARD.decode(config_env.as_bytes())?)?;
        load_config_from_str(&decoded)
    } else {
        let xdg_config_path = get_xdg_config_path()?;

        if !xdg_config_path.exists() {
            if allow_oobe {
                oobe::run_oobe().await?;
            } else {
                return Err(anyhow!(
                    "No configuration found at {:?}; pass one with --config",
                    xdg_config_path
                ));
            }
        }

        load_config_from_path(&xdg_config_path)
    }
}

pub fn get_xdg_config_path() -> Result<PathBuf> {
    let xdg_dirs = BaseDirectories::with_prefix(XDG_PREFIX)?;
    let config_path = xdg_dirs.place_config_file("server.toml")?;

    Ok(config_path)
}

pub fn get_xdg_data_path() -> Result<PathBuf> {
    let xdg_dirs = BaseDirectories::with_prefix(XDG_PREFIX)?;
    let data_path = xdg_dirs.create_data_directory("")?;

    Ok(data_path)
}
