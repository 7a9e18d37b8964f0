//! Project configuration file (kiln.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use kiln_assets::PipelineConfig;
use kiln_deploy::{DEFAULT_ENDPOINT, DEFAULT_TOKEN_ENV};

/// Configuration file structure.
///
/// Pipeline settings (`paths`, `bundles`, `vendor`, `html_blocks`) sit at
/// the top level next to the `server` and `deploy` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub deploy: DeploySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Directory served, relative to the project root
    #[serde(default = "default_server_root")]
    pub root: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_open")]
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            root: default_server_root(),
            host: default_host(),
            port: default_port(),
            open: default_open(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploySettings {
    /// Directory uploaded, relative to the project root
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the surge token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            project: default_project(),
            domain: default_domain(),
            endpoint: default_endpoint(),
            token_env: default_token_env(),
        }
    }
}

fn default_server_root() -> String {
    ".".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_open() -> bool {
    true
}
fn default_project() -> String {
    "dist".to_string()
}
fn default_domain() -> String {
    "my-domain.surge.sh".to_string()
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl ConfigFile {
    /// Project root all configured paths resolve against.
    pub fn root(&self) -> &Path {
        &self.pipeline.root
    }
}

/// Load configuration from `path` if it exists.
///
/// A missing file yields the defaults. Paths resolve against the directory
/// containing the config file. Returns an error if the file exists but is
/// malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut config = if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        config
    } else {
        tracing::debug!("No {} found, using defaults", path.display());
        ConfigFile::default()
    };

    config.pipeline = config.pipeline.with_root(root);
    Ok(config)
}
