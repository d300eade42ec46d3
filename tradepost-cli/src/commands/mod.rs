pub mod completion;
pub mod config;
pub mod inbox;
pub mod watch;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use messaging::{HttpGateway, SharedGateway};
use shared::config::ClientConfig;
use url::Url;

/// Resolves the configuration for a backend command.
///
/// Without `--config`, `config.yaml` in the platform configuration directory
/// is used when it exists.
pub fn resolve_config(path: Option<PathBuf>, server: Option<Url>) -> Result<ClientConfig> {
    let path = path.or_else(default_config_path);
    ClientConfig::load_config(path, server).context("failed to load configuration")
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "tradepost", "tradepost")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .filter(|path| path.is_file())
}

pub fn gateway(config: &ClientConfig) -> Result<SharedGateway> {
    let gateway = HttpGateway::new(config.api.clone()).context("failed to build HTTP client")?;
    Ok(Arc::new(gateway))
}
