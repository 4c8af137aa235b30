//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "TOURDESK_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "tourdesk.db";

/// Optional settings read from `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub bind_addr: String,
}

impl ServiceConfig {
    /// Combine CLI values with the TOML file and compiled defaults
    ///
    /// `host`/`port` from the command line (which clap already backs with
    /// environment variables) take precedence over the `[server]` section.
    pub fn resolve(
        cli_root: Option<&Path>,
        cli_host: Option<&str>,
        cli_port: Option<u16>,
    ) -> Result<Self> {
        let toml_config = load_toml_config().unwrap_or_default();
        let root_folder = resolve_root_folder(cli_root, ROOT_FOLDER_ENV, &toml_config);

        let host = cli_host
            .map(str::to_string)
            .or_else(|| toml_config.server.host.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = cli_port.or(toml_config.server.port).unwrap_or(8000);

        if host.is_empty() {
            return Err(Error::Config("Bind host must not be empty".to_string()));
        }

        Ok(Self {
            db_path: root_folder.join(DATABASE_FILE),
            root_folder,
            bind_addr: format!("{}:{}", host, port),
        })
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = &toml_config.root_folder {
        return root_folder.clone();
    }

    get_default_root_folder()
}

/// Parse a TOML config file
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
}

/// Load the first config file found for the platform
fn load_toml_config() -> Result<TomlConfig> {
    let path = find_config_file()?;
    let content = std::fs::read_to_string(&path)?;
    parse_toml_config(&content)
}

/// Get default configuration file path for the platform
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("tourdesk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/tourdesk/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tourdesk"))
        .unwrap_or_else(|| PathBuf::from("./tourdesk_data"))
}
