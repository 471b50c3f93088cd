//! Service configuration resolution for repack-scan
//!
//! Each setting resolves as: command line → `REPACK_*` environment variable →
//! TOML config file → compiled default.

use repack_common::config::{load_toml_config, resolve_root_folder, TomlConfig};
use repack_common::{Error, Result};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::engine::walker::DEFAULT_EXTENSIONS;
use crate::services::ServiceSettings;

pub const ENV_ROOT_FOLDER: &str = "REPACK_ROOT_FOLDER";
pub const ENV_BIND_ADDRESS: &str = "REPACK_BIND_ADDRESS";
pub const ENV_PORT: &str = "REPACK_PORT";
pub const ENV_SEVEN_ZIP: &str = "REPACK_SEVEN_ZIP";
pub const ENV_EXTENSIONS: &str = "REPACK_EXTENSIONS";
pub const ENV_CANCEL_TIMEOUT_SECS: &str = "REPACK_CANCEL_TIMEOUT_SECS";
pub const ENV_CONVERSION_WORKERS: &str = "REPACK_CONVERSION_WORKERS";
pub const ENV_EVENT_CAPACITY: &str = "REPACK_EVENT_CAPACITY";
pub const ENV_OUTPUT_DIR: &str = "REPACK_OUTPUT_DIR";
pub const ENV_TEMP_DIR: &str = "REPACK_TEMP_DIR";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5790;
pub const DEFAULT_SEVEN_ZIP: &str = "7zz";
pub const DEFAULT_CANCEL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONVERSION_WORKERS: usize = 2;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
pub const DEFAULT_LOG_FILTER: &str = "repack_scan=info,repack_common=info,tower_http=info";

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub seven_zip_path: Option<PathBuf>,
    pub cancel_timeout_secs: Option<u64>,
    pub conversion_workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: String,
    pub port: u16,
    pub seven_zip_path: PathBuf,
    pub archive_extensions: Vec<String>,
    pub cancel_timeout: Duration,
    pub conversion_workers: usize,
    pub event_capacity: usize,
    pub output_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl ServiceConfig {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), ENV_ROOT_FOLDER, toml);

        let bind_address = layered(
            cli.bind_address.clone(),
            ENV_BIND_ADDRESS,
            toml.bind_address.clone(),
            DEFAULT_BIND_ADDRESS.to_string(),
        )?;
        let port = layered(cli.port, ENV_PORT, toml.port, DEFAULT_PORT)?;
        let seven_zip_path = layered(
            cli.seven_zip_path.clone(),
            ENV_SEVEN_ZIP,
            toml.seven_zip_path.clone(),
            PathBuf::from(DEFAULT_SEVEN_ZIP),
        )?;
        let cancel_timeout_secs = layered(
            cli.cancel_timeout_secs,
            ENV_CANCEL_TIMEOUT_SECS,
            toml.cancel_timeout_secs,
            DEFAULT_CANCEL_TIMEOUT_SECS,
        )?;
        let conversion_workers = layered(
            cli.conversion_workers,
            ENV_CONVERSION_WORKERS,
            toml.conversion_workers,
            DEFAULT_CONVERSION_WORKERS,
        )?;
        let event_capacity = layered(
            None,
            ENV_EVENT_CAPACITY,
            toml.event_capacity,
            DEFAULT_EVENT_CAPACITY,
        )?;

        if conversion_workers == 0 {
            return Err(Error::Config("conversion_workers must be at least 1".to_string()));
        }
        if event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }

        let archive_extensions = match env_value(ENV_EXTENSIONS) {
            Some(list) => list
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            None => toml
                .archive_extensions
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()),
        };

        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| env_value(ENV_OUTPUT_DIR).map(PathBuf::from))
            .or_else(|| toml.output_dir.clone());
        let temp_dir = env_value(ENV_TEMP_DIR)
            .map(PathBuf::from)
            .or_else(|| toml.temp_dir.clone());

        let log_filter = toml
            .logging
            .level
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            root_folder,
            bind_address,
            port,
            seven_zip_path,
            archive_extensions,
            cancel_timeout: Duration::from_secs(cancel_timeout_secs),
            conversion_workers,
            event_capacity,
            output_dir,
            temp_dir,
            log_filter,
        })
    }

    /// Settings for the service task
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            cancel_timeout: self.cancel_timeout,
            conversion_workers: self.conversion_workers,
            ..ServiceSettings::default()
        }
    }

    /// `address:port` for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// `RUST_LOG` when set, otherwise `fallback`
pub fn env_filter_or(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Load the TOML file and resolve every setting
///
/// Runs before the global subscriber exists, so loading logs through a
/// temporary stdout subscriber filtered by `RUST_LOG` or the default filter.
pub fn load_service_config(cli: &CliOverrides, config_path: Option<&Path>) -> Result<ServiceConfig> {
    load_with_logging(cli, config_path, env_filter_or(DEFAULT_LOG_FILTER), std::io::stdout)
}

fn load_with_logging<W>(
    cli: &CliOverrides,
    config_path: Option<&Path>,
    filter: EnvFilter,
    writer: W,
) -> Result<ServiceConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, || {
        let toml = load_toml_config(config_path)?;
        ServiceConfig::resolve(cli, &toml)
    })
}

/// Non-empty environment value
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn layered<T>(cli: Option<T>, env_name: &str, toml: Option<T>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    if let Some(value) = cli {
        return Ok(value);
    }
    if let Some(raw) = env_value(env_name) {
        debug!("Using {} from environment", env_name);
        return raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", env_name, raw, e)));
    }
    Ok(toml.unwrap_or(default))
}
