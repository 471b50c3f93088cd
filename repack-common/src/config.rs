//! Configuration loading and root folder resolution
//!
//! Settings are layered with the same priority everywhere:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name used under the platform config directory
pub const CONFIG_DIR_NAME: &str = "comic-repack";

/// Config file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive, e.g. "repack_scan=debug"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Contents of `config.toml`
///
/// Every field is optional; absent fields fall through to env or defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Comic library folder preselected at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Path or name of the 7-Zip command line binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seven_zip_path: Option<PathBuf>,

    /// File extensions treated as comic archives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_extensions: Option<Vec<String>>,

    /// Seconds to wait for the engine to confirm a cancel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_timeout_secs: Option<u64>,

    /// Maximum conversions running at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_workers: Option<usize>,

    /// Event bus capacity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_capacity: Option<usize>,

    /// Where converted `.cbz` files go (default: next to the source)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Scratch space for extraction (default: system temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Kept last so it serializes as a trailing `[logging]` table
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Root folder resolution following the layered priority order
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    // No compiled default: without a folder the operator picks one at runtime
    toml_config.root_folder.clone()
}

/// Locate the config file for this platform
///
/// Linux checks `~/.config/comic-repack/config.toml`, then
/// `/etc/comic-repack/config.toml`. Other platforms use the user config dir.
pub fn default_config_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));

    if cfg!(target_os = "linux") {
        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = user_config
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the config file if one exists
///
/// A missing file yields defaults. An explicit path that fails to parse is an
/// error; a discovered file that fails to parse is logged and ignored.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit_path {
        return read_toml_config(path);
    }

    match default_config_path() {
        Ok(path) => match read_toml_config(&path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring unreadable config file: {}", e);
                Ok(TomlConfig::default())
            }
        },
        Err(_) => Ok(TomlConfig::default()),
    }
}

/// Write a TOML config file atomically
///
/// Serializes to a sibling temp file and renames it over the target so a
/// crash never leaves a truncated config behind.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
