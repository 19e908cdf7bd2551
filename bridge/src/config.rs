//! Bridge configuration from `hmbridge.toml`.
//!
//! Every field is optional. An extension that ships no file runs with the
//! defaults: host path and version detected at run time, the accessor found
//! next to the bridge module, warnings only in the log.
//!
//! ```toml
//! host-path = 'C:\Program Files\Hidemaru\Hidemaru.exe'
//! version = 890.0
//!
//! [accessor]
//! assembly-path = 'C:\Extensions\hmbridge.dll'
//! type-name = "HmBridge.MacroVar"
//!
//! [log]
//! level = "debug"
//! file = 'C:\Temp\hmbridge.log'
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// File name looked up by [`BridgeConfig::discover`].
pub const CONFIG_FILE: &str = "hmbridge.toml";

/// Environment variable naming a configuration file to use instead.
pub const CONFIG_ENV: &str = "HMBRIDGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse hmbridge.toml: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// Host executable; the current process image when unset
    pub host_path: Option<PathBuf>,
    /// Host version override, in host numbering (`890.0` for 8.90)
    pub version: Option<f64>,
    pub accessor: AccessorConfig,
    pub log: LogConfig,
}

/// `[accessor]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AccessorConfig {
    /// Module macro code creates the accessor from. Defaults to the module
    /// the bridge itself was loaded from.
    pub assembly_path: Option<PathBuf>,
    /// Class name passed to `createobject` for the module itself
    pub type_name: String,
    /// Class id passed to `createobject` when the shim is used
    pub interface_id: String,
    /// Extension that replaces the module's own to name the shim
    pub shim_extension: String,
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            assembly_path: None,
            type_name: "HmBridge.MacroVar".to_string(),
            interface_id: "3b1d7c52-8a4e-4f0b-9f4c-5e2a1d6c7b90".to_string(),
            shim_extension: "comhost.dll".to_string(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
    /// Append log lines to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `hmbridge.toml` from `dir`. `Ok(None)` when there is none.
    pub fn discover(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Configuration for the running process.
    ///
    /// Reads the file named by `HMBRIDGE_CONFIG`, else `hmbridge.toml` next to
    /// the bridge module. A file that cannot be used falls back to defaults.
    pub fn from_env() -> Self {
        let found = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)).map(Some),
            None => match crate::native::own_module_path() {
                Some(module) => Self::discover(module.parent().unwrap_or(Path::new("."))),
                None => Ok(None),
            },
        };

        match found {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                log::warn!("ignoring bridge configuration: {}", e);
                Self::default()
            }
        }
    }
}
