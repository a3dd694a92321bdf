//! Configuration file loading for the CLI
//!
//! Settings come from an explicit `--config` path, else `wiql.toml` in the
//! working directory, else the built-in defaults.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wiql::{FormatOptions, TokenizerConfig};

/// File looked up in the working directory when no `--config` is given.
pub const LOCAL_CONFIG: &str = "wiql.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("missing configuration file: {0}")]
    MissingFile(PathBuf),
}

/// Contents of a `wiql.toml` file.
///
/// ```toml
/// [tokenizer]
/// bracket_terminators = ".,;'"
///
/// [format]
/// indent_width = 2
/// keyword_case = "lower"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub tokenizer: TokenizerConfig,
    pub format: FormatOptions,
}

/// Finds and loads the configuration.
///
/// # Errors
///
/// Fails when an explicit path does not exist or a config file cannot be
/// read or parsed.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<CliConfig, ConfigError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!("loading configuration from {}", path.display());
        return load_config_file(path);
    }

    let local = Path::new(LOCAL_CONFIG);
    if local.exists() {
        info!("loading configuration from {}", local.display());
        return load_config_file(local);
    }

    debug!("no configuration file found, using defaults");
    Ok(CliConfig::default())
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<CliConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
