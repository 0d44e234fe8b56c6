//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and `PALLET_*` environment
//! variables through the `config` crate, then validates the merged result.

use super::error::{ConfigResult, ConfigurationError};
use super::PalletConfig;
use ::config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_PATH_ENV: &str = "PALLET_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/pallet.toml";
const ENV_PREFIX: &str = "PALLET";

/// Owns the validated configuration and remembers where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: PalletConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `PALLET_CONFIG` (or `config/pallet.toml` when present)
    /// with environment overrides applied on top
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let (path, required) = match explicit {
            Some(path) => (Some(path), true),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                (default.exists().then_some(default), false)
            }
        };
        Self::build(path.as_deref(), required, true).map(Arc::new)
    }

    /// Load a specific file without consulting the process environment
    pub fn load_from_file(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        if !path.is_file() {
            return Err(ConfigurationError::FileRead {
                path: path.display().to_string(),
                reason: "not a regular file".to_string(),
            });
        }
        Self::build(Some(path), true, false).map(Arc::new)
    }

    /// Defaults only, validated
    pub fn from_defaults() -> ConfigResult<Arc<ConfigManager>> {
        Self::build(None, false, false).map(Arc::new)
    }

    fn build(path: Option<&Path>, required: bool, with_env: bool) -> ConfigResult<ConfigManager> {
        let mut builder = Config::builder().add_source(Config::try_from(&PalletConfig::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading pallet configuration file");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        if with_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: PalletConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".to_string()),
            debounce_window_ms = config.reconciliation.debounce_window_ms,
            reconnect_max_attempts = config.reconnect.max_attempts,
            enforce_stage_guard = config.stage_guard.enforce_locally,
            "Configuration loaded successfully"
        );

        Ok(ConfigManager {
            config,
            source_path: path.map(Path::to_path_buf),
        })
    }

    pub fn config(&self) -> &PalletConfig {
        &self.config
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}
