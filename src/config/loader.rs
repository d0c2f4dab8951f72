//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles environment detection,
//! optional base and per-environment TOML files, and environment variable
//! overrides, merged by the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::TaskerConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const CONFIG_FILE_STEM: &str = "tasker";
const ENV_PREFIX: &str = "TASKER";
const ENV_SEPARATOR: &str = "__";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: TaskerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load from the default directory for the detected environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Like [`ConfigManager::load`] but reading files from `config_dir`
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Merge files from `config_dir` for `environment` plus process env overrides
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Load configuration with an explicit set of environment variables
    ///
    /// When `env_vars` is `Some`, the process environment is not consulted,
    /// which keeps tests independent of each other.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Resolving {} configuration under {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment, env_vars)?;
        config.validate()?;

        crate::log_config!(info, "Tasker configuration ready",
            environment: environment,
            initial_capacity: config.store.initial_capacity,
            default_duration_ms: config.operation.default_duration_ms,
            max_steps: config.sequence.max_steps
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// The merged, validated configuration
    pub fn config(&self) -> &TaskerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
        env_vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<TaskerConfig> {
        let base = config_directory.join(CONFIG_FILE_STEM);
        let overlay = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}"));

        Config::builder()
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(File::with_name(&overlay.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env_vars),
            )
            .build()
            .and_then(|config| config.try_deserialize::<TaskerConfig>())
            .map_err(|e| ConfigurationError::load_failed(environment, e))
    }

    /// `TASKER_ENV` or `APP_ENV`, lowercased; development when neither is set
    fn detect_environment() -> String {
        env::var("TASKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `TASKER_CONFIG_DIR` if set, otherwise `./config`
    fn default_config_directory() -> PathBuf {
        env::var("TASKER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
