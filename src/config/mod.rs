//! # Tasker Concurrency Configuration
//!
//! Layered configuration for the serialized store, cancellable operations
//! and the sequencing driver.
//!
//! ## Sources (later sources override earlier ones)
//!
//! 1. Built-in defaults (`TaskerConfig::default()`)
//! 2. `<config_dir>/tasker.toml` (optional)
//! 3. `<config_dir>/tasker.<environment>.toml` (optional)
//! 4. `TASKER__<SECTION>__<FIELD>` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasker_concurrency::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_steps = manager.config().sequence.max_steps;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring tasker.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskerConfig {
    /// Serialized store settings
    pub store: StoreConfig,

    /// Cancellable operation settings
    pub operation: OperationConfig,

    /// Sequencing driver settings
    pub sequence: SequenceConfig,
}

/// Serialized store configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity reserved for the entry map up front
    pub initial_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
        }
    }
}

/// Cancellable operation configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OperationConfig {
    /// Duration of timed work when the caller gives no explicit hint
    pub default_duration_ms: u64,
}

impl OperationConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 1_000,
        }
    }
}

/// Sequencing driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Upper bound on the number of steps a single sequence accepts
    pub max_steps: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self { max_steps: 1_000 }
    }
}

impl TaskerConfig {
    /// Validate the configuration for consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sequence.max_steps == 0 {
            return Err(ConfigurationError::invalid_value(
                "sequence.max_steps",
                "0",
                "a sequence must accept at least one step",
            ));
        }

        Ok(())
    }
}
