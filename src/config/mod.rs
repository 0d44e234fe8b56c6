//! # Pallet Core Configuration
//!
//! Typed configuration for the command, reconciliation and push-connection
//! layers. Values are layered by [`ConfigManager`]: built-in defaults, then an
//! optional TOML file, then `PALLET__*` environment variables.
//!
//! ```rust,no_run
//! use pallet_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let window = manager.config().reconciliation.debounce_window();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/pallet.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PalletConfig {
    pub remote: RemoteConfig,
    pub reconciliation: ReconciliationConfig,
    pub reconnect: ReconnectConfig,
    pub stage_guard: StageGuardConfig,
}

/// Remote production service settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Upper bound on a single command round-trip before it is reported as a transport failure
    pub command_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub debounce_window_ms: u64,
    pub event_channel_capacity: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: DEFAULT_DEBOUNCE_WINDOW_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ReconciliationConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }
}

/// Push channel reconnection policy
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_attempts: u32,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY_MS,
            multiplier: DEFAULT_RECONNECT_MULTIPLIER,
            max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
            max_delay_ms: DEFAULT_RECONNECT_MAX_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StageGuardConfig {
    /// Reject `startWork` locally when the predecessor stage is not completed.
    /// When false the remote service is the only judge.
    pub enforce_locally: bool,
}

impl Default for StageGuardConfig {
    fn default() -> Self {
        Self {
            enforce_locally: true,
        }
    }
}

impl PalletConfig {
    /// Reject values that would disable debouncing, backoff or event delivery
    pub fn validate(&self) -> ConfigResult<()> {
        if self.remote.command_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "remote.command_timeout_ms",
                "0",
                "command timeout must be positive",
            ));
        }
        if self.reconciliation.debounce_window_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "reconciliation.debounce_window_ms",
                "0",
                "debounce window must be positive",
            ));
        }
        if self.reconciliation.event_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "reconciliation.event_channel_capacity",
                "0",
                "channel capacity must be positive",
            ));
        }
        if self.reconnect.multiplier < 1.0 || !self.reconnect.multiplier.is_finite() {
            return Err(ConfigurationError::invalid_value(
                "reconnect.multiplier",
                self.reconnect.multiplier.to_string(),
                "multiplier must be a finite value >= 1.0",
            ));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "reconnect.max_attempts",
                "0",
                "at least one reconnect attempt is required",
            ));
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "reconnect.base_delay_ms",
                self.reconnect.base_delay_ms.to_string(),
                "base delay exceeds max_delay_ms",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PalletConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconciliation.debounce_window(), Duration::from_millis(300));
        assert_eq!(config.reconnect.multiplier, 1.5);
        assert!(config.stage_guard.enforce_locally);
    }

    #[test]
    fn test_validation_rejects_shrinking_backoff() {
        let mut config = PalletConfig::default();
        config.reconnect.multiplier = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reconnect.multiplier"));
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let mut config = PalletConfig::default();
        config.reconciliation.debounce_window_ms = 0;
        assert!(config.validate().is_err());
    }
}
