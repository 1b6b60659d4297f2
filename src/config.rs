//! Configuration for channel sizing and recovery policy.
//!
//! This module provides runtime configuration loading from JSON files so
//! hosts can tune channel capacities and teardown behavior without
//! recompiling. All values have conservative defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete arbiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    pub channels: ChannelConfig,
    pub recovery: RecoveryConfig,
}

/// Channel capacity tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Capacity of the coordinator telemetry broadcast channel
    pub telemetry_buffer: usize,
    /// Capacity of the session invalidation event broadcast channel
    pub session_event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            telemetry_buffer: 128,
            session_event_buffer: 64,
        }
    }
}

/// Recovery and teardown policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Deactivate the platform session when the last owner releases.
    /// Hosts that prefer to keep the session warm set this false.
    pub deactivate_on_release: bool,
    /// Reactivate the session and restart the engine when an interruption
    /// ends. When false the coordinator parks until the next claim; no
    /// retry loop runs either way.
    pub auto_resume: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            deactivate_on_release: true,
            auto_resume: true,
        }
    }
}

impl Default for ArbiterConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            channels: ChannelConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl ArbiterConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// * `Ok(ArbiterConfig)` - Loaded configuration
    /// * `Err` - If file doesn't exist or JSON is invalid, returns default config
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the conventional path next to the process.
    pub fn load() -> Self {
        Self::load_from_file("arbiter_config.json")
    }
}
