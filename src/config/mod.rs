//! # Engine Settings
//!
//! Process-level settings for the resilience engine: the baseline circuit
//! configuration, history retention, event bus capacity, dashboard alerting and
//! any extra profiles to register at startup.
//!
//! Settings are layered by [`SettingsLoader`]: built-in defaults, then an optional
//! file, then `LLM_RESILIENCE_*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use llm_resilience::config::SettingsLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = SettingsLoader::load(None)?;
//! let baseline = settings.default_circuit.to_circuit_config();
//! println!("failure threshold: {}", baseline.failure_threshold);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use crate::resilience::{BulkheadConfig, CircuitConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::SettingsLoader;

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Baseline applied to resources with no prior configuration
    pub default_circuit: CircuitSettings,

    /// Config versions retained per resource before the oldest is evicted
    pub history_limit: usize,

    /// Capacity of the telemetry broadcast channel
    pub event_channel_capacity: usize,

    /// Failure rate above which the dashboard flags a resource
    pub alert_failure_rate: f64,

    /// Extra named profiles registered alongside the built-in ones
    pub profiles: HashMap<String, CircuitSettings>,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            default_circuit: CircuitSettings::default(),
            history_limit: defaults::HISTORY_LIMIT,
            event_channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
            alert_failure_rate: defaults::ALERT_FAILURE_RATE,
            profiles: HashMap::new(),
        }
    }
}

impl ResilienceSettings {
    /// Settings tuned for fast test feedback
    pub fn for_test() -> Self {
        Self {
            default_circuit: CircuitSettings {
                reset_timeout_ms: 100,
                call_timeout_ms: 1_000,
                queue_timeout_ms: 200,
                ..CircuitSettings::default()
            },
            history_limit: 10,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Err(violations) = self.default_circuit.to_circuit_config().validate() {
            return Err(ConfigurationError::InvalidValue {
                field: "default_circuit".to_string(),
                value: format!("{:?}", self.default_circuit),
                context: format!("violations: {violations:?}"),
            });
        }

        for (name, profile) in &self.profiles {
            if let Err(violations) = profile.to_circuit_config().validate() {
                return Err(ConfigurationError::InvalidValue {
                    field: format!("profiles.{name}"),
                    value: format!("{profile:?}"),
                    context: format!("violations: {violations:?}"),
                });
            }
        }

        if self.history_limit == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "history_limit".to_string(),
                value: "0".to_string(),
                context: "must retain at least one version for rollback".to_string(),
            });
        }

        if self.event_channel_capacity == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "event_channel_capacity".to_string(),
                value: "0".to_string(),
                context: "must be greater than 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.alert_failure_rate) {
            return Err(ConfigurationError::InvalidValue {
                field: "alert_failure_rate".to_string(),
                value: self.alert_failure_rate.to_string(),
                context: "must be between 0.0 and 1.0".to_string(),
            });
        }

        Ok(())
    }
}

/// File- and environment-friendly form of [`CircuitConfig`] with millisecond fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub max_concurrent: u32,
    pub max_queued: u32,
    pub queue_timeout_ms: u64,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::FAILURE_THRESHOLD,
            success_threshold: defaults::SUCCESS_THRESHOLD,
            reset_timeout_ms: defaults::RESET_TIMEOUT_MS,
            call_timeout_ms: defaults::CALL_TIMEOUT_MS,
            max_concurrent: defaults::MAX_CONCURRENT,
            max_queued: defaults::MAX_QUEUED,
            queue_timeout_ms: defaults::QUEUE_TIMEOUT_MS,
        }
    }
}

impl CircuitSettings {
    /// Convert to the engine's effective configuration type
    pub fn to_circuit_config(&self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            bulkhead: BulkheadConfig {
                max_concurrent: self.max_concurrent,
                max_queued: self.max_queued,
                queue_timeout: Duration::from_millis(self.queue_timeout_ms),
            },
        }
    }
}
