//! # Circuit Configuration
//!
//! Effective per-resource settings for the circuit breaker and bulkhead, plus the
//! partial [`ConfigUpdate`] operators send to the config manager.
//!
//! Effective configs are strongly typed (`u32`, [`Duration`]) so an applied config
//! can never hold a negative threshold. Updates arrive as raw signed values and are
//! validated as a whole: every violated field is reported, nothing is applied.

use crate::constants::defaults;
use crate::error::ConfigViolation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Concurrency limits for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadConfig {
    /// Calls allowed in flight at once
    pub max_concurrent: u32,

    /// Additional calls allowed to wait for a slot (zero disables queuing)
    pub max_queued: u32,

    /// Longest a queued call waits before it is abandoned
    pub queue_timeout: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::MAX_CONCURRENT,
            max_queued: defaults::MAX_QUEUED,
            queue_timeout: Duration::from_millis(defaults::QUEUE_TIMEOUT_MS),
        }
    }
}

/// Effective configuration for a single protected resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failures that trip a closed circuit open
    pub failure_threshold: u32,

    /// Successful trial calls needed to close a half-open circuit
    pub success_threshold: u32,

    /// Time spent open before the next call is allowed through as a trial
    pub reset_timeout: Duration,

    /// Deadline for the wrapped work; exceeding it counts as a failure
    pub call_timeout: Duration,

    /// Concurrency limits applied after circuit admission
    pub bulkhead: BulkheadConfig,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::FAILURE_THRESHOLD,
            success_threshold: defaults::SUCCESS_THRESHOLD,
            reset_timeout: Duration::from_millis(defaults::RESET_TIMEOUT_MS),
            call_timeout: Duration::from_millis(defaults::CALL_TIMEOUT_MS),
            bulkhead: BulkheadConfig::default(),
        }
    }
}

impl CircuitConfig {
    /// Validate every field, collecting all violations
    pub fn validate(&self) -> Result<(), Vec<ConfigViolation>> {
        let mut violations = Vec::new();

        if self.failure_threshold == 0 {
            violations.push(ConfigViolation::FailureThreshold);
        }
        if self.success_threshold == 0 {
            violations.push(ConfigViolation::SuccessThreshold);
        }
        if self.reset_timeout.is_zero() {
            violations.push(ConfigViolation::ResetTimeout);
        }
        if self.call_timeout.is_zero() {
            violations.push(ConfigViolation::CallTimeout);
        }
        if self.bulkhead.max_concurrent == 0 {
            violations.push(ConfigViolation::MaxConcurrent);
        }
        if self.bulkhead.queue_timeout.is_zero() {
            violations.push(ConfigViolation::QueueTimeout);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Partial bulkhead settings carried by a [`ConfigUpdate`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadUpdate {
    pub max_concurrent: Option<i64>,
    pub max_queued: Option<i64>,
    pub queue_timeout_ms: Option<i64>,
}

/// Partial configuration change; absent fields keep their current value
///
/// ```rust
/// use llm_resilience::resilience::{CircuitConfig, ConfigUpdate};
///
/// let update = ConfigUpdate::new().failure_threshold(10);
/// let merged = update.apply_to(&CircuitConfig::default()).unwrap();
/// assert_eq!(merged.failure_threshold, 10);
/// assert_eq!(merged.success_threshold, CircuitConfig::default().success_threshold);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub failure_threshold: Option<i64>,
    pub success_threshold: Option<i64>,
    pub reset_timeout_ms: Option<i64>,
    pub call_timeout_ms: Option<i64>,
    pub bulkhead: BulkheadUpdate,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, value: i64) -> Self {
        self.failure_threshold = Some(value);
        self
    }

    pub fn success_threshold(mut self, value: i64) -> Self {
        self.success_threshold = Some(value);
        self
    }

    pub fn reset_timeout_ms(mut self, value: i64) -> Self {
        self.reset_timeout_ms = Some(value);
        self
    }

    pub fn call_timeout_ms(mut self, value: i64) -> Self {
        self.call_timeout_ms = Some(value);
        self
    }

    pub fn max_concurrent(mut self, value: i64) -> Self {
        self.bulkhead.max_concurrent = Some(value);
        self
    }

    pub fn max_queued(mut self, value: i64) -> Self {
        self.bulkhead.max_queued = Some(value);
        self
    }

    pub fn queue_timeout_ms(mut self, value: i64) -> Self {
        self.bulkhead.queue_timeout_ms = Some(value);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check every present field without touching any config
    pub fn validate(&self) -> Result<(), Vec<ConfigViolation>> {
        let mut violations = Vec::new();

        let positive = |value: Option<i64>, violation, out: &mut Vec<ConfigViolation>| {
            if let Some(v) = value {
                if v <= 0 || v > i64::from(u32::MAX) {
                    out.push(violation);
                }
            }
        };

        positive(
            self.failure_threshold,
            ConfigViolation::FailureThreshold,
            &mut violations,
        );
        positive(
            self.success_threshold,
            ConfigViolation::SuccessThreshold,
            &mut violations,
        );
        if matches!(self.reset_timeout_ms, Some(v) if v <= 0) {
            violations.push(ConfigViolation::ResetTimeout);
        }
        if matches!(self.call_timeout_ms, Some(v) if v <= 0) {
            violations.push(ConfigViolation::CallTimeout);
        }
        positive(
            self.bulkhead.max_concurrent,
            ConfigViolation::MaxConcurrent,
            &mut violations,
        );
        if matches!(self.bulkhead.max_queued, Some(v) if v < 0 || v > i64::from(u32::MAX)) {
            violations.push(ConfigViolation::MaxQueued);
        }
        if matches!(self.bulkhead.queue_timeout_ms, Some(v) if v <= 0) {
            violations.push(ConfigViolation::QueueTimeout);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Validate, then merge the present fields over `base`
    pub fn apply_to(&self, base: &CircuitConfig) -> Result<CircuitConfig, Vec<ConfigViolation>> {
        self.validate()?;

        // Ranges were checked above, so the narrowing casts cannot truncate.
        let mut merged = *base;
        if let Some(v) = self.failure_threshold {
            merged.failure_threshold = v as u32;
        }
        if let Some(v) = self.success_threshold {
            merged.success_threshold = v as u32;
        }
        if let Some(v) = self.reset_timeout_ms {
            merged.reset_timeout = Duration::from_millis(v as u64);
        }
        if let Some(v) = self.call_timeout_ms {
            merged.call_timeout = Duration::from_millis(v as u64);
        }
        if let Some(v) = self.bulkhead.max_concurrent {
            merged.bulkhead.max_concurrent = v as u32;
        }
        if let Some(v) = self.bulkhead.max_queued {
            merged.bulkhead.max_queued = v as u32;
        }
        if let Some(v) = self.bulkhead.queue_timeout_ms {
            merged.bulkhead.queue_timeout = Duration::from_millis(v as u64);
        }

        Ok(merged)
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl From<&CircuitConfig> for ConfigUpdate {
    /// An update with every field set to the values of `config`
    fn from(config: &CircuitConfig) -> Self {
        Self {
            failure_threshold: Some(i64::from(config.failure_threshold)),
            success_threshold: Some(i64::from(config.success_threshold)),
            reset_timeout_ms: Some(millis(config.reset_timeout)),
            call_timeout_ms: Some(millis(config.call_timeout)),
            bulkhead: BulkheadUpdate {
                max_concurrent: Some(i64::from(config.bulkhead.max_concurrent)),
                max_queued: Some(i64::from(config.bulkhead.max_queued)),
                queue_timeout_ms: Some(millis(config.bulkhead.queue_timeout)),
            },
        }
    }
}
