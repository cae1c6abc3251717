//! # Error Types
//!
//! Errors returned by the protected call path and by configuration management.
//! Rejections carry a stable symbolic [`RejectionKind`] so callers can branch on
//! them (for example to fall back to another provider) without matching on text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Symbolic reason a call did not produce a result from the wrapped work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    CircuitOpen,
    BulkheadFull,
    BulkheadQueueFull,
    BulkheadTimeout,
    CallTimeout,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::CircuitOpen => "circuit_open",
            RejectionKind::BulkheadFull => "bulkhead_full",
            RejectionKind::BulkheadQueueFull => "bulkhead_queue_full",
            RejectionKind::BulkheadTimeout => "bulkhead_timeout",
            RejectionKind::CallTimeout => "call_timeout",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned from a protected call
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError<E> {
    /// Circuit is open; the work was not run
    #[error("Circuit breaker is open for {resource}")]
    CircuitOpen { resource: String },

    /// No free slot and no queue capacity
    #[error("Bulkhead is full for {resource}")]
    BulkheadFull { resource: String },

    /// Every queue position is taken
    #[error("Bulkhead queue is full for {resource}")]
    BulkheadQueueFull { resource: String },

    /// Waited in the queue longer than the queue timeout
    #[error("Timed out after {waited:?} waiting for a bulkhead slot on {resource}")]
    BulkheadTimeout { resource: String, waited: Duration },

    /// Work was admitted but did not finish within the call timeout
    #[error("Call to {resource} exceeded timeout of {timeout:?}")]
    CallTimeout { resource: String, timeout: Duration },

    /// Per-call overrides failed validation
    #[error("Invalid call overrides for {resource}: {}", join_violations(.violations))]
    InvalidOverride {
        resource: String,
        violations: Vec<ConfigViolation>,
    },

    /// The wrapped work returned an error, passed through unchanged
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> ExecuteError<E> {
    /// Rejection or timeout kind, `None` for work errors and invalid overrides
    pub fn kind(&self) -> Option<RejectionKind> {
        match self {
            ExecuteError::CircuitOpen { .. } => Some(RejectionKind::CircuitOpen),
            ExecuteError::BulkheadFull { .. } => Some(RejectionKind::BulkheadFull),
            ExecuteError::BulkheadQueueFull { .. } => Some(RejectionKind::BulkheadQueueFull),
            ExecuteError::BulkheadTimeout { .. } => Some(RejectionKind::BulkheadTimeout),
            ExecuteError::CallTimeout { .. } => Some(RejectionKind::CallTimeout),
            ExecuteError::InvalidOverride { .. } | ExecuteError::OperationFailed(_) => None,
        }
    }

    /// True when the work never ran
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            Some(
                RejectionKind::CircuitOpen
                    | RejectionKind::BulkheadFull
                    | RejectionKind::BulkheadQueueFull
                    | RejectionKind::BulkheadTimeout
            )
        )
    }

    /// The work's own error, if that is what this is
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ExecuteError::OperationFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// A configuration field that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigViolation {
    FailureThreshold,
    SuccessThreshold,
    ResetTimeout,
    CallTimeout,
    MaxConcurrent,
    MaxQueued,
    QueueTimeout,
}

impl ConfigViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigViolation::FailureThreshold => "invalid_failure_threshold",
            ConfigViolation::SuccessThreshold => "invalid_success_threshold",
            ConfigViolation::ResetTimeout => "invalid_reset_timeout",
            ConfigViolation::CallTimeout => "invalid_call_timeout",
            ConfigViolation::MaxConcurrent => "invalid_max_concurrent",
            ConfigViolation::MaxQueued => "invalid_max_queued",
            ConfigViolation::QueueTimeout => "invalid_queue_timeout",
        }
    }
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn join_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ConfigViolation::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from configuration management and operator commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error("Invalid configuration: {}", join_violations(.0))]
    InvalidConfig(Vec<ConfigViolation>),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("No configuration history for {0}")]
    NoHistory(String),

    #[error("Circuit not found: {0}")]
    CircuitNotFound(String),

    #[error("No dynamic configuration registered for {0}")]
    NoDynamicConfig(String),
}

impl ManagerError {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerError::InvalidConfig(_) => "invalid_config",
            ManagerError::UnknownProfile(_) => "unknown_profile",
            ManagerError::NoHistory(_) => "no_history",
            ManagerError::CircuitNotFound(_) => "circuit_not_found",
            ManagerError::NoDynamicConfig(_) => "no_dynamic_config",
        }
    }

    /// Violated fields for an `InvalidConfig` error, empty otherwise
    pub fn violations(&self) -> &[ConfigViolation] {
        match self {
            ManagerError::InvalidConfig(violations) => violations,
            _ => &[],
        }
    }
}

impl From<Vec<ConfigViolation>> for ManagerError {
    fn from(violations: Vec<ConfigViolation>) -> Self {
        ManagerError::InvalidConfig(violations)
    }
}

pub type ManagerResult<T> = std::result::Result<T, ManagerError>;
