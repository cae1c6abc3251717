//! # Circuit Metrics
//!
//! Read-only snapshots of circuit and bulkhead state, derived rates, and the
//! dashboard view that flags resources needing attention.

use crate::resilience::{CallCounters, CircuitConfig, CircuitState, ResourceState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Derived per-resource call metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Calls that ran to an outcome (rejections excluded)
    pub total_calls: u64,
    pub successes: u64,
    /// Failures including timeouts
    pub failures: u64,
    pub timeouts: u64,
    /// Circuit rejections only
    pub rejections: u64,
    /// Calculated success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,
    pub state: CircuitState,
}

impl CircuitBreakerMetrics {
    pub fn from_counters(counters: &CallCounters, state: CircuitState) -> Self {
        let failures = counters.failures + counters.timeouts;
        let (success_rate, failure_rate) = rates(counters.total_calls, counters.successes, failures);
        Self {
            total_calls: counters.total_calls,
            successes: counters.successes,
            failures,
            timeouts: counters.timeouts,
            rejections: counters.rejections,
            success_rate,
            failure_rate,
            state,
        }
    }

    /// Open circuits and high failure rates are unhealthy
    pub fn is_healthy(&self, alert_failure_rate: f64) -> bool {
        self.alert_reason(alert_failure_rate).is_none()
    }

    pub fn alert_reason(&self, alert_failure_rate: f64) -> Option<AlertReason> {
        if self.state == CircuitState::Open {
            Some(AlertReason::CircuitOpen)
        } else if self.failure_rate > alert_failure_rate {
            Some(AlertReason::HighFailureRate)
        } else {
            None
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Success: {:.1}% | Failures: {} | Rejected: {}",
            self.state,
            self.total_calls,
            self.success_rate * 100.0,
            self.failures,
            self.rejections
        )
    }
}

pub(crate) fn rates(total: u64, successes: u64, failures: u64) -> (f64, f64) {
    if total == 0 {
        return (0.0, 0.0);
    }
    (
        successes as f64 / total as f64,
        failures as f64 / total as f64,
    )
}

/// Bulkhead occupancy and lifetime counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadSnapshot {
    pub active_count: u32,
    pub queued_count: usize,
    pub total_accepted: u64,
    pub total_rejected: u64,
}

/// Point-in-time view of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_state_change_time: DateTime<Utc>,
    pub config: CircuitConfig,
    pub bulkhead: BulkheadSnapshot,
    pub metrics: CircuitBreakerMetrics,
}

impl CircuitSnapshot {
    pub fn capture(state: &ResourceState) -> Self {
        let circuit = &state.circuit;
        Self {
            name: circuit.name().to_string(),
            state: circuit.state(),
            failure_count: circuit.failure_count(),
            success_count: circuit.success_count(),
            last_failure_time: circuit.last_failure_time(),
            last_state_change_time: circuit.last_state_change_time(),
            config: *circuit.config(),
            bulkhead: BulkheadSnapshot {
                active_count: state.bulkhead.active_count(),
                queued_count: state.bulkhead.queued_count(),
                total_accepted: state.bulkhead.total_accepted(),
                total_rejected: state.bulkhead.total_rejected(),
            },
            metrics: CircuitBreakerMetrics::from_counters(&circuit.counters(), circuit.state()),
        }
    }
}

/// Why the dashboard flagged a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    CircuitOpen,
    HighFailureRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub name: String,
    pub metrics: CircuitBreakerMetrics,
    pub alert: Option<AlertReason>,
}

/// Operator view across all resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub entries: Vec<DashboardEntry>,
    pub alert_failure_rate: f64,
    pub generated_at: DateTime<Utc>,
}

impl Dashboard {
    pub fn build<I>(metrics: I, alert_failure_rate: f64) -> Self
    where
        I: IntoIterator<Item = (String, CircuitBreakerMetrics)>,
    {
        let mut entries: Vec<DashboardEntry> = metrics
            .into_iter()
            .map(|(name, metrics)| DashboardEntry {
                alert: metrics.alert_reason(alert_failure_rate),
                name,
                metrics,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            entries,
            alert_failure_rate,
            generated_at: Utc::now(),
        }
    }

    /// Entries with an alert raised
    pub fn alerts(&self) -> Vec<&DashboardEntry> {
        self.entries.iter().filter(|e| e.alert.is_some()).collect()
    }

    pub fn entry(&self, name: &str) -> Option<&DashboardEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Get count of resources by state
    pub fn count_by_state(&self) -> HashMap<CircuitState, usize> {
        let mut counts = HashMap::new();
        for entry in &self.entries {
            *counts.entry(entry.metrics.state).or_insert(0) += 1;
        }
        counts
    }

    /// Calculate system-wide health score (0.0 to 1.0)
    pub fn health_score(&self) -> f64 {
        if self.entries.is_empty() {
            return 1.0; // No circuits = healthy
        }
        let healthy = self.entries.iter().filter(|e| e.alert.is_none()).count();
        healthy as f64 / self.entries.len() as f64
    }

    pub fn total_calls(&self) -> u64 {
        self.entries.iter().map(|e| e.metrics.total_calls).sum()
    }

    /// Get system-wide failure rate
    pub fn system_failure_rate(&self) -> f64 {
        let total = self.total_calls();
        let failures: u64 = self.entries.iter().map(|e| e.metrics.failures).sum();
        rates(total, 0, failures).1
    }

    /// Format summary for logging
    pub fn format_summary(&self) -> String {
        let counts = self.count_by_state();
        format!(
            "Circuits: {} total | {} closed | {} open | {} half-open | Alerts: {} | Health: {:.1}% | System failure rate: {:.2}%",
            self.entries.len(),
            counts.get(&CircuitState::Closed).unwrap_or(&0),
            counts.get(&CircuitState::Open).unwrap_or(&0),
            counts.get(&CircuitState::HalfOpen).unwrap_or(&0),
            self.alerts().len(),
            self.health_score() * 100.0,
            self.system_failure_rate() * 100.0
        )
    }
}
