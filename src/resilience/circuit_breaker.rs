//! # Circuit Breaker Implementation
//!
//! Provides fault isolation to prevent cascade failures when a remote provider
//! degrades. The classic three-state pattern: Closed (normal operation), Open
//! (failing fast), and Half-Open (a single trial call tests recovery).
//!
//! [`CircuitRecord`] is a plain state machine. It never locks, sleeps or spawns;
//! the owning [`ResourceGuard`](super::ResourceGuard) serializes access and the
//! caller passes in the current time, so Open → Half-Open is evaluated lazily on
//! the next call attempt rather than by a timer.

use crate::resilience::CircuitConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - one trial call at a time
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, reported so the caller can publish it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Result of asking the breaker whether a call may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed circuit, call proceeds normally
    Admitted,
    /// Half-open trial; the token must be handed back with the outcome
    Trial(u64),
    /// Open circuit, or a trial is already in flight
    Rejected,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }

    pub fn trial_token(&self) -> Option<u64> {
        match self {
            Admission::Trial(token) => Some(*token),
            _ => None,
        }
    }
}

/// How a protected call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failure,
    Timeout,
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success)
    }
}

/// Lifetime counters for one circuit; cleared only by a manual reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallCounters {
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    /// Calls refused by the open circuit; bulkhead refusals are counted on the bulkhead
    pub rejections: u64,
}

/// Circuit state, counters and effective config for one resource
#[derive(Debug)]
pub struct CircuitRecord {
    name: String,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    last_state_change_time: DateTime<Utc>,
    /// Monotonic clock for reset_timeout; wall-clock fields are for display only
    state_changed_at: Instant,
    trial_in_flight: Option<u64>,
    next_trial_token: u64,
    counters: CallCounters,
    config: CircuitConfig,
}

impl CircuitRecord {
    /// Create a new closed circuit with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitConfig, now: Instant) -> Self {
        let name = name.into();
        info!(
            resource = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            last_state_change_time: Utc::now(),
            state_changed_at: now,
            trial_in_flight: None,
            next_trial_token: 1,
            counters: CallCounters::default(),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    pub fn last_failure_time(&self) -> Option<DateTime<Utc>> {
        self.last_failure_time
    }

    pub fn last_state_change_time(&self) -> DateTime<Utc> {
        self.last_state_change_time
    }

    pub fn counters(&self) -> CallCounters {
        self.counters
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Replace the effective config; state and counters are untouched
    pub fn apply_config(&mut self, config: CircuitConfig) {
        self.config = config;
    }

    /// Decide whether a call may proceed, moving Open → Half-Open once the
    /// reset timeout has elapsed
    pub fn try_admit(&mut self, now: Instant) -> (Admission, Option<StateTransition>) {
        let mut transition = None;

        if self.state == CircuitState::Open
            && now.saturating_duration_since(self.state_changed_at) >= self.config.reset_timeout
        {
            transition = self.transition_to(CircuitState::HalfOpen, now);
        }

        let admission = match self.state {
            CircuitState::Closed => Admission::Admitted,
            CircuitState::Open => Admission::Rejected,
            CircuitState::HalfOpen => {
                if self.trial_in_flight.is_some() {
                    Admission::Rejected
                } else {
                    let token = self.next_trial_token;
                    self.next_trial_token += 1;
                    self.trial_in_flight = Some(token);
                    debug!(resource = %self.name, trial = token, "🟡 Admitting half-open trial call");
                    Admission::Trial(token)
                }
            }
        };

        if admission == Admission::Rejected {
            self.counters.rejections += 1;
        }

        (admission, transition)
    }

    /// Record a finished call. `trial` is the token from [`Admission::Trial`], if any.
    pub fn record_outcome(
        &mut self,
        outcome: CallOutcome,
        trial: Option<u64>,
        now: Instant,
    ) -> Option<StateTransition> {
        self.counters.total_calls += 1;
        match outcome {
            CallOutcome::Success => self.counters.successes += 1,
            CallOutcome::Failure => self.counters.failures += 1,
            CallOutcome::Timeout => self.counters.timeouts += 1,
        }
        if !outcome.is_success() {
            self.last_failure_time = Some(Utc::now());
        }

        let is_current_trial = trial.is_some() && trial == self.trial_in_flight;
        if is_current_trial {
            self.trial_in_flight = None;
        }

        match (self.state, outcome.is_success()) {
            (CircuitState::Closed, true) => {
                // Full reset, not a decrement, so sparse failures never creep up
                self.failure_count = 0;
                None
            }
            (CircuitState::Closed, false) => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    self.transition_to(CircuitState::Open, now)
                } else {
                    None
                }
            }
            (CircuitState::HalfOpen, true) if is_current_trial => {
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    self.transition_to(CircuitState::Closed, now)
                } else {
                    None
                }
            }
            (CircuitState::HalfOpen, false) if is_current_trial => {
                self.transition_to(CircuitState::Open, now)
            }
            _ => {
                // Late result from a call admitted before the last transition
                debug!(
                    resource = %self.name,
                    state = %self.state,
                    outcome = ?outcome,
                    "Outcome recorded outside the state machine"
                );
                None
            }
        }
    }

    /// Release a trial slot whose call never ran (e.g. bulkhead rejection)
    pub fn abandon_trial(&mut self, token: u64) {
        if self.trial_in_flight == Some(token) {
            debug!(resource = %self.name, trial = token, "Half-open trial abandoned");
            self.trial_in_flight = None;
        }
    }

    /// Force the circuit back to Closed with zeroed counters; config is kept
    pub fn reset(&mut self, now: Instant) -> Option<StateTransition> {
        warn!(resource = %self.name, "🚨 Circuit breaker manually reset");
        let transition = self.transition_to(CircuitState::Closed, now);
        self.failure_count = 0;
        self.success_count = 0;
        self.trial_in_flight = None;
        self.last_failure_time = None;
        self.counters = CallCounters::default();
        transition
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&mut self, now: Instant) -> Option<StateTransition> {
        warn!(resource = %self.name, "🚨 Circuit breaker forced open");
        self.trial_in_flight = None;
        self.transition_to(CircuitState::Open, now)
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&mut self, now: Instant) -> Option<StateTransition> {
        warn!(resource = %self.name, "🚨 Circuit breaker forced closed");
        self.trial_in_flight = None;
        self.transition_to(CircuitState::Closed, now)
    }

    fn transition_to(&mut self, to: CircuitState, now: Instant) -> Option<StateTransition> {
        let from = self.state;
        if from == to {
            return None;
        }

        self.state = to;
        self.state_changed_at = now;
        self.last_state_change_time = Utc::now();

        match to {
            CircuitState::Open => {
                if from == CircuitState::HalfOpen {
                    // A fresh open period needs fresh failures to re-arm
                    self.failure_count = 0;
                }
                error!(
                    resource = %self.name,
                    from = %from,
                    failure_threshold = self.config.failure_threshold,
                    reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                    "🔴 Circuit breaker opened (failing fast)"
                );
            }
            CircuitState::HalfOpen => {
                self.success_count = 0;
                info!(
                    resource = %self.name,
                    success_threshold = self.config.success_threshold,
                    "🟡 Circuit breaker half-open (testing recovery)"
                );
            }
            CircuitState::Closed => {
                self.failure_count = 0;
                self.success_count = 0;
                info!(
                    resource = %self.name,
                    total_calls = self.counters.total_calls,
                    "🟢 Circuit breaker closed (recovered)"
                );
            }
        }

        Some(StateTransition { from, to })
    }
}
