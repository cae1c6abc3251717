//! # Resilience Engine
//!
//! The single entry point for protected calls. [`ResilienceEngine::execute`] runs
//! breaker admission, bulkhead admission, the wrapped work under its deadline and
//! outcome recording, publishing a telemetry event at each decision point.
//!
//! ```rust
//! use llm_resilience::ResilienceEngine;
//!
//! # tokio_test::block_on(async {
//! let engine = ResilienceEngine::default();
//!
//! let reply = engine
//!     .execute("openai", || async { Ok::<_, String>("pong") })
//!     .await
//!     .unwrap();
//! assert_eq!(reply, "pong");
//!
//! let stats = engine.get_stats("openai").unwrap();
//! assert_eq!(stats.metrics.successes, 1);
//! # });
//! ```

use crate::config::ResilienceSettings;
use crate::constants::events;
use crate::error::{ExecuteError, ManagerError, ManagerResult, RejectionKind};
use crate::events::{EventPublisher, PublishedEvent};
use crate::resilience::{
    BulkheadRejection, CallOutcome, CircuitRegistry, CircuitSnapshot, ConfigManager,
    ConfigUpdate, Dashboard, ResourceGuard, StateTransition,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Holds a half-open trial slot until the call's outcome is recorded. Dropped
/// without an outcome (bulkhead rejection, caller cancellation) it frees the slot.
struct TrialGuard<'a> {
    resource: &'a ResourceGuard,
    token: Option<u64>,
}

impl TrialGuard<'_> {
    fn complete(mut self, outcome: CallOutcome, now: Instant) -> Option<StateTransition> {
        let token = self.token.take();
        self.resource
            .lock()
            .circuit
            .record_outcome(outcome, token, now)
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.resource.lock().circuit.abandon_trial(token);
        }
    }
}

/// Circuit breakers, bulkheads, configuration and telemetry for one process
#[derive(Debug)]
pub struct ResilienceEngine {
    settings: ResilienceSettings,
    registry: Arc<CircuitRegistry>,
    configs: ConfigManager,
    events: EventPublisher,
}

impl ResilienceEngine {
    pub fn new(settings: ResilienceSettings) -> Self {
        let registry = Arc::new(CircuitRegistry::new());
        let events = EventPublisher::new(settings.event_channel_capacity);
        let configs = ConfigManager::new(
            Arc::clone(&registry),
            events.clone(),
            settings.default_circuit.to_circuit_config(),
            settings.history_limit,
        );

        for (name, profile) in &settings.profiles {
            if let Err(e) = configs.register_profile(name, profile.to_circuit_config()) {
                warn!(profile = %name, error = %e, "Skipping invalid configured profile");
            }
        }

        info!(
            history_limit = settings.history_limit,
            event_channel_capacity = settings.event_channel_capacity,
            alert_failure_rate = settings.alert_failure_rate,
            "🛡️ Resilience engine initialized"
        );

        Self {
            settings,
            registry,
            configs,
            events,
        }
    }

    pub fn settings(&self) -> &ResilienceSettings {
        &self.settings
    }

    /// Configuration manager for live tuning, profiles and history
    pub fn configs(&self) -> &ConfigManager {
        &self.configs
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Receive every published telemetry event
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    /// Run `work` under the circuit breaker, bulkhead and call timeout of `name`
    pub async fn execute<F, Fut, T, E>(&self, name: &str, work: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(name, None, work).await
    }

    /// Like [`execute`](Self::execute), with overrides merged into the config of a
    /// circuit created by this call. Ignored when the circuit already exists.
    pub async fn execute_with<F, Fut, T, E>(
        &self,
        name: &str,
        overrides: &ConfigUpdate,
        work: F,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(name, Some(overrides), work).await
    }

    async fn run<F, Fut, T, E>(
        &self,
        name: &str,
        overrides: Option<&ConfigUpdate>,
        work: F,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let resource = self.resolve(name, overrides)?;

        let (admission, transition) = resource.lock().circuit.try_admit(Instant::now());
        if let Some(transition) = transition {
            self.emit_transition(name, transition);
        }

        if !admission.is_admitted() {
            debug!(resource = name, "Circuit breaker rejected call");
            self.emit(
                events::CALL_REJECTED,
                json!({ "resource": name, "reason": RejectionKind::CircuitOpen.as_str() }),
            );
            return Err(ExecuteError::CircuitOpen {
                resource: name.to_string(),
            });
        }

        let trial = TrialGuard {
            resource: &resource,
            token: admission.trial_token(),
        };

        let permit = match resource.acquire_slot().await {
            Ok(permit) => permit,
            Err(rejection) => {
                drop(trial);
                return Err(self.bulkhead_rejected(name, rejection));
            }
        };

        let (active_count, queued_count) = {
            let state = resource.lock();
            (state.bulkhead.active_count(), state.bulkhead.queued_count())
        };
        self.emit(
            events::BULKHEAD_ACCEPTED,
            json!({
                "resource": name,
                "active_count": active_count,
                "queued_count": queued_count,
            }),
        );
        self.emit(
            events::CALL_ADMITTED,
            json!({ "resource": name, "trial": trial.token.is_some() }),
        );

        let call_timeout = resource.config().call_timeout;
        let started = Instant::now();
        let result = tokio::time::timeout(call_timeout, work()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (outcome, result) = match result {
            Ok(Ok(value)) => (CallOutcome::Success, Ok(value)),
            Ok(Err(e)) => (CallOutcome::Failure, Err(ExecuteError::OperationFailed(e))),
            Err(_) => (
                CallOutcome::Timeout,
                Err(ExecuteError::CallTimeout {
                    resource: name.to_string(),
                    timeout: call_timeout,
                }),
            ),
        };

        let transition = trial.complete(outcome, Instant::now());
        drop(permit);

        let event_name = match outcome {
            CallOutcome::Success => events::CALL_SUCCEEDED,
            CallOutcome::Failure => events::CALL_FAILED,
            CallOutcome::Timeout => {
                warn!(
                    resource = name,
                    timeout_ms = call_timeout.as_millis() as u64,
                    "⏱️ Protected call timed out"
                );
                events::CALL_TIMED_OUT
            }
        };
        self.emit(
            event_name,
            json!({ "resource": name, "duration_ms": duration_ms }),
        );
        if let Some(transition) = transition {
            self.emit_transition(name, transition);
        }

        result
    }

    /// Find the circuit for `name`, creating it on first use
    fn resolve<E>(
        &self,
        name: &str,
        overrides: Option<&ConfigUpdate>,
    ) -> Result<Arc<ResourceGuard>, ExecuteError<E>> {
        if let Some(existing) = self.registry.get(name) {
            if overrides.is_some_and(|o| !o.is_empty()) {
                debug!(resource = name, "Circuit exists; ignoring call overrides");
            }
            return Ok(existing);
        }

        let initial = self
            .configs
            .initial_config(name, overrides)
            .map_err(|violations| ExecuteError::InvalidOverride {
                resource: name.to_string(),
                violations,
            })?;

        let (resource, created) = self.registry.get_or_insert(name, initial);
        if created {
            self.emit(
                events::CIRCUIT_CREATED,
                json!({ "resource": name, "config": initial }),
            );
            self.configs.attach(&resource, initial);
        }
        Ok(resource)
    }

    fn bulkhead_rejected<E>(&self, name: &str, rejection: BulkheadRejection) -> ExecuteError<E> {
        let reason = rejection.kind.as_str();
        self.emit(
            events::BULKHEAD_REJECTED,
            json!({
                "resource": name,
                "reason": reason,
                "waited_ms": rejection.waited.as_millis() as u64,
            }),
        );
        self.emit(
            events::CALL_REJECTED,
            json!({ "resource": name, "reason": reason }),
        );

        let resource = name.to_string();
        match rejection.kind {
            RejectionKind::BulkheadQueueFull => ExecuteError::BulkheadQueueFull { resource },
            RejectionKind::BulkheadTimeout => ExecuteError::BulkheadTimeout {
                resource,
                waited: rejection.waited,
            },
            _ => ExecuteError::BulkheadFull { resource },
        }
    }

    /// Point-in-time state, counters and config; `None` for unknown resources
    pub fn get_stats(&self, name: &str) -> Option<CircuitSnapshot> {
        self.registry.get(name).map(|resource| resource.snapshot())
    }

    /// Force the circuit back to Closed and zero its counters. Config is untouched.
    pub fn reset(&self, name: &str) -> ManagerResult<()> {
        let resource = self.existing(name)?;
        let transition = resource.lock().circuit.reset(Instant::now());
        self.emit(events::CIRCUIT_RESET, json!({ "resource": name }));
        if let Some(transition) = transition {
            self.emit_transition(name, transition);
        }
        Ok(())
    }

    /// Force the circuit open until it is reset or its reset timeout elapses
    pub fn force_open(&self, name: &str) -> ManagerResult<()> {
        let resource = self.existing(name)?;
        let transition = resource.lock().circuit.force_open(Instant::now());
        if let Some(transition) = transition {
            self.emit_transition(name, transition);
        }
        Ok(())
    }

    pub fn force_closed(&self, name: &str) -> ManagerResult<()> {
        let resource = self.existing(name)?;
        let transition = resource.lock().circuit.force_closed(Instant::now());
        if let Some(transition) = transition {
            self.emit_transition(name, transition);
        }
        Ok(())
    }

    /// Drop the circuit and bulkhead state; configuration history is kept.
    /// Calls already holding a slot finish against the removed state.
    pub fn remove(&self, name: &str) -> ManagerResult<()> {
        self.registry
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ManagerError::CircuitNotFound(name.to_string()))
    }

    /// Names of all live circuits, sorted
    pub fn list_circuits(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn dashboard(&self) -> Dashboard {
        let metrics = self
            .registry
            .guards()
            .into_iter()
            .map(|resource| {
                let snapshot = resource.snapshot();
                (snapshot.name, snapshot.metrics)
            });
        Dashboard::build(metrics, self.settings.alert_failure_rate)
    }

    /// Fraction of circuits without an alert (1.0 when there are none)
    pub fn system_health_score(&self) -> f64 {
        self.dashboard().health_score()
    }

    fn existing(&self, name: &str) -> ManagerResult<Arc<ResourceGuard>> {
        self.registry
            .get(name)
            .ok_or_else(|| ManagerError::CircuitNotFound(name.to_string()))
    }

    fn emit_transition(&self, name: &str, transition: StateTransition) {
        self.emit(
            events::CIRCUIT_STATE_CHANGED,
            json!({
                "resource": name,
                "from": transition.from.as_str(),
                "to": transition.to.as_str(),
            }),
        );
    }

    fn emit(&self, event_name: &'static str, context: Value) {
        self.events.publish(event_name, context);
    }
}

impl Default for ResilienceEngine {
    fn default() -> Self {
        Self::new(ResilienceSettings::default())
    }
}
