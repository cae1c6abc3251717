//! # Telemetry Aggregator
//!
//! Derives per-resource call metrics from the event stream alone, for consumers
//! that observe the bus rather than the engine (e.g. an exporter running in its
//! own task).

use crate::constants::events;
use crate::events::{EventPublisher, PublishedEvent};
use crate::resilience::{CallCounters, CircuitBreakerMetrics, CircuitState, Dashboard};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct Tally {
    counters: CallCounters,
    state: CircuitState,
}

impl Default for Tally {
    fn default() -> Self {
        Self {
            counters: CallCounters::default(),
            state: CircuitState::Closed,
        }
    }
}

/// Event-derived counters per resource
#[derive(Debug, Default)]
pub struct EventAggregator {
    tallies: DashMap<String, Tally>,
    ingested: AtomicU64,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the counters. Events without a resource are ignored.
    pub fn ingest(&self, event: &PublishedEvent) {
        let Some(resource) = event.resource() else {
            return;
        };
        self.ingested.fetch_add(1, Ordering::Relaxed);

        let mut tally = self.tallies.entry(resource.to_string()).or_default();
        match event.name.as_str() {
            events::CALL_SUCCEEDED => {
                tally.counters.total_calls += 1;
                tally.counters.successes += 1;
            }
            events::CALL_FAILED => {
                tally.counters.total_calls += 1;
                tally.counters.failures += 1;
            }
            events::CALL_TIMED_OUT => {
                tally.counters.total_calls += 1;
                tally.counters.timeouts += 1;
            }
            // Bulkhead rejections are tallied by the bulkhead, not the circuit
            events::CALL_REJECTED => {
                let bulkhead = event
                    .context
                    .get("reason")
                    .and_then(|reason| reason.as_str())
                    .is_some_and(|reason| reason.starts_with("bulkhead_"));
                if !bulkhead {
                    tally.counters.rejections += 1;
                }
            }
            events::CIRCUIT_RESET => *tally = Tally::default(),
            events::CIRCUIT_STATE_CHANGED => {
                match event
                    .context
                    .get("to")
                    .cloned()
                    .map(serde_json::from_value::<CircuitState>)
                {
                    Some(Ok(state)) => tally.state = state,
                    _ => debug!(resource, "State change event without a readable target state"),
                }
            }
            _ => {}
        }
    }

    /// Consume `publisher`'s broadcast stream on a background task until the bus closes
    pub fn spawn(self: &Arc<Self>, publisher: &EventPublisher) -> JoinHandle<()> {
        let mut receiver = publisher.subscribe();
        let aggregator = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => aggregator.ingest(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Telemetry aggregator lagging; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(
                ingested = aggregator.ingested(),
                "Telemetry aggregator stopped"
            );
        })
    }

    pub fn metrics(&self, resource: &str) -> Option<CircuitBreakerMetrics> {
        self.tallies
            .get(resource)
            .map(|tally| CircuitBreakerMetrics::from_counters(&tally.counters, tally.state))
    }

    pub fn resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tallies.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of events folded in so far
    pub fn ingested(&self) -> u64 {
        self.ingested.load(Ordering::Relaxed)
    }

    pub fn dashboard(&self, alert_failure_rate: f64) -> Dashboard {
        let metrics: Vec<_> = self
            .tallies
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    CircuitBreakerMetrics::from_counters(&entry.counters, entry.state),
                )
            })
            .collect();
        Dashboard::build(metrics, alert_failure_rate)
    }
}
