//! # Circuit Registry
//!
//! Concurrent map from resource name to its [`ResourceGuard`]. Lookups and inserts
//! lock only one shard of the map; all bookkeeping for a resource then happens
//! under that resource's own mutex, so work on different resources proceeds in
//! parallel.

use crate::resilience::{BulkheadState, CircuitConfig, CircuitRecord, CircuitSnapshot};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

/// Circuit and bulkhead state for one resource, mutated only under its guard
#[derive(Debug)]
pub struct ResourceState {
    pub circuit: CircuitRecord,
    pub bulkhead: BulkheadState,
}

/// Single owner of one resource's state
#[derive(Debug)]
pub struct ResourceGuard {
    name: String,
    state: Mutex<ResourceState>,
}

impl ResourceGuard {
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        let name = name.into();
        let state = ResourceState {
            circuit: CircuitRecord::new(name.clone(), config, Instant::now()),
            bulkhead: BulkheadState::new(config.bulkhead),
        };
        Self {
            name,
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the resource state. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, ResourceState> {
        self.state.lock()
    }

    /// Apply a full config to both the circuit and the bulkhead in one step
    pub fn apply_config(&self, config: CircuitConfig) {
        let mut state = self.lock();
        state.circuit.apply_config(config);
        state.bulkhead.apply_config(config.bulkhead);
    }

    pub fn config(&self) -> CircuitConfig {
        *self.lock().circuit.config()
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot::capture(&self.lock())
    }
}

/// Registry of all live resources
#[derive(Debug, Default)]
pub struct CircuitRegistry {
    resources: DashMap<String, Arc<ResourceGuard>>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceGuard>> {
        self.resources.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Get the guard for `name`, creating it with `config` if absent.
    /// Returns `true` alongside the guard when this call created it.
    pub fn get_or_insert(&self, name: &str, config: CircuitConfig) -> (Arc<ResourceGuard>, bool) {
        if let Some(existing) = self.get(name) {
            return (existing, false);
        }

        // Double-check under the shard lock (another caller might have created it)
        let created = match self.resources.entry(name.to_string()) {
            Entry::Occupied(entry) => return (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let guard = Arc::new(ResourceGuard::new(name, config));
                entry.insert(Arc::clone(&guard));
                guard
            }
        };

        // Shard lock is released here; len() must not run while it is held
        info!(
            resource = name,
            total_circuits = self.resources.len(),
            "Created new circuit"
        );
        (created, true)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ResourceGuard>> {
        let removed = self.resources.remove(name).map(|(_, guard)| guard);
        if removed.is_some() {
            info!(
                resource = name,
                remaining_count = self.resources.len(),
                "🗑 Removed circuit"
            );
        }
        removed
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn guards(&self) -> Vec<Arc<ResourceGuard>> {
        self.resources.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;

    #[test]
    fn test_get_or_insert_returns_same_instance() {
        let registry = CircuitRegistry::new();

        let (first, created) = registry.get_or_insert("openai", CircuitConfig::default());
        assert!(created);
        assert_eq!(first.name(), "openai");

        let (second, created) = registry.get_or_insert("openai", CircuitConfig::default());
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_existing_config_wins_over_insert_config() {
        let registry = CircuitRegistry::new();
        let custom = CircuitConfig {
            failure_threshold: 2,
            ..CircuitConfig::default()
        };
        registry.get_or_insert("anthropic", custom);
        let (guard, _) = registry.get_or_insert("anthropic", CircuitConfig::default());
        assert_eq!(guard.config().failure_threshold, 2);
    }

    #[test]
    fn test_concurrent_creation_yields_one_guard() {
        let registry = Arc::new(CircuitRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.get_or_insert("shared", CircuitConfig::default()).1
                })
            })
            .collect();

        let created: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(created, 1);
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_apply_config_reaches_circuit_and_bulkhead() {
        let guard = ResourceGuard::new("gemini", CircuitConfig::default());
        let mut config = CircuitConfig::default();
        config.failure_threshold = 9;
        config.bulkhead.max_concurrent = 3;
        guard.apply_config(config);

        let state = guard.lock();
        assert_eq!(state.circuit.config().failure_threshold, 9);
        assert_eq!(state.bulkhead.config().max_concurrent, 3);
        assert_eq!(state.circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_remove_and_names() {
        let registry = CircuitRegistry::new();
        registry.get_or_insert("b", CircuitConfig::default());
        registry.get_or_insert("a", CircuitConfig::default());
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.names(), vec!["b".to_string()]);
    }
}
