//! # Configuration Profiles
//!
//! Named, complete [`CircuitConfig`] templates shared by every resource in the
//! process. The built-in set is registered at construction; operators may add
//! their own or overwrite any name.

use crate::constants::profiles;
use crate::error::{ManagerError, ManagerResult};
use crate::resilience::{BulkheadConfig, CircuitConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

fn template(
    failure_threshold: u32,
    success_threshold: u32,
    reset_timeout_secs: u64,
    call_timeout_secs: u64,
    max_concurrent: u32,
    max_queued: u32,
    queue_timeout_secs: u64,
) -> CircuitConfig {
    CircuitConfig {
        failure_threshold,
        success_threshold,
        reset_timeout: Duration::from_secs(reset_timeout_secs),
        call_timeout: Duration::from_secs(call_timeout_secs),
        bulkhead: BulkheadConfig {
            max_concurrent,
            max_queued,
            queue_timeout: Duration::from_secs(queue_timeout_secs),
        },
    }
}

/// Quick to trip, slow to trust again, small concurrency
pub fn conservative() -> CircuitConfig {
    template(3, 5, 60, 30, 5, 10, 10)
}

/// Tolerates many failures and recovers on the first success
pub fn aggressive() -> CircuitConfig {
    template(10, 1, 10, 15, 50, 200, 2)
}

/// The built-in baseline
pub fn balanced() -> CircuitConfig {
    CircuitConfig::default()
}

/// Wide bulkhead with short deadlines for bulk workloads
pub fn high_throughput() -> CircuitConfig {
    template(20, 2, 15, 10, 100, 500, 1)
}

/// Hair-trigger settings for trying out new providers
pub fn experimental() -> CircuitConfig {
    template(2, 1, 5, 5, 2, 0, 1)
}

/// Process-wide profile store
#[derive(Debug)]
pub struct ProfileRegistry {
    profiles: RwLock<HashMap<String, CircuitConfig>>,
}

impl ProfileRegistry {
    /// Registry preloaded with the built-in profiles
    pub fn with_builtins() -> Self {
        let builtins = [
            (profiles::CONSERVATIVE, conservative()),
            (profiles::AGGRESSIVE, aggressive()),
            (profiles::BALANCED, balanced()),
            (profiles::HIGH_THROUGHPUT, high_throughput()),
            (profiles::EXPERIMENTAL, experimental()),
        ];

        Self {
            profiles: RwLock::new(
                builtins
                    .into_iter()
                    .map(|(name, config)| (name.to_string(), config))
                    .collect(),
            ),
        }
    }

    /// Validate and store `config` under `name`, overwriting any previous entry
    pub fn register(&self, name: &str, config: CircuitConfig) -> ManagerResult<()> {
        config.validate()?;
        let replaced = self
            .profiles
            .write()
            .insert(name.to_string(), config)
            .is_some();
        info!(profile = name, replaced, "Registered configuration profile");
        Ok(())
    }

    pub fn get(&self, name: &str) -> ManagerResult<CircuitConfig> {
        self.profiles
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| ManagerError::UnknownProfile(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
