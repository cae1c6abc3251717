//! # Configuration Manager
//!
//! Validates, versions and applies configuration changes for every resource.
//!
//! Each resource keeps its current [`ConfigVersion`] plus a bounded history of
//! the versions it replaced. Changes are committed under the resource's entry
//! lock and pushed into the live circuit and bulkhead through the resource's own
//! guard, so a concurrent call never observes half of an update.

use crate::constants::{config_sources, events};
use crate::error::{ConfigViolation, ManagerError, ManagerResult};
use crate::events::EventPublisher;
use crate::resilience::{CircuitConfig, CircuitRegistry, ConfigUpdate, ProfileRegistry, ResourceGuard};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A config generator re-evaluated on [`ConfigManager::refresh_dynamic`]
pub type DynamicConfigFn = Arc<dyn Fn() -> CircuitConfig + Send + Sync>;

/// One entry in a resource's configuration history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigVersion {
    pub version: u64,
    pub config: CircuitConfig,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct ConfigEntry {
    current: ConfigVersion,
    history: VecDeque<ConfigVersion>,
}

impl ConfigEntry {
    fn new(config: CircuitConfig) -> Self {
        Self {
            current: ConfigVersion {
                version: 1,
                config,
                timestamp: Utc::now(),
            },
            history: VecDeque::new(),
        }
    }

    /// Make `config` current, moving the old current into history
    fn push(&mut self, config: CircuitConfig, history_limit: usize) -> ConfigVersion {
        let next = ConfigVersion {
            version: self.current.version + 1,
            config,
            timestamp: Utc::now(),
        };
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push_back(previous);
        while self.history.len() > history_limit {
            self.history.pop_front();
        }
        self.current.clone()
    }
}

/// Central, versioned configuration store for all resources
pub struct ConfigManager {
    registry: Arc<CircuitRegistry>,
    events: EventPublisher,
    baseline: CircuitConfig,
    history_limit: usize,
    entries: DashMap<String, ConfigEntry>,
    profiles: ProfileRegistry,
    dynamic: DashMap<String, DynamicConfigFn>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("baseline", &self.baseline)
            .field("history_limit", &self.history_limit)
            .field("configured_resources", &self.entries.len())
            .field("dynamic_resources", &self.dynamic.len())
            .finish()
    }
}

impl ConfigManager {
    pub fn new(
        registry: Arc<CircuitRegistry>,
        events: EventPublisher,
        baseline: CircuitConfig,
        history_limit: usize,
    ) -> Self {
        // At least one superseded version must survive for rollback
        if history_limit == 0 {
            warn!("history_limit of 0 would disable rollback; keeping 1 version");
        }
        let history_limit = history_limit.max(1);
        info!(
            failure_threshold = baseline.failure_threshold,
            history_limit,
            "Initializing configuration manager"
        );

        Self {
            registry,
            events,
            baseline,
            history_limit,
            entries: DashMap::new(),
            profiles: ProfileRegistry::with_builtins(),
            dynamic: DashMap::new(),
        }
    }

    /// The built-in baseline used for resources with no configuration
    pub fn baseline(&self) -> CircuitConfig {
        self.baseline
    }

    /// Effective config for `name`, falling back to the baseline
    pub fn get_config(&self, name: &str) -> CircuitConfig {
        self.entries
            .get(name)
            .map(|entry| entry.current.config)
            .unwrap_or(self.baseline)
    }

    /// Current version record, if the resource has ever been configured
    pub fn current_version(&self, name: &str) -> Option<ConfigVersion> {
        self.entries.get(name).map(|entry| entry.current.clone())
    }

    /// Merge a partial update over the current config
    pub fn update_config(&self, name: &str, update: &ConfigUpdate) -> ManagerResult<ConfigVersion> {
        self.update_with_source(name, update, config_sources::UPDATE)
    }

    fn update_with_source(
        &self,
        name: &str,
        update: &ConfigUpdate,
        source: &'static str,
    ) -> ManagerResult<ConfigVersion> {
        if let Err(violations) = update.validate() {
            warn!(
                resource = name,
                violations = ?violations,
                "Rejected invalid configuration update"
            );
            return Err(ManagerError::InvalidConfig(violations));
        }
        self.commit(name, source, |current| update.apply_to(current))
    }

    /// Replace the whole config with a registered profile
    pub fn apply_profile(&self, name: &str, profile_name: &str) -> ManagerResult<ConfigVersion> {
        let profile = self.profiles.get(profile_name)?;
        debug!(resource = name, profile = profile_name, "Applying configuration profile");
        self.commit(name, config_sources::PROFILE, |_| Ok(profile))
    }

    /// Validate and store a named profile, overwriting an existing one
    pub fn register_profile(&self, profile_name: &str, config: CircuitConfig) -> ManagerResult<()> {
        self.profiles.register(profile_name, config)
    }

    pub fn get_profile(&self, profile_name: &str) -> ManagerResult<CircuitConfig> {
        self.profiles.get(profile_name)
    }

    pub fn list_profiles(&self) -> Vec<String> {
        self.profiles.names()
    }

    /// Apply independent updates; one failure does not block the others
    pub fn batch_update(
        &self,
        updates: HashMap<String, ConfigUpdate>,
    ) -> HashMap<String, ManagerResult<ConfigVersion>> {
        let results: HashMap<_, _> = updates
            .into_iter()
            .map(|(name, update)| {
                let result = self.update_config(&name, &update);
                (name, result)
            })
            .collect();

        let failed = results.values().filter(|r| r.is_err()).count();
        info!(
            total = results.len(),
            failed,
            "Batch configuration update finished"
        );
        results
    }

    /// Restore the version replaced by the most recent change
    pub fn rollback(&self, name: &str) -> ManagerResult<ConfigVersion> {
        let restored = {
            let mut entry = self
                .entries
                .get_mut(name)
                .ok_or_else(|| ManagerError::NoHistory(name.to_string()))?;
            let previous = entry
                .history
                .pop_back()
                .ok_or_else(|| ManagerError::NoHistory(name.to_string()))?;
            entry.current = previous.clone();
            self.apply_to_live(name, previous.config);
            previous
        };

        info!(
            resource = name,
            version = restored.version,
            "⏪ Rolled back configuration"
        );
        self.emit_config_updated(name, &restored, config_sources::ROLLBACK);
        Ok(restored)
    }

    /// Apply the baseline as a regular, history-recorded update
    pub fn reset_to_default(&self, name: &str) -> ManagerResult<ConfigVersion> {
        let full = ConfigUpdate::from(&self.baseline);
        self.update_with_source(name, &full, config_sources::RESET_TO_DEFAULT)
    }

    /// Effective config of every configured resource
    pub fn list_all_configs(&self) -> BTreeMap<String, CircuitConfig> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.current.config))
            .collect()
    }

    /// Replaced versions, newest first, at most `limit` of them
    pub fn get_history(&self, name: &str, limit: usize) -> Vec<ConfigVersion> {
        self.entries
            .get(name)
            .map(|entry| entry.history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Register a config generator for `name`; it only runs on refresh
    pub fn register_dynamic<F>(&self, name: &str, generator: F)
    where
        F: Fn() -> CircuitConfig + Send + Sync + 'static,
    {
        self.dynamic.insert(name.to_string(), Arc::new(generator));
        debug!(resource = name, "Registered dynamic configuration");
    }

    pub fn unregister_dynamic(&self, name: &str) -> bool {
        self.dynamic.remove(name).is_some()
    }

    /// Evaluate the generator for `name` and apply its output as a full replacement
    pub fn refresh_dynamic(&self, name: &str) -> ManagerResult<ConfigVersion> {
        let generator = self
            .dynamic
            .get(name)
            .map(|g| Arc::clone(g.value()))
            .ok_or_else(|| ManagerError::NoDynamicConfig(name.to_string()))?;

        // Evaluated outside any lock; generators may read the manager
        let config = generator();
        config.validate()?;
        self.commit(name, config_sources::DYNAMIC, |_| Ok(config))
    }

    pub fn refresh_all_dynamic(&self) -> HashMap<String, ManagerResult<ConfigVersion>> {
        let names: Vec<String> = self.dynamic.iter().map(|e| e.key().clone()).collect();
        names
            .into_iter()
            .map(|name| {
                let result = self.refresh_dynamic(&name);
                (name, result)
            })
            .collect()
    }

    /// Config a brand-new circuit should start with. Overrides only apply when the
    /// resource has never been configured.
    pub(crate) fn initial_config(
        &self,
        name: &str,
        overrides: Option<&ConfigUpdate>,
    ) -> Result<CircuitConfig, Vec<ConfigViolation>> {
        if let Some(entry) = self.entries.get(name) {
            if overrides.is_some_and(|o| !o.is_empty()) {
                debug!(resource = name, "Ignoring call overrides for configured resource");
            }
            return Ok(entry.current.config);
        }

        match overrides {
            Some(overrides) => overrides.apply_to(&self.baseline),
            None => Ok(self.baseline),
        }
    }

    /// Record the initial version for a newly created circuit, or bring the
    /// circuit in line if a config was committed while it was being created
    pub(crate) fn attach(&self, guard: &ResourceGuard, initial: CircuitConfig) {
        let created = match self.entries.entry(guard.name().to_string()) {
            Entry::Vacant(vacant) => {
                let entry = ConfigEntry::new(initial);
                let version = entry.current.clone();
                vacant.insert(entry);
                Some(version)
            }
            Entry::Occupied(occupied) => {
                let current = occupied.get().current.config;
                if current != guard.config() {
                    guard.apply_config(current);
                }
                None
            }
        };

        if let Some(version) = created {
            self.emit_config_updated(guard.name(), &version, config_sources::INITIAL);
        }
    }

    fn commit<F>(&self, name: &str, source: &'static str, next: F) -> ManagerResult<ConfigVersion>
    where
        F: FnOnce(&CircuitConfig) -> Result<CircuitConfig, Vec<ConfigViolation>>,
    {
        let committed = match self.entries.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let config = next(&entry.current.config)?;
                let version = entry.push(config, self.history_limit);
                self.apply_to_live(name, config);
                version
            }
            Entry::Vacant(vacant) => {
                let config = next(&self.baseline)?;
                let mut entry = ConfigEntry::new(self.baseline);
                let version = entry.push(config, self.history_limit);
                vacant.insert(entry);
                self.apply_to_live(name, config);
                version
            }
        };

        info!(
            resource = name,
            version = committed.version,
            source,
            failure_threshold = committed.config.failure_threshold,
            max_concurrent = committed.config.bulkhead.max_concurrent,
            "⚙ Configuration updated"
        );
        self.emit_config_updated(name, &committed, source);
        Ok(committed)
    }

    /// Push a config into the live circuit, if one exists. Called with the
    /// entry lock held so commits for one resource apply in order.
    fn apply_to_live(&self, name: &str, config: CircuitConfig) {
        if let Some(guard) = self.registry.get(name) {
            guard.apply_config(config);
        }
    }

    fn emit_config_updated(&self, name: &str, version: &ConfigVersion, source: &str) {
        self.events.publish(
            events::CONFIG_UPDATED,
            json!({
                "resource": name,
                "version": version.version,
                "source": source,
                "config": version.config,
            }),
        );
    }
}
