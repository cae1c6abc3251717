//! Live configuration management: merge, validation, history, profiles

mod common;

use common::*;
use llm_resilience::constants::{config_sources, events, profiles};
use llm_resilience::resilience::profiles as builtin;
use llm_resilience::{CircuitConfig, CircuitState, ConfigUpdate, ConfigViolation, ManagerError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_get_config_defaults_to_baseline() {
    let engine = test_engine();
    let config = engine.configs().get_config("never-seen");
    assert_eq!(config, engine.configs().baseline());
    assert!(engine.configs().get_history("never-seen", 10).is_empty());
}

#[test]
fn test_partial_update_changes_only_given_field() {
    let engine = test_engine();
    let before = engine.configs().get_config("svc");

    engine
        .configs()
        .update_config("svc", &ConfigUpdate::new().failure_threshold(10))
        .unwrap();

    let after = engine.configs().get_config("svc");
    assert_eq!(after.failure_threshold, 10);
    assert_eq!(
        after,
        CircuitConfig {
            failure_threshold: 10,
            ..before
        }
    );
}

#[test]
fn test_validation_reports_every_violation() {
    let engine = test_engine();
    let err = engine
        .configs()
        .update_config(
            "svc",
            &ConfigUpdate::new().failure_threshold(-1).success_threshold(0),
        )
        .unwrap_err();

    let codes: Vec<&str> = err.violations().iter().map(|v| v.as_str()).collect();
    assert_eq!(
        codes,
        vec!["invalid_failure_threshold", "invalid_success_threshold"]
    );
    assert_eq!(err.as_str(), "invalid_config");
    assert!(engine.configs().current_version("svc").is_none());
}

#[test]
fn test_zero_max_queued_is_valid() {
    let engine = test_engine();
    let version = engine
        .configs()
        .update_config("svc", &ConfigUpdate::new().max_queued(0))
        .unwrap();
    assert_eq!(version.config.bulkhead.max_queued, 0);

    let err = engine
        .configs()
        .update_config(
            "svc",
            &ConfigUpdate::new().max_concurrent(0).queue_timeout_ms(0),
        )
        .unwrap_err();
    assert_eq!(
        err.violations(),
        &[ConfigViolation::MaxConcurrent, ConfigViolation::QueueTimeout]
    );
}

#[test]
fn test_rollback_restores_config_before_second_update() {
    let engine = test_engine();
    let configs = engine.configs();

    configs
        .update_config("svc", &ConfigUpdate::new().failure_threshold(8))
        .unwrap();
    let before_second = configs.get_config("svc");
    let before_second_version = configs.current_version("svc").unwrap();

    configs
        .update_config(
            "svc",
            &ConfigUpdate::new().reset_timeout_ms(2_500).max_concurrent(3),
        )
        .unwrap();
    assert_ne!(configs.get_config("svc"), before_second);

    let restored = configs.rollback("svc").unwrap();
    assert_eq!(restored, before_second_version);
    assert_eq!(configs.get_config("svc"), before_second);
    assert_eq!(
        serde_json::to_string(&configs.get_config("svc")).unwrap(),
        serde_json::to_string(&before_second).unwrap()
    );
}

#[test]
fn test_rollback_without_history() {
    let engine = test_engine();
    assert_eq!(
        engine.configs().rollback("svc"),
        Err(ManagerError::NoHistory("svc".to_string()))
    );
}

#[test]
fn test_batch_update_isolates_failures() {
    let engine = test_engine();
    let updates = HashMap::from([
        ("a".to_string(), ConfigUpdate::new().failure_threshold(8)),
        ("b".to_string(), ConfigUpdate::new().failure_threshold(-1)),
    ]);

    let results = engine.configs().batch_update(updates);
    assert_eq!(results.len(), 2);

    let a = results["a"].as_ref().unwrap();
    assert_eq!(a.config.failure_threshold, 8);
    assert_eq!(engine.configs().get_config("a").failure_threshold, 8);

    let b = results["b"].as_ref().unwrap_err();
    assert_eq!(b.violations(), &[ConfigViolation::FailureThreshold]);
    assert!(engine.configs().current_version("b").is_none());
}

#[test]
fn test_profiles_replace_whole_config() {
    let engine = test_engine();
    let configs = engine.configs();

    let listed = configs.list_profiles();
    for name in profiles::BUILT_IN {
        assert!(listed.contains(&name.to_string()), "missing profile {name}");
    }

    configs
        .update_config("svc", &ConfigUpdate::new().failure_threshold(42))
        .unwrap();
    configs.apply_profile("svc", profiles::CONSERVATIVE).unwrap();
    assert_eq!(configs.get_config("svc"), builtin::conservative());
    assert_eq!(configs.get_config("svc").failure_threshold, 3);

    let err = configs.apply_profile("svc", "turbo").unwrap_err();
    assert_eq!(err.as_str(), "unknown_profile");
    assert_eq!(configs.get_config("svc"), builtin::conservative());
}

#[test]
fn test_registered_profile_overwrites_and_applies() {
    let engine = test_engine();
    let configs = engine.configs();
    let custom = CircuitConfig {
        failure_threshold: 7,
        reset_timeout: Duration::from_secs(3),
        ..CircuitConfig::default()
    };

    configs.register_profile("batch_jobs", custom).unwrap();
    configs.apply_profile("svc", "batch_jobs").unwrap();
    assert_eq!(configs.get_config("svc"), custom);

    let replacement = CircuitConfig {
        failure_threshold: 9,
        ..custom
    };
    configs.register_profile("batch_jobs", replacement).unwrap();
    assert_eq!(configs.get_profile("batch_jobs").unwrap(), replacement);

    let invalid = CircuitConfig {
        call_timeout: Duration::ZERO,
        ..custom
    };
    assert_eq!(
        configs.register_profile("broken", invalid).unwrap_err().violations(),
        &[ConfigViolation::CallTimeout]
    );
}

#[test]
fn test_reset_to_default_is_versioned() {
    let engine = test_engine();
    let configs = engine.configs();

    configs.apply_profile("svc", profiles::AGGRESSIVE).unwrap();
    let version = configs.reset_to_default("svc").unwrap();
    assert_eq!(version.config, configs.baseline());
    assert_eq!(version.version, 3);
    assert_eq!(configs.get_history("svc", 10).len(), 2);

    configs.rollback("svc").unwrap();
    assert_eq!(configs.get_config("svc"), builtin::aggressive());
}

#[test]
fn test_history_is_newest_first_and_limited() {
    let engine = test_engine();
    let configs = engine.configs();
    for threshold in 1..=15 {
        configs
            .update_config("svc", &ConfigUpdate::new().failure_threshold(threshold))
            .unwrap();
    }

    let limit = engine.settings().history_limit;
    let history = configs.get_history("svc", 100);
    assert_eq!(history.len(), limit);
    assert!(history.windows(2).all(|w| w[0].version > w[1].version));
    assert_eq!(history[0].config.failure_threshold, 14);
    assert_eq!(configs.get_history("svc", 3).len(), 3);
    assert_eq!(configs.current_version("svc").unwrap().version, 16);
}

#[test]
fn test_list_all_configs() {
    let engine = test_engine();
    engine
        .configs()
        .update_config("b", &ConfigUpdate::new().failure_threshold(2))
        .unwrap();
    engine
        .configs()
        .apply_profile("a", profiles::EXPERIMENTAL)
        .unwrap();

    let all = engine.configs().list_all_configs();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(all["a"], builtin::experimental());
}

#[tokio::test]
async fn test_update_applies_to_live_circuit() {
    let engine = test_engine();
    succeed_once(&engine, "svc").await.unwrap();
    assert_eq!(engine.configs().current_version("svc").unwrap().version, 1);

    engine
        .configs()
        .update_config("svc", &ConfigUpdate::new().failure_threshold(1))
        .unwrap();
    assert_eq!(engine.get_stats("svc").unwrap().config.failure_threshold, 1);

    fail_once(&engine, "svc").await;
    assert_eq!(engine.get_stats("svc").unwrap().state, CircuitState::Open);
}

#[tokio::test]
async fn test_rollback_applies_to_live_circuit() {
    let engine = test_engine();
    succeed_once(&engine, "svc").await.unwrap();

    engine
        .configs()
        .update_config("svc", &ConfigUpdate::new().max_concurrent(1))
        .unwrap();
    engine.configs().rollback("svc").unwrap();

    let live = engine.get_stats("svc").unwrap().config;
    assert_eq!(live, engine.configs().baseline());
}

#[test]
fn test_dynamic_config_is_evaluated_on_refresh() {
    let engine = test_engine();
    let configs = engine.configs();
    let hour = Arc::new(AtomicU32::new(9));

    let clock = Arc::clone(&hour);
    configs.register_dynamic("svc", move || {
        // Business hours get a wider bulkhead
        let mut config = CircuitConfig::default();
        config.bulkhead.max_concurrent = if (9..17).contains(&clock.load(Ordering::SeqCst)) {
            50
        } else {
            5
        };
        config
    });

    // Registration alone does not apply anything
    assert!(configs.current_version("svc").is_none());

    let daytime = configs.refresh_dynamic("svc").unwrap();
    assert_eq!(daytime.config.bulkhead.max_concurrent, 50);

    hour.store(22, Ordering::SeqCst);
    let results = configs.refresh_all_dynamic();
    let night = results["svc"].as_ref().unwrap();
    assert_eq!(night.config.bulkhead.max_concurrent, 5);
    assert_eq!(night.version, daytime.version + 1);

    assert!(configs.unregister_dynamic("svc"));
    assert_eq!(
        configs.refresh_dynamic("svc").unwrap_err().as_str(),
        "no_dynamic_config"
    );
}

#[test]
fn test_config_updates_are_published() {
    let engine = test_engine();
    let mut receiver = engine.subscribe();

    engine
        .configs()
        .update_config("svc", &ConfigUpdate::new().failure_threshold(4))
        .unwrap();
    engine
        .configs()
        .update_config("svc", &ConfigUpdate::new().failure_threshold(-4))
        .unwrap_err();
    engine.configs().apply_profile("svc", profiles::BALANCED).unwrap();

    let published = drain_events(&mut receiver);
    assert_eq!(
        event_names(&published),
        vec![events::CONFIG_UPDATED, events::CONFIG_UPDATED]
    );
    assert_eq!(published[0].context["source"], config_sources::UPDATE);
    assert_eq!(published[0].context["version"], 2);
    assert_eq!(published[0].context["config"]["failure_threshold"], 4);
    assert_eq!(published[1].context["source"], config_sources::PROFILE);
    assert_eq!(published[1].resource(), Some("svc"));
}
