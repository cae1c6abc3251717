//! Layered settings loading and engine construction from settings

use llm_resilience::{ResilienceEngine, SettingsLoader};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

// Environment variables are process-wide; loads in this binary take turns
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_yaml_settings_drive_engine() {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(
        file,
        r#"
history_limit: 3
alert_failure_rate: 0.2
default_circuit:
  failure_threshold: 4
  call_timeout_ms: 2500
profiles:
  nightly_batch:
    max_concurrent: 2
    max_queued: 0
"#
    )
    .unwrap();

    let settings = {
        let _env = ENV_LOCK.lock().unwrap();
        SettingsLoader::load(Some(file.path())).unwrap()
    };
    let engine = ResilienceEngine::new(settings);

    let baseline = engine.configs().baseline();
    assert_eq!(baseline.failure_threshold, 4);
    assert_eq!(baseline.call_timeout, Duration::from_millis(2500));
    assert_eq!(engine.configs().get_config("anything"), baseline);

    let nightly = engine.configs().get_profile("nightly_batch").unwrap();
    assert_eq!(nightly.bulkhead.max_concurrent, 2);
    assert_eq!(nightly.bulkhead.max_queued, 0);
    assert_eq!(engine.dashboard().alert_failure_rate, 0.2);
}

#[test]
fn test_environment_overrides_file_and_defaults() {
    let mut file = NamedTempFile::with_suffix(".toml").unwrap();
    writeln!(file, "history_limit = 12").unwrap();

    let _env = ENV_LOCK.lock().unwrap();
    std::env::set_var("LLM_RESILIENCE_HISTORY_LIMIT", "7");
    std::env::set_var("LLM_RESILIENCE_DEFAULT_CIRCUIT__FAILURE_THRESHOLD", "8");
    let loaded = SettingsLoader::load(Some(file.path()));
    std::env::remove_var("LLM_RESILIENCE_HISTORY_LIMIT");
    std::env::remove_var("LLM_RESILIENCE_DEFAULT_CIRCUIT__FAILURE_THRESHOLD");

    let settings = loaded.unwrap();
    assert_eq!(settings.history_limit, 7);
    assert_eq!(settings.default_circuit.failure_threshold, 8);
    assert_eq!(settings.default_circuit.success_threshold, 3);
}
