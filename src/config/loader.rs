//! # Settings Loader
//!
//! Layers built-in defaults, an optional settings file and environment variables
//! into a validated [`ResilienceSettings`].
//!
//! Environment variables use the `LLM_RESILIENCE` prefix and `__` as the nesting
//! separator, e.g. `LLM_RESILIENCE_DEFAULT_CIRCUIT__FAILURE_THRESHOLD=8`.

use super::{ConfigResult, ConfigurationError, ResilienceSettings};
use config::{Config, Environment, File};
use std::path::Path;
use tracing::{debug, info};

pub const ENV_PREFIX: &str = "LLM_RESILIENCE";

/// Builds [`ResilienceSettings`] from layered sources
#[derive(Debug, Default, Clone, Copy)]
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings, reading `path` when given (format inferred from extension)
    pub fn load(path: Option<&Path>) -> ConfigResult<ResilienceSettings> {
        let mut builder = Config::builder().add_source(Config::try_from(&ResilienceSettings::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigurationError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            debug!(path = %path.display(), "Adding settings file source");
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: ResilienceSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        info!(
            failure_threshold = settings.default_circuit.failure_threshold,
            history_limit = settings.history_limit,
            extra_profiles = settings.profiles.len(),
            "Resilience settings loaded"
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_defaults_without_file() {
        let settings = SettingsLoader::load(None).unwrap();
        assert_eq!(settings.default_circuit.failure_threshold, 5);
        assert_eq!(settings.history_limit, 50);
    }

    #[test]
    fn test_load_toml_file_overrides_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
history_limit = 5
alert_failure_rate = 0.25

[default_circuit]
failure_threshold = 9
reset_timeout_ms = 1500

[profiles.cautious]
failure_threshold = 2
success_threshold = 4
"#
        )
        .unwrap();

        let settings = SettingsLoader::load(Some(file.path())).unwrap();
        assert_eq!(settings.history_limit, 5);
        assert_eq!(settings.alert_failure_rate, 0.25);
        assert_eq!(settings.default_circuit.failure_threshold, 9);
        assert_eq!(settings.default_circuit.reset_timeout_ms, 1500);
        // Unset fields keep their defaults
        assert_eq!(settings.default_circuit.success_threshold, 3);

        let cautious = settings.profiles.get("cautious").unwrap();
        assert_eq!(cautious.failure_threshold, 2);
        assert_eq!(cautious.max_concurrent, 10);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = SettingsLoader::load(Some(Path::new("/nonexistent/resilience.toml")));
        assert!(matches!(
            result,
            Err(ConfigurationError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[default_circuit]\nmax_concurrent = 0").unwrap();

        let result = SettingsLoader::load(Some(file.path()));
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }
}
