//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BottyConfig, LogOutput, LoggingConfig, RegistryConfig, RuntimeConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BottyConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_registry_config(&config.registry)?;
    validate_runtime_config(&config.runtime)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File {
        match &logging.file_path {
            None => return Err(ConfigError::missing_field("logging.file_path")),
            Some(path) if path.as_os_str().is_empty() => {
                return Err(ConfigError::validation("Log file path cannot be empty"));
            }
            Some(_) => {}
        }
        if logging.max_files == 0 {
            return Err(ConfigError::validation(
                "logging.max_files must be greater than 0",
            ));
        }
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module name: {module:?}"
        )));
    }

    Ok(())
}

fn validate_registry_config(registry: &RegistryConfig) -> ConfigResult<()> {
    if registry.max_per_chat == 0 {
        return Err(ConfigError::validation(
            "registry.max_per_chat must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_runtime_config(runtime: &RuntimeConfig) -> ConfigResult<()> {
    if runtime.max_in_flight == 0 {
        return Err(ConfigError::validation(
            "runtime.max_in_flight must be greater than 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_ok!(validate_config(&BottyConfig::default()));
    }

    #[test]
    fn test_zero_registry_bound_is_rejected() {
        let mut config = BottyConfig::default();
        config.registry.max_per_chat = 0;
        let err = assert_err!(validate_config(&config));
        assert!(err.to_string().contains("max_per_chat"));
    }

    #[test]
    fn test_zero_in_flight_is_rejected() {
        let mut config = BottyConfig::default();
        config.runtime.max_in_flight = 0;
        assert_err!(validate_config(&config));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = BottyConfig::default();
        config.logging.output = LogOutput::File;
        let err = assert_err!(validate_config(&config));
        assert!(matches!(err, ConfigError::MissingField { .. }));

        config.logging.file_path = Some(PathBuf::from("logs/botty.log"));
        assert_ok!(validate_config(&config));
    }
}
