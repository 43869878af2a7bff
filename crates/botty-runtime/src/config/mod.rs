//! Configuration for the Botty runtime.
//!
//! [`ConfigLoader`] layers built-in defaults, TOML/YAML files, `BOTTY_*`
//! environment variables and programmatic overrides into a [`BottyConfig`];
//! [`validate_config`] checks the result before the application starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BottyConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RegistryConfig,
    RuntimeConfig, SpanEventConfig,
};
pub use validation::validate_config;
