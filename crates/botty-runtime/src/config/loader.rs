//! Layered configuration loading with figment.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults ([`BottyConfig::default`])
//! 2. Values passed to [`ConfigLoader::merge`]
//! 3. A profile file (`botty.{profile}.toml`) next to the main file
//! 4. The main file (`botty.toml`, `botty.yaml`, ...) or the one given to [`ConfigLoader::file`]
//! 5. `BOTTY_*` environment variables, with `__` separating nested keys
//!
//! `BOTTY_REGISTRY__MAX_PER_CHAT=50` sets `registry.max_per_chat = 50`.
//!
//! Which file formats are read depends on the `toml-config` and `yaml-config`
//! features.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("./deploy/botty.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::BottyConfig;

const ENV_PREFIX: &str = "BOTTY_";
const PROFILE_VAR: &str = "BOTTY_PROFILE";
const APP_DIR: &str = "botty";

/// Deployment profile, selects `botty.{profile}.*` overlay files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `dev` and `prod` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `BOTTY_PROFILE`, falling back to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder that assembles a [`BottyConfig`] from files, environment and code.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for config files.
    ///
    /// When no directory is added, the current directory and the user config
    /// directory (`~/.config/botty` on Linux) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join(APP_DIR)),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching. A missing file is an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers `config` over the built-in defaults. Files and environment
    /// variables still take precedence.
    pub fn merge(mut self, config: BottyConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<BottyConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: BottyConfig = figment
            .extract()
            .map_err(|e| ConfigError::ParseError(format!("Failed to extract configuration: {e}")))?;

        debug!(
            profile = %profile,
            level = %config.logging.level,
            max_per_chat = config.registry.max_per_chat,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(BottyConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        match &self.config_file {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = Self::merge_config_file(figment, path)?;
            }
            Some(path) => return Err(ConfigError::FileNotFound(path.clone())),
            None => figment = self.load_config_files(figment),
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment)
    }

    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR));
        }
        paths
    }

    /// Merges the first base file found among `search_paths × base_names`,
    /// preceded by its profile overlay if one exists.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for dir in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = dir.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["botty.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["botty.yaml", "botty.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::config::schema::{LogLevel, RegistryConfig};

    fn empty_dir() -> PathBuf {
        std::env::temp_dir().join("botty-config-test-nonexistent")
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(ConfigLoader::new().search_path(empty_dir()).without_env().load());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.registry.max_per_chat, 100);
        assert_eq!(config.runtime.max_in_flight, 64);
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let config = assert_ok!(
            ConfigLoader::new()
                .search_path(empty_dir())
                .without_env()
                .merge(BottyConfig {
                    registry: RegistryConfig { max_per_chat: 3 },
                    ..Default::default()
                })
                .load()
        );
        assert_eq!(config.registry.max_per_chat, 3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = assert_err!(
            ConfigLoader::new()
                .file(empty_dir().join("botty.toml"))
                .without_env()
                .load()
        );
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file() {
        let dir = std::env::temp_dir().join(format!("botty-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("botty.toml");
        std::fs::write(
            &path,
            "[logging]\nlevel = \"debug\"\n\n[registry]\nmax_per_chat = 7\n",
        )
        .unwrap();

        let config = assert_ok!(ConfigLoader::new().file(&path).without_env().load());
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.registry.max_per_chat, 7);
        assert_eq!(config.runtime.max_in_flight, 64);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
