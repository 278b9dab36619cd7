//! Application configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! domain = "localhost"
//! gate = "drop"
//!
//! [cycle.drivers]
//! api = "HTTP"
//!
//! [api]
//! protocol = "http"
//! host = "localhost"
//! port = 8080
//! root = "/api/"
//!
//! [[actions]]
//! root = "sample"
//! model = "cities"
//! verb = "FETCH"
//! scope = ["user"]
//! ```
//!
//! # Example
//!
//! ```no_run
//! use record_relay_runtime::config::RecordsConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Path taken from RECORD_RELAY_CONFIG
//! let config = RecordsConfig::from_env()?;
//! let lookup = config.lookup()?;
//! println!("{} action types from {}", lookup.len(), config.api.base_uri());
//! # Ok(())
//! # }
//! ```

use record_relay_core::combinators::StartupGate;
use record_relay_core::config::{ActionConfig, ActionConfigLookup, ConfigError};
use record_relay_core::interpret::{ApiConfig, Category};
use record_relay_core::naming::Verb;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "RECORD_RELAY_CONFIG";

/// The only supported API driver.
pub const HTTP_DRIVER: &str = "HTTP";

/// Errors while loading or validating configuration.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(&'static str),

    /// Configuration file unreadable
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration is invalid
    #[error("Configuration validation failed: {0}")]
    Validation(String),

    /// Action configs are inconsistent
    #[error(transparent)]
    ActionConfig(#[from] ConfigError),
}

/// Driver selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriversConfig {
    /// Driver of the API source, must be `HTTP`
    pub api: String,
}

impl Default for DriversConfig {
    fn default() -> Self {
        Self {
            api: HTTP_DRIVER.to_string(),
        }
    }
}

/// The `cycle` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Driver selection
    #[serde(default)]
    pub drivers: DriversConfig,
}

/// One `[[actions]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    /// Root concept
    pub root: String,
    /// Model
    pub model: String,
    /// Verb name, e.g. `FETCH`
    pub verb: String,
    /// Scope keys
    #[serde(default)]
    pub scope: Vec<String>,
    /// Response category, `all` when absent
    #[serde(default)]
    pub category: Option<String>,
}

impl ActionEntry {
    /// Build the action config this entry describes.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Validation`] if the verb is unknown.
    pub fn to_action_config(&self) -> Result<ActionConfig, SettingsError> {
        let verb: Verb = self.verb.parse().map_err(|e| {
            SettingsError::Validation(format!("action {}/{}: {e}", self.root, self.model))
        })?;
        let config = ActionConfig::new(&self.root, &self.scope, &self.model, verb);
        Ok(match &self.category {
            Some(category) => config.with_category(Category::new(category.as_str())),
            None => config,
        })
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Application domain
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Startup ordering policy for actions and responses
    #[serde(default)]
    pub gate: StartupGate,
    /// Driver selection
    #[serde(default)]
    pub cycle: CycleConfig,
    /// API location
    pub api: ApiConfig,
    /// Declared action configs
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

fn default_domain() -> String {
    "localhost".to_string()
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            gate: StartupGate::default(),
            cycle: CycleConfig::default(),
            api: ApiConfig::default(),
            actions: Vec::new(),
        }
    }
}

impl RecordsConfig {
    /// Parse and validate TOML.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Parse`] or any validation error.
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Io`] if the file cannot be read, otherwise as
    /// [`RecordsConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loading records configuration");
        Self::from_toml_str(&source)
    }

    /// Load the file named by `RECORD_RELAY_CONFIG`.
    ///
    /// # Errors
    ///
    /// [`SettingsError::EnvVarNotSet`] if the variable is unset, otherwise as
    /// [`RecordsConfig::load`].
    pub fn from_env() -> Result<Self, SettingsError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_err(|_| SettingsError::EnvVarNotSet(CONFIG_PATH_ENV))?;
        Self::load(path)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Validation`] naming the first offending field, or
    /// [`SettingsError::ActionConfig`] if two entries derive the same action type.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.cycle.drivers.api.is_empty() {
            return Err(SettingsError::Validation(
                "cycle.drivers.api cannot be empty".to_string(),
            ));
        }
        if self.api.host.is_empty() {
            return Err(SettingsError::Validation("api.host cannot be empty".to_string()));
        }
        if self.api.protocol.is_empty() {
            return Err(SettingsError::Validation(
                "api.protocol cannot be empty".to_string(),
            ));
        }
        self.lookup()?;
        Ok(())
    }

    /// Whether the configured API driver is supported.
    #[must_use]
    pub fn uses_http_driver(&self) -> bool {
        self.cycle.drivers.api == HTTP_DRIVER
    }

    /// The declared action configs.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Validation`] on an unknown verb.
    pub fn action_configs(&self) -> Result<Vec<ActionConfig>, SettingsError> {
        self.actions.iter().map(ActionEntry::to_action_config).collect()
    }

    /// The lookup table of the declared action configs; duplicates are rejected.
    ///
    /// # Errors
    ///
    /// As [`RecordsConfig::action_configs`], or
    /// [`SettingsError::ActionConfig`] on a duplicate action type.
    pub fn lookup(&self) -> Result<ActionConfigLookup, SettingsError> {
        Ok(ActionConfigLookup::try_from_configs(self.action_configs()?)?)
    }

    /// Overlay `other` on this configuration: scalar sections of `other` win,
    /// action entries are appended.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.domain = other.domain;
        self.gate = other.gate;
        self.cycle = other.cycle;
        self.api = other.api;
        self.actions.extend(other.actions);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        domain = "localhost"

        [cycle.drivers]
        api = "HTTP"

        [api]
        protocol = "http"
        host = "localhost"
        port = 8080
        root = "/api/"

        [[actions]]
        root = "sample"
        model = "cities"
        verb = "FETCH"
        scope = ["user"]

        [[actions]]
        root = "sample"
        model = "projectLocations"
        verb = "add"
        scope = ["user", "project"]
        category = "locations"
    "#;

    #[test]
    fn parses_sample() {
        let config = RecordsConfig::from_toml_str(SAMPLE).unwrap();
        assert!(config.uses_http_driver());
        assert_eq!(config.gate, StartupGate::Drop);
        assert_eq!(config.api.base_uri(), "http://localhost:8080/api");

        let lookup = config.lookup().unwrap();
        assert_eq!(lookup.len(), 6);
        let add = lookup.get("sample/projectLocations/ADD_REQUEST").unwrap();
        assert_eq!(add.category.as_str(), "locations");
        assert_eq!(add.verb, Verb::Add);
    }

    #[test]
    fn rejects_unknown_verb() {
        let source = SAMPLE.replace("\"add\"", "\"grab\"");
        assert!(matches!(
            RecordsConfig::from_toml_str(&source),
            Err(SettingsError::Validation(_))
        ));
    }

    #[test]
    fn rejects_duplicate_action_types() {
        let source = format!(
            "{SAMPLE}\n[[actions]]\nroot = \"sample\"\nmodel = \"cities\"\nverb = \"FETCH\"\n"
        );
        assert!(matches!(
            RecordsConfig::from_toml_str(&source),
            Err(SettingsError::ActionConfig(ConfigError::DuplicateActionType(_)))
        ));
    }

    #[test]
    fn rejects_empty_host() {
        let source = SAMPLE.replace("host = \"localhost\"", "host = \"\"");
        assert!(matches!(
            RecordsConfig::from_toml_str(&source),
            Err(SettingsError::Validation(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            RecordsConfig::load("/nonexistent/records.toml"),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    fn merge_prefers_later_sections() {
        let base = RecordsConfig::from_toml_str(SAMPLE).unwrap();
        let mut overlay = RecordsConfig::default();
        overlay.api.port = 9090;
        overlay.gate = StartupGate::Buffer;
        let merged = base.merge(overlay);
        assert_eq!(merged.api.port, 9090);
        assert_eq!(merged.gate, StartupGate::Buffer);
        assert_eq!(merged.actions.len(), 2);
    }
}
