//! Configuration types for the Égua tutor.
//!
//! This module provides the configuration structures that control where
//! lessons and progress live, where the HTTP API binds, and which
//! generative-feedback provider is used.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "egua.json";

/// Default progress store path.
fn default_store_file() -> String {
    ".egua/progress.json".to_string()
}

/// Default bind address for the HTTP API.
fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Default port for the HTTP API.
const fn default_port() -> u16 {
    3000
}

/// Default model used for feedback generation.
fn default_model() -> String {
    "gemini-pro".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default generative-language API root.
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

/// Main configuration for the tutor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to a lessons JSON file. The built-in catalog is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessons: Option<String>,

    /// Path to the JSON progress store.
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// Bind address for the HTTP API.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP API.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Generative feedback settings.
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lessons: None,
            store_file: default_store_file(),
            host: default_host(),
            port: default_port(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `egua.json` in the current directory and falls back to the
    /// default configuration when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            TutorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `egua.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `TutorError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., zero port, empty paths).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TutorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TutorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.store_file.trim().is_empty() {
            return Err(TutorError::config_validation(
                "storeFile must not be empty",
                "Provide a progress store path in your egua.json (e.g. '.egua/progress.json')",
            ));
        }

        if self
            .lessons
            .as_deref()
            .is_some_and(|lessons| lessons.trim().is_empty())
        {
            return Err(TutorError::config_validation(
                "lessons path must not be empty",
                "Remove the lessons field to use the built-in lessons, or point it at a file",
            ));
        }

        if self.host.trim().is_empty() {
            return Err(TutorError::config_validation(
                "host must not be empty",
                "Set host to an address such as '127.0.0.1' in your egua.json",
            ));
        }

        if self.port == 0 {
            return Err(TutorError::config_validation(
                "port must be greater than 0",
                "Set port to a free TCP port in your egua.json",
            ));
        }

        self.feedback.validate()
    }
}

/// Generative feedback providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedbackProvider {
    /// Google Gemini (default).
    #[default]
    Gemini,
    /// No generative feedback; mismatched runs report feedback as unavailable.
    Disabled,
}

impl FeedbackProvider {
    /// Parses a string into a `FeedbackProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for FeedbackProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid feedback provider '{s}': expected one of 'gemini', 'disabled'"
            ))
        })
    }
}

impl Serialize for FeedbackProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Gemini => "gemini",
            Self::Disabled => "disabled",
        };
        serializer.serialize_str(s)
    }
}

/// Settings for the generative feedback call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackConfig {
    /// Which provider generates feedback.
    #[serde(default)]
    pub provider: FeedbackProvider,

    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Root URL of the provider's API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            provider: FeedbackProvider::default(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
        }
    }
}

impl FeedbackConfig {
    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TutorError::config_validation(
                "feedback.model must not be empty",
                "Set feedback.model (e.g. 'gemini-pro') in your egua.json",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(TutorError::config_validation(
                "feedback.apiKeyEnv must not be empty",
                "Set feedback.apiKeyEnv to the variable holding your key (e.g. 'GEMINI_API_KEY')",
            ));
        }

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(TutorError::config_validation(
                format!("feedback.baseUrl must be an http(s) URL, got '{}'", self.base_url),
                "Set feedback.baseUrl to 'https://generativelanguage.googleapis.com' or remove it",
            ));
        }

        Ok(())
    }

    /// Reads the API key from the configured environment variable.
    ///
    /// Returns `None` when the variable is unset or blank.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
