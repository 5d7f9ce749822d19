//! Configuration for the promptbench application
//!
//! This module handles loading and managing configuration values: the
//! backend settings read from the environment, and the two persisted global
//! instructions (orchestrator persona and supervisor directive).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    APP_DIR_NAME, DEFAULT_IMAGE_MODEL, DEFAULT_MODEL, DEFAULT_ORCHESTRATOR_INSTRUCTION,
    DEFAULT_SUPERVISOR_INSTRUCTION,
};

/// Environment variables holding the API key, in lookup order
pub const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No API key found. Set one of: {}", API_KEY_VARS.join(", "))]
    MissingApiKey,

    #[error("No platform {0} directory available; pass an explicit path")]
    NoPlatformDir(&'static str),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed settings file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Application configuration structure
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Text model name (provider inferred from it)
    pub model: String,

    /// Image model name
    pub image_model: String,

    /// API key, if one was found
    pub api_key: Option<String>,

    /// Root of the local store
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            api_key: None,
            data_dir: default_data_dir(),
        }
    }

    /// Read the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::new();

        config.api_key = API_KEY_VARS.iter().find_map(|name| non_empty(name));
        if let Some(model) = non_empty("PROMPTBENCH_MODEL") {
            config.model = model;
        }
        if let Some(image_model) = non_empty("PROMPTBENCH_IMAGE_MODEL") {
            config.image_model = image_model;
        }
        if let Some(dir) = non_empty("PROMPTBENCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }

    /// The API key, or an error naming the variables that were checked
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".promptbench"))
}

/// Default location of the persisted instructions file
pub fn default_instructions_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("instructions.json"))
        .ok_or(ConfigError::NoPlatformDir("config"))
}

/// The two global instructions, persisted across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructions {
    /// System persona used for plan generation
    pub orchestrator: String,
    /// Directive prefixed to every system instruction
    pub supervisor: String,
    #[serde(skip)]
    path: PathBuf,
}

impl Instructions {
    /// Load from `path`, falling back to the defaults when the file is absent
    pub fn load_or_default(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut instructions = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<Instructions>(&text).map_err(|source| ConfigError::Json {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::defaults(),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        instructions.path = path;
        Ok(instructions)
    }

    fn defaults() -> Self {
        Self {
            orchestrator: DEFAULT_ORCHESTRATOR_INSTRUCTION.to_string(),
            supervisor: DEFAULT_SUPERVISOR_INSTRUCTION.to_string(),
            path: PathBuf::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_orchestrator(&mut self, text: impl Into<String>) -> Result<(), ConfigError> {
        self.orchestrator = text.into();
        self.save()
    }

    pub fn set_supervisor(&mut self, text: impl Into<String>) -> Result<(), ConfigError> {
        self.supervisor = text.into();
        self.save()
    }

    /// Restore both instructions to their defaults and persist them
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        let path = std::mem::take(&mut self.path);
        *self = Self::defaults();
        self.path = path;
        self.save()
    }

    fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, text).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn scratch(name: &str) -> PathBuf {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("target")
            .join("test-scratch")
            .join(format!("{}-{}", name, uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_env_lookup_order_and_defaults() {
        let vars: HashMap<&str, &str> = [("GOOGLE_API_KEY", "g"), ("API_KEY", "a"), ("GEMINI_API_KEY", " ")]
            .into_iter()
            .collect();
        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("g"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);

        let config = Config::from_lookup(|name| match name {
            "PROMPTBENCH_MODEL" => Some("gemini-2.5-pro".into()),
            "PROMPTBENCH_DATA_DIR" => Some("/tmp/pb".into()),
            _ => None,
        });
        assert!(config.require_api_key().is_err());
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pb"));
    }

    #[test]
    fn test_instructions_persist() {
        let path = scratch("instructions").join("nested").join("instructions.json");

        let mut instructions = Instructions::load_or_default(&path).unwrap();
        assert_eq!(instructions.orchestrator, DEFAULT_ORCHESTRATOR_INSTRUCTION);
        assert!(!path.exists());

        instructions.set_supervisor("Be terse.").unwrap();
        let reloaded = Instructions::load_or_default(&path).unwrap();
        assert_eq!(reloaded.supervisor, "Be terse.");
        assert_eq!(reloaded.orchestrator, DEFAULT_ORCHESTRATOR_INSTRUCTION);

        instructions.reset().unwrap();
        let reloaded = Instructions::load_or_default(&path).unwrap();
        assert_eq!(reloaded.supervisor, DEFAULT_SUPERVISOR_INSTRUCTION);
    }

    #[test]
    fn test_malformed_instructions_file() {
        let path = scratch("instructions-bad").join("instructions.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Instructions::load_or_default(&path),
            Err(ConfigError::Json { .. })
        ));
    }
}
