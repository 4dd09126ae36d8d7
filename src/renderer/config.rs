//! Configuration for rendering

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read render config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse render config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// What a slot shows after its asynchronous source fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsyncErrorPolicy {
    /// Leave the last successfully rendered content in place
    #[default]
    KeepContent,
    /// Empty the slot
    ClearContent,
}

/// Configuration options for a [`Renderer`](crate::Renderer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// How deep nested template instances may go before rendering fails
    pub max_depth: usize,

    pub async_errors: AsyncErrorPolicy,
}

/// TOML structure for deserializing configs
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TomlRenderConfig {
    max_depth: Option<usize>,
    async_errors: Option<AsyncErrorPolicy>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            async_errors: AsyncErrorPolicy::KeepContent,
        }
    }
}

impl RenderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nested instance depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the policy for failed asynchronous sources
    pub fn with_async_errors(mut self, policy: AsyncErrorPolicy) -> Self {
        self.async_errors = policy;
        self
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlRenderConfig = toml::from_str(content)?;
        let defaults = Self::default();

        Ok(RenderConfig {
            max_depth: parsed.max_depth.unwrap_or(defaults.max_depth),
            async_errors: parsed.async_errors.unwrap_or(defaults.async_errors),
        })
    }
}
