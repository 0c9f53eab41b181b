//! `quill.toml` loading

use std::fs;
use std::path::Path;

use quill_hierarchy::AnalysisOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::options::DispatchOptions;

/// Errors that can occur while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but inconsistent
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Combined analysis and code generation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    /// Hierarchy analysis
    pub analysis: AnalysisOptions,
    /// Dispatch table generation
    pub dispatch: DispatchOptions,
}

impl QuillConfig {
    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading config");
        Self::from_toml_str(&content)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: QuillConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.analysis.max_resolution_rounds == 0 {
            return Err(ConfigError::Invalid(
                "analysis.max_resolution_rounds must be at least 1".to_string(),
            ));
        }
        if self.dispatch.id_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "dispatch.id_prefix cannot be empty".to_string(),
            ));
        }
        if self.dispatch.naming.class.is_empty() {
            return Err(ConfigError::Invalid(
                "dispatch.naming.class cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = QuillConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuillConfig::default());
    }

    #[test]
    fn test_parse_sections() {
        let toml = r#"
[analysis]
all_volatile = true
dynamic_classes = ["Plugin"]

[dispatch]
flatten_invoke = true
invoke_few_args_count = 3
"#;
        let config = QuillConfig::from_toml_str(toml).unwrap();
        assert!(config.analysis.all_volatile);
        assert!(config.analysis.is_dynamic_class("plugin"));
        assert_eq!(config.analysis.max_resolution_rounds, 64);
        assert!(config.dispatch.flatten_invoke);
        assert_eq!(config.dispatch.invoke_few_args_count, 3);
        assert_eq!(config.dispatch.id_prefix, "$$");
    }

    #[test]
    fn test_invalid_rounds() {
        let result = QuillConfig::from_toml_str("[analysis]\nmax_resolution_rounds = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = QuillConfig::from_toml_str("[dispatch\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
