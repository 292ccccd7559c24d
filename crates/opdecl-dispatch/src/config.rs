//! Registry configuration.
//!
//! ```toml
//! strip_debug_labels = false
//! warn_on_kernel_override = true
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs shared by a registry and the declaration code feeding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Replace every debug label with the empty string.
    pub strip_debug_labels: bool,

    /// Log a warning when a kernel shadows an earlier kernel for the same
    /// (operator, dispatch key) slot.
    pub warn_on_kernel_override: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strip_debug_labels: false,
            warn_on_kernel_override: true,
        }
    }
}

impl RegistryConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml { source })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = RegistryConfig::from_toml_str("strip_debug_labels = true\n").unwrap();
        assert!(config.strip_debug_labels);
        assert!(config.warn_on_kernel_override);

        let empty = RegistryConfig::from_toml_str("").unwrap();
        assert_eq!(empty, RegistryConfig::default());
    }

    #[test]
    fn wrong_types_are_rejected() {
        let err = RegistryConfig::from_toml_str("strip_debug_labels = \"yes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RegistryConfig::load("/definitely/not/here/opdecl.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
