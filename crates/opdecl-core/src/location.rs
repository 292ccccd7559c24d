//! Source locations and debug labels.

use opdecl_dispatch::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a declaration block was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Label attached to a registration for diagnostics and revocation logs.
///
/// A caller-supplied note wins; otherwise the block's location is used.
/// Stripped configurations always get the empty string.
pub fn debug_label(note: &str, location: &SourceLocation, config: &RegistryConfig) -> String {
    if config.strip_debug_labels {
        String::new()
    } else if note.is_empty() {
        format!("registered at {location}")
    } else {
        note.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_overrides_location() {
        let location = SourceLocation::new("src/ops.rs", 42);
        let config = RegistryConfig::default();
        assert_eq!(
            debug_label("", &location, &config),
            "registered at src/ops.rs:42"
        );
        assert_eq!(debug_label("fused add", &location, &config), "fused add");
    }

    #[test]
    fn stripped_labels_are_empty() {
        let location = SourceLocation::new("src/ops.rs", 42);
        let config = RegistryConfig {
            strip_debug_labels: true,
            ..RegistryConfig::default()
        };
        assert_eq!(debug_label("", &location, &config), "");
        assert_eq!(debug_label("fused add", &location, &config), "");
    }
}
