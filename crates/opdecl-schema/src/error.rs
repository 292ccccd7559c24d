//! Error types for schema-string parsing.

/// Errors raised while parsing operator names or schema strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaParseError {
    /// The operator name part is not a valid (optionally namespaced) identifier.
    #[error("invalid operator name `{input}`: {reason}")]
    InvalidName { input: String, reason: String },

    /// The argument list or return list could not be parsed.
    #[error("malformed schema `{input}`: {reason}")]
    Malformed { input: String, reason: String },

    /// A dispatch key or alias-analysis kind string was not recognized.
    #[error("unknown {what}: {value}")]
    UnknownVariant { what: &'static str, value: String },
}

impl SchemaParseError {
    pub(crate) fn invalid_name(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
