//! Error types for the readiness probe
//!
//! Builder arguments of the wrong dynamic type, non-object view-models and
//! unparseable probe configuration are the only failures. Polling never fails.

use thiserror::Error;

/// Main error type for probe operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// A builder argument had the wrong type
    #[error("Invalid argument `{argument}`: expected {expected}")]
    InvalidArgument {
        argument: &'static str,
        expected: &'static str,
    },

    /// A view-model was built from a value that is not an object
    #[error("Invalid view-model: expected object, got {0}")]
    InvalidViewModel(String),

    /// Probe configuration could not be deserialized
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProbeError {
    /// Create an invalid argument error
    pub fn invalid_argument(argument: &'static str, expected: &'static str) -> Self {
        ProbeError::InvalidArgument { argument, expected }
    }

    /// Create an invalid view-model error naming the rejected value's type
    pub fn invalid_view_model(found: impl Into<String>) -> Self {
        ProbeError::InvalidViewModel(found.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        ProbeError::Parse(msg.into())
    }

    /// Check if this error came from a wrongly typed argument
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ProbeError::InvalidArgument { .. })
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Parse(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ProbeError {
    fn from(err: serde_yaml::Error) -> Self {
        ProbeError::Parse(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for ProbeError {
    fn from(err: toml::de::Error) -> Self {
        ProbeError::Parse(format!("TOML error: {}", err))
    }
}

/// Result type alias for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;
