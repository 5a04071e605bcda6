//! Error types for schema bindings and data codecs.

use swe_common::SweError;
use thiserror::Error;

/// Result type alias using BindingError.
pub type Result<T> = std::result::Result<T, BindingError>;

/// Errors raised while reading or writing schemas and data streams.
#[derive(Debug, Error)]
pub enum BindingError {
    // === Data Model Errors ===
    #[error(transparent)]
    Model(#[from] SweError),

    // === Wire Format Errors ===
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Array size {size} exceeds the limit of {limit}")]
    SizeLimitExceeded { size: usize, limit: usize },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // === Underlying Library Errors ===
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BindingError {
    /// Create a Parse error.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an InvalidSchema error.
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }
}

impl From<quick_xml::events::attributes::AttrError> for BindingError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}
