//! Error types for the SWE Common data model.

use thiserror::Error;

/// Result type alias using SweError.
pub type Result<T> = std::result::Result<T, SweError>;

/// Errors raised by component trees and data blocks.
///
/// A scalar indexer that cannot reach its target under the current choice
/// selections is not an error; see [`crate::ScalarIndexer::data_index`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweError {
    // === Bounds ===
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid array size: {0}")]
    InvalidSize(i64),

    // === Structure ===
    #[error("array '{0}' has a fixed size and cannot be resized")]
    FixedSize(String),

    #[error("structure mismatch: {0}")]
    StructureMismatch(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    // === Lookup ===
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unresolved size reference '{0}'")]
    UnresolvedSizeReference(String),

    // === Definition ===
    #[error("invalid component: {0}")]
    InvalidComponent(String),
}

impl SweError {
    /// Create a StructureMismatch error.
    pub fn structure_mismatch(msg: impl Into<String>) -> Self {
        Self::StructureMismatch(msg.into())
    }

    /// Create an InvalidComponent error.
    pub fn invalid_component(msg: impl Into<String>) -> Self {
        Self::InvalidComponent(msg.into())
    }

    /// Create a TypeMismatch error.
    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// True for bounds errors (bad element or choice item index).
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, SweError::IndexOutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SweError::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "index 4 out of range (len 2)");

        let err = SweError::FixedSize("grid".to_string());
        assert!(err.to_string().contains("grid"));
        assert!(err.to_string().contains("fixed size"));
    }

    #[test]
    fn test_type_mismatch_helper() {
        let err = SweError::type_mismatch("double", "string");
        assert_eq!(
            err,
            SweError::TypeMismatch {
                expected: "double".to_string(),
                found: "string".to_string()
            }
        );
    }

    #[test]
    fn test_is_out_of_range() {
        assert!(SweError::IndexOutOfRange { index: 0, len: 0 }.is_out_of_range());
        assert!(!SweError::InvalidSize(-1).is_out_of_range());
    }
}
