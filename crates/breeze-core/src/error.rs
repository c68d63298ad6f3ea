//! # Error Types
//!
//! Error types for breeze-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  breeze-core errors (this file)                                        │
//! │  ├── CoreError        - Option parsing failures                        │
//! │  └── ValidationError  - Bad table / column identifiers                 │
//! │                                                                         │
//! │  breeze-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while interpreting transaction options or identifiers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Isolation level text is not one of the four known levels.
    ///
    /// ## When This Occurs
    /// - Config file contains `"snapshot"` or a typo like `"read comitted"`
    #[error("Unknown isolation level: '{0}'")]
    UnknownIsolationLevel(String),

    /// Access mode text is neither `read write` nor `read only`.
    #[error("Unknown access mode: '{0}'")]
    UnknownAccessMode(String),

    /// Deferrable mode text is neither `deferrable` nor `not deferrable`.
    #[error("Unknown deferrable mode: '{0}'")]
    UnknownDeferrableMode(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Identifier validation errors.
///
/// Table, alias and column names end up in SQL text, so they are checked
/// before any statement template is built.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required identifier is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Identifier is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., starts with a digit, contains spaces).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnknownIsolationLevel("snapshot".to_string());
        assert_eq!(err.to_string(), "Unknown isolation level: 'snapshot'");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "table".to_string(),
        };
        assert_eq!(err.to_string(), "table is required");

        let err = ValidationError::TooLong {
            field: "column".to_string(),
            max: 63,
        };
        assert_eq!(err.to_string(), "column must be at most 63 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "table".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
