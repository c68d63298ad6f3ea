//! # Identifier Validation
//!
//! Table, alias and column names are interpolated into SQL text by the
//! statement builder, so they are validated when templates are built.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where Validation Happens                             │
//! │                                                                         │
//! │  TableTemplates::for_table("parents", ...)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_identifier("table", "parents")  ← THIS MODULE                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sea-query templates (quoted identifiers)                              │
//! │                                                                         │
//! │  Values are never validated here: they travel as bound parameters.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Longest identifier accepted.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Validates a SQL identifier (table, alias or column name).
///
/// ## Rules
/// - Not empty
/// - At most [`MAX_IDENTIFIER_LEN`] characters
/// - ASCII letters, digits and `_` only
/// - Does not start with a digit
pub fn validate_identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if value.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "cannot start with a digit".to_string(),
        });
    }

    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "only letters, digits and underscores allowed".to_string(),
        });
    }

    Ok(())
}

/// Validates every identifier in a list.
pub fn validate_identifiers<'a>(
    field: &str,
    values: impl IntoIterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    values
        .into_iter()
        .try_for_each(|value| validate_identifier(field, value))
}

// =============================================================================
// Unit Tests
// =============================================================================
