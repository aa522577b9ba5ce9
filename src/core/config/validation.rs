//! Validation helper functions for configuration types.

use globset::Glob;

use crate::core::errors::{PkgshiftError, Result};

/// Validate that a usize value is greater than zero.
pub fn validate_positive_usize(value: usize, field: &str) -> Result<()> {
    if value == 0 {
        return Err(PkgshiftError::validation_field(
            format!("{} must be greater than 0", field),
            field,
        ));
    }
    Ok(())
}

/// Validate that a string can appear inside a Go identifier.
///
/// Empty strings are accepted (an unset prefix).
pub fn validate_go_identifier_fragment(value: &str, field: &str) -> Result<()> {
    if value
        .chars()
        .all(|c| c == '_' || c.is_alphanumeric())
    {
        return Ok(());
    }

    Err(PkgshiftError::validation_field(
        format!(
            "{} must contain only letters, digits and underscores (got '{}')",
            field, value
        ),
        field,
    ))
}

/// Validate that every pattern compiles as a glob.
pub fn validate_glob_patterns(patterns: &[String], field: &str) -> Result<()> {
    for pattern in patterns {
        if let Err(err) = Glob::new(pattern) {
            return Err(PkgshiftError::validation_field(
                format!("{} contains invalid glob '{}': {}", field, pattern, err),
                field,
            ));
        }
    }
    Ok(())
}
