//! Structured validation errors
//!
//! Validation reports every violated field, not just the first, so a
//! caller can fix a whole parameter set in one pass.

use std::fmt;

/// A single violated field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted path to the field, e.g. `runtime_context.env_vars`.
    pub path: String,
    /// The constraint that was expected to hold.
    pub expected: String,
    /// Description of the value actually found.
    pub actual: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.path, self.expected, self.actual
        )
    }
}

/// One or more schema violations for a candidate value.
///
/// Produced before any provider code runs; providers never see invalid
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Creates an error from collected violations.
    ///
    /// Callers must pass at least one violation; an empty list means
    /// validation succeeded and no error should exist.
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        debug_assert!(!violations.is_empty());
        Self { violations }
    }

    /// Whether a particular field path is among the violations.
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed ({} violation(s))", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "; {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
