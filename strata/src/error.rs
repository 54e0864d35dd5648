//! Error types for the strata library.
//!
//! This module provides a comprehensive error hierarchy for all operations
//! in the strata library, using `thiserror` for ergonomic error handling.

use std::path::PathBuf;

use thiserror::Error;

use crate::registry::Scope;

/// Result type alias for operations that may fail with a strata error.
///
/// # Examples
///
/// ```
/// use strata::{Error, Result};
///
/// fn example_operation() -> Result<u32> {
///     Ok(4)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the strata library.
///
/// This enum encompasses all possible error conditions that can occur
/// during configuration resolution and persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// The key is neither registered nor present in any layer.
    #[error("key '{key}' not found in any configuration layer")]
    NotFound {
        /// The dotted key path that was requested.
        key: String,
    },

    /// A write was rejected by the key's scope constraint.
    #[error("key '{key}' may not be set in the {scope} scope")]
    ForbiddenInScope {
        /// The dotted key path that was rejected.
        key: String,
        /// The scope the write targeted.
        scope: Scope,
    },

    /// A value did not match the key's registered kind.
    #[error("key '{key}' expects a {expected} value, got {actual}")]
    TypeMismatch {
        /// The dotted key path that was validated.
        key: String,
        /// The kind the registry expects.
        expected: String,
        /// The kind of the supplied value.
        actual: String,
    },

    /// A value is not a member of the key's enumerated set.
    #[error("key '{key}' does not allow '{value}' (allowed: {})", allowed.join(", "))]
    EnumMismatch {
        /// The dotted key path that was validated.
        key: String,
        /// The rejected value.
        value: String,
        /// The allowed enum members, in registry order.
        allowed: Vec<String>,
    },

    /// A value did not match the key's validation pattern.
    #[error("key '{key}' value '{value}' does not match pattern {pattern}")]
    PatternMismatch {
        /// The dotted key path that was validated.
        key: String,
        /// The rejected value.
        value: String,
        /// The pattern the value must match.
        pattern: String,
    },

    /// A path traversal found a scalar where a container was expected,
    /// or would silently replace a container with a scalar.
    #[error("cannot traverse '{path}': segment '{segment}' {reason}")]
    TraversalConflict {
        /// The full dotted path being traversed.
        path: String,
        /// The segment where traversal stopped.
        segment: String,
        /// Why the traversal failed.
        reason: String,
    },

    /// The Local store is missing keys its scope constraint requires.
    #[error("local store is missing required key(s): {}", keys.join(", "))]
    MissingRequiredKeys {
        /// The required dotted key paths that are absent, sorted.
        keys: Vec<String>,
    },

    /// A store file exists but could not be read or parsed.
    #[error("cannot read store {}: {reason}", path.display())]
    StoreUnreadable {
        /// Path to the backing file.
        path: PathBuf,
        /// The reason the read failed.
        reason: String,
    },

    /// A store file could not be written.
    #[error("cannot write store {}: {reason}", path.display())]
    StoreUnwritable {
        /// Path to the backing file.
        path: PathBuf,
        /// The reason the write failed.
        reason: String,
    },

    /// A registry-construction or other validation error occurred.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// A description of the validation failure.
        message: String,
    },
}

impl Error {
    /// Check if error indicates a missing key.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::Error;
    ///
    /// let err = Error::NotFound { key: "build-jobs".into() };
    /// assert!(err.is_not_found());
    /// ```
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error is a value-validation failure (type, enum, or pattern).
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::Error;
    ///
    /// let err = Error::TypeMismatch {
    ///     key: "build-jobs".into(),
    ///     expected: "number".into(),
    ///     actual: "string".into(),
    /// };
    /// assert!(err.is_invalid_value());
    /// ```
    #[must_use]
    pub fn is_invalid_value(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::EnumMismatch { .. } | Self::PatternMismatch { .. }
        )
    }
}
