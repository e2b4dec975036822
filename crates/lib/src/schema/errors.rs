//! Error types for the schema engine.
//!
//! Validation failures are not errors in this sense: they are reported as
//! [`Issue`](super::Issue)s inside a [`ValidationError`]. [`SchemaError`]
//! covers misuse of the API, which must never be folded into a validation
//! outcome.

use thiserror::Error;

use super::issue::ValidationError;

/// Programmer errors raised by schema construction or parsing.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    /// An async refinement or transform was reached by a synchronous parse
    #[error("async {node} encountered during a synchronous parse, use the async parse entry points")]
    AsyncInSyncParse { node: &'static str },

    /// A discriminated union could not build its dispatch table
    #[error("invalid discriminated union on '{discriminator}': {reason}")]
    InvalidDiscriminatedUnion {
        discriminator: String,
        reason: String,
    },
}

impl SchemaError {
    /// Check if this error is a sync/async mismatch
    pub fn is_async_misuse(&self) -> bool {
        matches!(self, SchemaError::AsyncInSyncParse { .. })
    }

    /// Check if this error was raised while building a schema
    pub fn is_construction_error(&self) -> bool {
        matches!(self, SchemaError::InvalidDiscriminatedUnion { .. })
    }
}

/// Failure of [`Schema::parse`](super::Schema::parse).
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    /// The input failed validation
    #[error(transparent)]
    Invalid(ValidationError),

    /// The schema was used incorrectly
    #[error(transparent)]
    Schema(SchemaError),
}

impl ParseError {
    /// Check if this error is a validation failure rather than misuse
    pub fn is_invalid(&self) -> bool {
        matches!(self, ParseError::Invalid(_))
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            ParseError::Invalid(err) => Some(err),
            ParseError::Schema(_) => None,
        }
    }
}

impl From<ValidationError> for ParseError {
    fn from(err: ValidationError) -> Self {
        ParseError::Invalid(err)
    }
}

impl From<SchemaError> for ParseError {
    fn from(err: SchemaError) -> Self {
        ParseError::Schema(err)
    }
}

// Conversions into the crate error
impl From<SchemaError> for crate::Error {
    fn from(err: SchemaError) -> Self {
        crate::Error::Schema(err)
    }
}

impl From<ValidationError> for crate::Error {
    fn from(err: ValidationError) -> Self {
        crate::Error::Validation(err)
    }
}

impl From<ParseError> for crate::Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Invalid(err) => crate::Error::Validation(err),
            ParseError::Schema(err) => crate::Error::Schema(err),
        }
    }
}
