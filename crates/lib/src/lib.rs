//!
//! Formstate: reactive form state and schema validation.
//! This library provides the core components for building form controllers in any UI host.
//!
//! ## Core Concepts
//!
//! Formstate is built around several key concepts:
//!
//! * **Values (`value::Value`)**: A dynamic value tree, the shape of every form's data. Opaque host handles and dates are kept as leaves.
//! * **Paths (`path::PathBuf`)**: Dotted field addresses such as `items.0.name`, used to read and write nested values.
//! * **Schemas (`schema::Schema`)**: Composable, immutable validators that parse a value into a typed result or a list of issues.
//! * **Resolvers (`resolver::Resolver`)**: Whole-form validation. `SchemaResolver` adapts a schema's issues into path-keyed field errors.
//! * **Form controllers (`form::FormControl`)**: Own a form's values and derived state, validate per configured mode and publish state snapshots:
//!     * **Field bindings (`form::FieldBinding`)**: Change and blur handlers for one registered field.
//!     * **Field arrays (`form::FieldArray`)**: Dynamic lists of fields with stable item ids.
//!     * **Subjects (`subject::Subject`)**: The publish/subscribe channels behind every subscription.

pub mod constants;
pub mod form;
pub mod path;
pub mod resolver;
pub mod schema;
pub mod subject;
pub mod value;

/// Re-export the most used types for easier access.
pub use form::{FieldError, FieldErrors, FormControl, FormOptions, FormState};
pub use schema::{Schema, SchemaExt};
pub use value::Value;

/// Result type used throughout the formstate library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the formstate library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured path errors from the path module
    #[error(transparent)]
    Path(path::PathError),

    /// Misuse of the schema engine
    #[error(transparent)]
    Schema(schema::SchemaError),

    /// A value failed schema validation
    #[error(transparent)]
    Validation(schema::ValidationError),

    /// Structured form errors from the form module
    #[error(transparent)]
    Form(form::FormError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Path(_) => "path",
            Error::Schema(_) => "schema",
            Error::Validation(_) => "schema",
            Error::Form(_) => "form",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a field was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Form(form_err) => form_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a validation failure of user input.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check if this error is misuse of the schema engine.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Error::Schema(_))
    }

    /// Check if this error is API misuse rather than a runtime failure.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Error::Schema(_) | Error::Path(_))
    }

    /// Check if this error is a failed submit callback.
    pub fn is_submit_error(&self) -> bool {
        match self {
            Error::Form(form_err) => form_err.is_submit_error(),
            _ => false,
        }
    }

    /// Check if this error came from caller-supplied code.
    pub fn is_callback_error(&self) -> bool {
        match self {
            Error::Form(form_err) => form_err.is_callback_error(),
            _ => false,
        }
    }

    /// Check if this error is form-related.
    pub fn is_form_error(&self) -> bool {
        matches!(self, Error::Form(_))
    }

    /// Get the validation error, if this is one.
    pub fn validation_error(&self) -> Option<&schema::ValidationError> {
        match self {
            Error::Validation(err) => Some(err),
            _ => None,
        }
    }
}
