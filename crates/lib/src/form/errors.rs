//! Error types for form controller operations.
//!
//! Validation failures are never reported through these types; they land in
//! the form's error map. `FormError` covers failures of caller-supplied code
//! and misuse of the controller API.

use thiserror::Error;

/// Error returned from caller-supplied callbacks (submit handlers, loaders).
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for form operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FormError {
    /// The submit callback failed. Raised after the submit state has been
    /// finalized and published.
    #[error("Submit callback failed: {source}")]
    SubmitCallback {
        #[source]
        source: CallbackError,
    },

    /// The resolver could not run
    #[error("Resolver failed: {reason}")]
    Resolver { reason: String },

    /// The async default-values loader failed
    #[error("Loading default values failed: {source}")]
    DefaultValuesLoader {
        #[source]
        source: CallbackError,
    },

    /// An operation that needs a registered field was given an unknown path
    #[error("Field not registered: {name}")]
    FieldNotRegistered { name: String },
}

impl FormError {
    /// Check if this error came from a submit callback
    pub fn is_submit_error(&self) -> bool {
        matches!(self, FormError::SubmitCallback { .. })
    }

    /// Check if this error came from caller-supplied code
    pub fn is_callback_error(&self) -> bool {
        matches!(
            self,
            FormError::SubmitCallback { .. } | FormError::DefaultValuesLoader { .. }
        )
    }

    /// Check if this error is a missing field
    pub fn is_not_found(&self) -> bool {
        matches!(self, FormError::FieldNotRegistered { .. })
    }

    /// Get the field name if this error is about a specific field
    pub fn field(&self) -> Option<&str> {
        match self {
            FormError::FieldNotRegistered { name } => Some(name),
            _ => None,
        }
    }
}

impl From<FormError> for crate::Error {
    fn from(err: FormError) -> Self {
        crate::Error::Form(err)
    }
}
