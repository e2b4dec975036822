//! Constants used throughout the formstate library.
//!
//! Central definitions for reserved error keys, rule names and event names.

/// Error key for issues that belong to a parent path rather than a field.
///
/// Form-level issues are stored under `root`; a parent path that has child
/// fields stores its own error under `<path>.root`.
pub const ROOT_ERROR_KEY: &str = "root";

/// Error kind for a custom validator registered without a name.
pub const DEFAULT_VALIDATOR_NAME: &str = "validate";

/// Built-in rule names, used as field error kinds.
pub mod rule {
    pub const REQUIRED: &str = "required";
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";
    pub const MIN_LENGTH: &str = "minLength";
    pub const MAX_LENGTH: &str = "maxLength";
    pub const PATTERN: &str = "pattern";
}

/// Event names carried by value-change notifications.
pub mod event {
    pub const CHANGE: &str = "change";
}
