//! The issue model produced by schema validation.
//!
//! Every failed check produces one [`Issue`] carrying the path of the
//! offending value, a structured [`IssueCode`] and a human readable message.
//! Messages come from, in order of precedence: a message attached to the
//! check itself, the [`ErrorMap`] supplied in the parse parameters, and the
//! built-in defaults in [`default_message`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::Serialize;

use crate::{
    path::{PathBuf, Segment},
    value::{Value, ValueType},
};

/// What a size constraint was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeKind {
    String,
    Number,
    Bigint,
    Array,
    Set,
    Date,
}

/// Which string format check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StringValidation {
    Email,
    Url,
    Uuid,
    Regex,
    Datetime,
    StartsWith(String),
    EndsWith(String),
    Includes(String),
}

/// Structured reason for an issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType {
        expected: String,
        received: ValueType,
    },
    InvalidLiteral {
        expected: Value,
    },
    Custom {
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    InvalidUnion {
        union_errors: Vec<Vec<Issue>>,
    },
    InvalidUnionDiscriminator {
        options: Vec<Value>,
    },
    InvalidEnumValue {
        options: Vec<Value>,
        received: Value,
    },
    UnrecognizedKeys {
        keys: Vec<String>,
    },
    InvalidDate,
    InvalidString {
        validation: StringValidation,
    },
    TooSmall {
        kind: SizeKind,
        minimum: f64,
        inclusive: bool,
        exact: bool,
    },
    TooBig {
        kind: SizeKind,
        maximum: f64,
        inclusive: bool,
        exact: bool,
    },
    InvalidIntersectionTypes,
    NotMultipleOf {
        multiple_of: f64,
    },
    NotFinite,
}

impl IssueCode {
    /// Returns the snake_case name of the code.
    pub fn name(&self) -> &'static str {
        match self {
            IssueCode::InvalidType { .. } => "invalid_type",
            IssueCode::InvalidLiteral { .. } => "invalid_literal",
            IssueCode::Custom { .. } => "custom",
            IssueCode::InvalidUnion { .. } => "invalid_union",
            IssueCode::InvalidUnionDiscriminator { .. } => "invalid_union_discriminator",
            IssueCode::InvalidEnumValue { .. } => "invalid_enum_value",
            IssueCode::UnrecognizedKeys { .. } => "unrecognized_keys",
            IssueCode::InvalidDate => "invalid_date",
            IssueCode::InvalidString { .. } => "invalid_string",
            IssueCode::TooSmall { .. } => "too_small",
            IssueCode::TooBig { .. } => "too_big",
            IssueCode::InvalidIntersectionTypes => "invalid_intersection_types",
            IssueCode::NotMultipleOf { .. } => "not_multiple_of",
            IssueCode::NotFinite => "not_finite",
        }
    }

    /// Shape errors describe a structural mismatch between input and schema.
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            IssueCode::InvalidType { .. }
                | IssueCode::InvalidLiteral { .. }
                | IssueCode::UnrecognizedKeys { .. }
                | IssueCode::InvalidUnion { .. }
                | IssueCode::InvalidUnionDiscriminator { .. }
                | IssueCode::InvalidEnumValue { .. }
                | IssueCode::InvalidIntersectionTypes
        )
    }

    /// Returns true for `invalid_type` with an undefined input, i.e. a missing value.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            IssueCode::InvalidType {
                received: ValueType::Undefined,
                ..
            }
        )
    }
}

/// One structured validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    #[serde(flatten)]
    pub code: IssueCode,
    pub path: Vec<Segment>,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fatal: bool,
}

impl Issue {
    /// Returns the issue path in dotted form.
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from_segments(&self.path)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path_buf(), self.message)
        }
    }
}

/// Message override hook threaded into a parse through its parameters.
///
/// The hook receives the issue code and the offending input; returning `None`
/// falls back to the built-in message.
#[derive(Clone)]
pub struct ErrorMap(Arc<dyn Fn(&IssueCode, &Value) -> Option<String> + Send + Sync>);

impl ErrorMap {
    pub fn new<F>(map: F) -> Self
    where
        F: Fn(&IssueCode, &Value) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(map))
    }

    /// Resolves the message for an issue.
    pub fn message(&self, code: &IssueCode, input: &Value) -> String {
        (self.0)(code, input).unwrap_or_else(|| default_message(code, input))
    }
}

impl Default for ErrorMap {
    fn default() -> Self {
        Self::new(|_, _| None)
    }
}

impl fmt::Debug for ErrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorMap(..)")
    }
}

fn quote_join(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => format!("'{s}'"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn plural(n: f64, unit: &str) -> String {
    if n == 1.0 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}(s)")
    }
}

/// The built-in English message for an issue.
pub fn default_message(code: &IssueCode, _input: &Value) -> String {
    match code {
        IssueCode::InvalidType {
            received: ValueType::Undefined,
            ..
        } => "Required".to_string(),
        IssueCode::InvalidType { expected, received } => {
            format!("Expected {expected}, received {received}")
        }
        IssueCode::InvalidLiteral { expected } => {
            format!("Invalid literal value, expected {}", expected.to_json())
        }
        IssueCode::UnrecognizedKeys { keys } => format!(
            "Unrecognized key(s) in object: {}",
            keys.iter()
                .map(|k| format!("'{k}'"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        IssueCode::InvalidUnion { .. } => "Invalid input".to_string(),
        IssueCode::InvalidUnionDiscriminator { options } => {
            format!("Invalid discriminator value. Expected {}", quote_join(options))
        }
        IssueCode::InvalidEnumValue { options, received } => format!(
            "Invalid enum value. Expected {}, received {}",
            quote_join(options),
            quote_join(std::slice::from_ref(received))
        ),
        IssueCode::InvalidDate => "Invalid date".to_string(),
        IssueCode::InvalidString { validation } => match validation {
            StringValidation::StartsWith(prefix) => {
                format!("Invalid input: must start with \"{prefix}\"")
            }
            StringValidation::EndsWith(suffix) => {
                format!("Invalid input: must end with \"{suffix}\"")
            }
            StringValidation::Includes(needle) => {
                format!("Invalid input: must include \"{needle}\"")
            }
            StringValidation::Regex => "Invalid".to_string(),
            StringValidation::Email => "Invalid email".to_string(),
            StringValidation::Url => "Invalid url".to_string(),
            StringValidation::Uuid => "Invalid uuid".to_string(),
            StringValidation::Datetime => "Invalid datetime".to_string(),
        },
        IssueCode::TooSmall {
            kind,
            minimum,
            inclusive,
            exact,
        } => {
            let bound = |exactly: &str, inclusive_word: &str, exclusive_word: &str| {
                if *exact {
                    exactly.to_string()
                } else if *inclusive {
                    inclusive_word.to_string()
                } else {
                    exclusive_word.to_string()
                }
            };
            match kind {
                SizeKind::Array | SizeKind::Set => format!(
                    "{} must contain {} {}",
                    if *kind == SizeKind::Array { "Array" } else { "Set" },
                    bound("exactly", "at least", "more than"),
                    plural(*minimum, "element")
                ),
                SizeKind::String => format!(
                    "String must contain {} {}",
                    bound("exactly", "at least", "over"),
                    plural(*minimum, "character")
                ),
                SizeKind::Number | SizeKind::Bigint => format!(
                    "Number must be {}{minimum}",
                    bound("exactly equal to ", "greater than or equal to ", "greater than ")
                ),
                SizeKind::Date => format!(
                    "Date must be {}{}",
                    bound("exactly equal to ", "greater than or equal to ", "greater than "),
                    format_millis(*minimum)
                ),
            }
        }
        IssueCode::TooBig {
            kind,
            maximum,
            inclusive,
            exact,
        } => {
            let bound = |exactly: &str, inclusive_word: &str, exclusive_word: &str| {
                if *exact {
                    exactly.to_string()
                } else if *inclusive {
                    inclusive_word.to_string()
                } else {
                    exclusive_word.to_string()
                }
            };
            match kind {
                SizeKind::Array | SizeKind::Set => format!(
                    "{} must contain {} {}",
                    if *kind == SizeKind::Array { "Array" } else { "Set" },
                    bound("exactly", "at most", "less than"),
                    plural(*maximum, "element")
                ),
                SizeKind::String => format!(
                    "String must contain {} {}",
                    bound("exactly", "at most", "under"),
                    plural(*maximum, "character")
                ),
                SizeKind::Number | SizeKind::Bigint => format!(
                    "Number must be {}{maximum}",
                    bound("exactly equal to ", "less than or equal to ", "less than ")
                ),
                SizeKind::Date => format!(
                    "Date must be {}{}",
                    bound("exactly equal to ", "smaller than or equal to ", "smaller than "),
                    format_millis(*maximum)
                ),
            }
        }
        IssueCode::Custom { .. } => "Invalid input".to_string(),
        IssueCode::InvalidIntersectionTypes => {
            "Intersection results could not be merged".to_string()
        }
        IssueCode::NotMultipleOf { multiple_of } => {
            format!("Number must be a multiple of {multiple_of}")
        }
        IssueCode::NotFinite => "Number must be finite".to_string(),
    }
}

fn format_millis(millis: f64) -> String {
    chrono::DateTime::from_timestamp_millis(millis as i64)
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

/// Issues flattened into form-level and per-field message lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlattenedErrors {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

/// A failed parse: the ordered list of issues it produced.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{}", render_issues(.issues))]
pub struct ValidationError {
    issues: Vec<Issue>,
}

fn render_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// The issues in the order they were produced.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    /// Groups messages by the first path segment; path-less issues become
    /// form errors.
    pub fn flatten(&self) -> FlattenedErrors {
        let mut flattened = FlattenedErrors::default();
        for issue in &self.issues {
            match issue.path.first() {
                Some(first) => flattened
                    .field_errors
                    .entry(first.to_string())
                    .or_default()
                    .push(issue.message.clone()),
                None => flattened.form_errors.push(issue.message.clone()),
            }
        }
        flattened
    }
}
