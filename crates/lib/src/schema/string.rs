//! String schema: type check, ordered checks and in-place normalizers.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;

use crate::value::Value;

use super::{
    Check, TypeMessages,
    context::{ParseContext, ParseResult, ParseStatus},
    issue::{IssueCode, SizeKind, StringValidation},
};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("EMAIL_RE failed")
});

#[derive(Debug, Clone)]
pub(crate) enum StringCheck {
    Min(usize),
    Max(usize),
    Length(usize),
    Email,
    Url,
    Uuid,
    Regex(Regex),
    Datetime { offset: bool },
    StartsWith(String),
    EndsWith(String),
    Includes(String),
    Trim,
    ToLowerCase,
    ToUpperCase,
}

/// Validates strings.
///
/// ```
/// # use formstate::schema::{string, SchemaExt};
/// let schema = string().trim().min(3).message("Too short").into_schema();
/// assert!(schema.safe_parse(&"  abc ".into()).unwrap().is_success());
/// assert!(!schema.safe_parse(&"ab".into()).unwrap().is_success());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StringSchema {
    pub(crate) checks: Vec<Check<StringCheck>>,
    pub(crate) coerce: bool,
    pub(crate) messages: TypeMessages,
}

impl StringSchema {
    fn check(mut self, kind: StringCheck) -> Self {
        self.checks.push(Check::new(kind));
        self
    }

    /// Converts any input to its string form before validating.
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    /// Overrides the message of the most recently added check.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.checks.last_mut() {
            last.message = Some(message.into());
        }
        self
    }

    pub fn min(self, len: usize) -> Self {
        self.check(StringCheck::Min(len))
    }

    pub fn max(self, len: usize) -> Self {
        self.check(StringCheck::Max(len))
    }

    pub fn length(self, len: usize) -> Self {
        self.check(StringCheck::Length(len))
    }

    pub fn nonempty(self) -> Self {
        self.min(1)
    }

    pub fn email(self) -> Self {
        self.check(StringCheck::Email)
    }

    pub fn url(self) -> Self {
        self.check(StringCheck::Url)
    }

    pub fn uuid(self) -> Self {
        self.check(StringCheck::Uuid)
    }

    pub fn regex(self, pattern: Regex) -> Self {
        self.check(StringCheck::Regex(pattern))
    }

    /// RFC 3339 timestamp in UTC (`Z` suffix).
    pub fn datetime(self) -> Self {
        self.check(StringCheck::Datetime { offset: false })
    }

    /// RFC 3339 timestamp with any UTC offset.
    pub fn datetime_with_offset(self) -> Self {
        self.check(StringCheck::Datetime { offset: true })
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Self {
        self.check(StringCheck::StartsWith(prefix.into()))
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Self {
        self.check(StringCheck::EndsWith(suffix.into()))
    }

    pub fn includes(self, needle: impl Into<String>) -> Self {
        self.check(StringCheck::Includes(needle.into()))
    }

    pub fn trim(self) -> Self {
        self.check(StringCheck::Trim)
    }

    pub fn to_lowercase(self) -> Self {
        self.check(StringCheck::ToLowerCase)
    }

    pub fn to_uppercase(self) -> Self {
        self.check(StringCheck::ToUpperCase)
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        let mut text = match (input, self.coerce) {
            (Value::String(s), _) => s.clone(),
            (other, true) => other.to_string(),
            (other, false) => {
                self.messages.invalid_type(ctx, "string", other);
                return ParseResult::Aborted;
            }
        };

        let mut status = ParseStatus::Valid;
        for check in &self.checks {
            let failure = match &check.kind {
                StringCheck::Trim => {
                    text = text.trim().to_string();
                    None
                }
                StringCheck::ToLowerCase => {
                    text = text.to_lowercase();
                    None
                }
                StringCheck::ToUpperCase => {
                    text = text.to_uppercase();
                    None
                }
                kind => failed_check(kind, &text),
            };
            if let Some(code) = failure {
                ctx.add_issue(code, input, check.message.as_deref());
                status.dirty();
                if ctx.first_error_only() {
                    break;
                }
            }
        }
        status.into_result(Value::String(text))
    }
}

fn invalid(validation: StringValidation) -> Option<IssueCode> {
    Some(IssueCode::InvalidString { validation })
}

fn failed_check(kind: &StringCheck, text: &str) -> Option<IssueCode> {
    let len = text.chars().count();
    match kind {
        StringCheck::Min(min) if len < *min => Some(IssueCode::TooSmall {
            kind: SizeKind::String,
            minimum: *min as f64,
            inclusive: true,
            exact: false,
        }),
        StringCheck::Max(max) if len > *max => Some(IssueCode::TooBig {
            kind: SizeKind::String,
            maximum: *max as f64,
            inclusive: true,
            exact: false,
        }),
        StringCheck::Length(exact) if len > *exact => Some(IssueCode::TooBig {
            kind: SizeKind::String,
            maximum: *exact as f64,
            inclusive: true,
            exact: true,
        }),
        StringCheck::Length(exact) if len < *exact => Some(IssueCode::TooSmall {
            kind: SizeKind::String,
            minimum: *exact as f64,
            inclusive: true,
            exact: true,
        }),
        StringCheck::Email if !is_email(text) => invalid(StringValidation::Email),
        StringCheck::Url if url::Url::parse(text).is_err() => invalid(StringValidation::Url),
        StringCheck::Uuid if !is_uuid(text) => invalid(StringValidation::Uuid),
        StringCheck::Regex(pattern) if !pattern.is_match(text) => invalid(StringValidation::Regex),
        StringCheck::Datetime { offset } if !is_datetime(text, *offset) => {
            invalid(StringValidation::Datetime)
        }
        StringCheck::StartsWith(prefix) if !text.starts_with(prefix.as_str()) => {
            invalid(StringValidation::StartsWith(prefix.clone()))
        }
        StringCheck::EndsWith(suffix) if !text.ends_with(suffix.as_str()) => {
            invalid(StringValidation::EndsWith(suffix.clone()))
        }
        StringCheck::Includes(needle) if !text.contains(needle.as_str()) => {
            invalid(StringValidation::Includes(needle.clone()))
        }
        _ => None,
    }
}

fn is_email(text: &str) -> bool {
    !text.starts_with('.') && !text.contains("..") && EMAIL_RE.is_match(text)
}

fn is_uuid(text: &str) -> bool {
    text.len() == 36 && uuid::Uuid::try_parse(text).is_ok()
}

fn is_datetime(text: &str, offset: bool) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok() && (offset || text.ends_with('Z'))
}
