//! Leaf schemas without ordered checks, plus dates.

use chrono::{DateTime, Utc};

use crate::value::Value;

use super::{
    Check, TypeMessages,
    context::{ParseContext, ParseResult, ParseStatus},
    issue::{IssueCode, SizeKind},
};

/// Validates booleans.
#[derive(Debug, Clone, Default)]
pub struct BooleanSchema {
    pub(crate) coerce: bool,
    pub(crate) messages: TypeMessages,
}

impl BooleanSchema {
    /// Converts any input by truthiness before validating.
    pub fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        match input {
            Value::Bool(b) => ParseResult::Valid(Value::Bool(*b)),
            other if self.coerce => ParseResult::Valid(Value::Bool(truthy(other))),
            other => {
                self.messages.invalid_type(ctx, "boolean", other);
                ParseResult::Aborted
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::BigInt(n) => *n != 0,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[derive(Debug, Clone)]
pub(crate) enum DateCheck {
    Min(i64),
    Max(i64),
}

/// Validates dates, compared at millisecond precision.
#[derive(Debug, Clone, Default)]
pub struct DateSchema {
    pub(crate) checks: Vec<Check<DateCheck>>,
    pub(crate) coerce: bool,
    pub(crate) messages: TypeMessages,
}

impl DateSchema {
    /// Accepts RFC 3339 strings and epoch milliseconds.
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

    pub fn min(mut self, date: DateTime<Utc>) -> Self {
        self.checks
            .push(Check::new(DateCheck::Min(date.timestamp_millis())));
        self
    }

    pub fn max(mut self, date: DateTime<Utc>) -> Self {
        self.checks
            .push(Check::new(DateCheck::Max(date.timestamp_millis())));
        self
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        let date = match input {
            Value::Date(d) => *d,
            Value::String(s) if self.coerce => match DateTime::parse_from_rfc3339(s) {
                Ok(d) => d.with_timezone(&Utc),
                Err(_) => {
                    ctx.add_issue(IssueCode::InvalidDate, input, None);
                    return ParseResult::Aborted;
                }
            },
            Value::Number(n) if self.coerce => {
                match DateTime::from_timestamp_millis(*n as i64).filter(|_| n.is_finite()) {
                    Some(d) => d,
                    None => {
                        ctx.add_issue(IssueCode::InvalidDate, input, None);
                        return ParseResult::Aborted;
                    }
                }
            }
            other => {
                self.messages.invalid_type(ctx, "date", other);
                return ParseResult::Aborted;
            }
        };

        let millis = date.timestamp_millis();
        let mut status = ParseStatus::Valid;
        for check in &self.checks {
            let failure = match check.kind {
                DateCheck::Min(min) if millis < min => Some(IssueCode::TooSmall {
                    kind: SizeKind::Date,
                    minimum: min as f64,
                    inclusive: true,
                    exact: false,
                }),
                DateCheck::Max(max) if millis > max => Some(IssueCode::TooBig {
                    kind: SizeKind::Date,
                    maximum: max as f64,
                    inclusive: true,
                    exact: false,
                }),
                _ => None,
            };
            if let Some(code) = failure {
                ctx.add_issue(code, input, check.message.as_deref());
                status.dirty();
                if ctx.first_error_only() {
                    break;
                }
            }
        }
        status.into_result(Value::Date(date))
    }
}

/// Schemas that accept a fixed set of inputs without further checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Undefined,
    Null,
    Void,
    Nan,
    Any,
    Unknown,
    Never,
}

#[derive(Debug, Clone)]
pub struct UnitSchema {
    pub(crate) kind: UnitKind,
    pub(crate) messages: TypeMessages,
}

impl UnitSchema {
    pub(crate) fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            messages: TypeMessages::default(),
        }
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        let (accepted, expected) = match self.kind {
            UnitKind::Any | UnitKind::Unknown => (true, "unknown"),
            UnitKind::Undefined | UnitKind::Void => (input.is_undefined(), "undefined"),
            UnitKind::Null => (input.is_null(), "null"),
            UnitKind::Nan => (matches!(input, Value::Number(n) if n.is_nan()), "nan"),
            UnitKind::Never => (false, "never"),
        };
        if accepted {
            ParseResult::Valid(input.clone())
        } else {
            self.messages.invalid_type(ctx, expected, input);
            ParseResult::Aborted
        }
    }
}
