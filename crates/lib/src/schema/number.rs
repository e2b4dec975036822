//! Number and bigint schemas.

use crate::value::{Value, ValueType};

use super::{
    Check, TypeMessages,
    context::{ParseContext, ParseResult, ParseStatus},
    issue::{IssueCode, SizeKind},
};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone)]
pub(crate) enum NumberCheck {
    Int,
    Min { value: f64, inclusive: bool },
    Max { value: f64, inclusive: bool },
    MultipleOf(f64),
    Finite,
}

/// Validates numbers. `NaN` is always rejected as an invalid type.
#[derive(Debug, Clone, Default)]
pub struct NumberSchema {
    pub(crate) checks: Vec<Check<NumberCheck>>,
    pub(crate) coerce: bool,
    pub(crate) messages: TypeMessages,
}

impl NumberSchema {
    fn check(mut self, kind: NumberCheck) -> Self {
        self.checks.push(Check::new(kind));
        self
    }

    /// Converts strings, booleans, null and dates to numbers before validating.
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

    pub fn int(self) -> Self {
        self.check(NumberCheck::Int)
    }

    /// Inclusive lower bound.
    pub fn min(self, value: f64) -> Self {
        self.check(NumberCheck::Min {
            value,
            inclusive: true,
        })
    }

    /// Inclusive upper bound.
    pub fn max(self, value: f64) -> Self {
        self.check(NumberCheck::Max {
            value,
            inclusive: true,
        })
    }

    pub fn gt(self, value: f64) -> Self {
        self.check(NumberCheck::Min {
            value,
            inclusive: false,
        })
    }

    pub fn lt(self, value: f64) -> Self {
        self.check(NumberCheck::Max {
            value,
            inclusive: false,
        })
    }

    pub fn positive(self) -> Self {
        self.gt(0.0)
    }

    pub fn negative(self) -> Self {
        self.lt(0.0)
    }

    pub fn nonnegative(self) -> Self {
        self.min(0.0)
    }

    pub fn nonpositive(self) -> Self {
        self.max(0.0)
    }

    pub fn multiple_of(self, step: f64) -> Self {
        self.check(NumberCheck::MultipleOf(step))
    }

    pub fn finite(self) -> Self {
        self.check(NumberCheck::Finite)
    }

    /// Restricts to the range where every integer is exactly representable.
    pub fn safe(self) -> Self {
        self.min(-MAX_SAFE_INTEGER).max(MAX_SAFE_INTEGER)
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        let coerced;
        let input = if self.coerce {
            coerced = Value::Number(coerce_number(input));
            &coerced
        } else {
            input
        };
        let number = match input {
            Value::Number(n) if !n.is_nan() => *n,
            other => {
                self.messages.invalid_type(ctx, "number", other);
                return ParseResult::Aborted;
            }
        };

        let mut status = ParseStatus::Valid;
        for check in &self.checks {
            let failure = match check.kind {
                NumberCheck::Int if number.fract() != 0.0 || !number.is_finite() => {
                    Some(IssueCode::InvalidType {
                        expected: "integer".to_string(),
                        received: ValueType::Float,
                    })
                }
                NumberCheck::Min { value, inclusive }
                    if (inclusive && number < value) || (!inclusive && number <= value) =>
                {
                    Some(IssueCode::TooSmall {
                        kind: SizeKind::Number,
                        minimum: value,
                        inclusive,
                        exact: false,
                    })
                }
                NumberCheck::Max { value, inclusive }
                    if (inclusive && number > value) || (!inclusive && number >= value) =>
                {
                    Some(IssueCode::TooBig {
                        kind: SizeKind::Number,
                        maximum: value,
                        inclusive,
                        exact: false,
                    })
                }
                NumberCheck::MultipleOf(step) if float_safe_remainder(number, step) != 0.0 => {
                    Some(IssueCode::NotMultipleOf { multiple_of: step })
                }
                NumberCheck::Finite if !number.is_finite() => Some(IssueCode::NotFinite),
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
        status.into_result(Value::Number(number))
    }
}

fn coerce_number(input: &Value) -> f64 {
    match input {
        Value::Number(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::BigInt(n) => *n as f64,
        Value::Date(d) => d.timestamp_millis() as f64,
        _ => f64::NAN,
    }
}

fn decimal_places(value: f64) -> usize {
    let text = value.to_string();
    text.split_once('.').map_or(0, |(_, fraction)| fraction.len())
}

fn to_scaled_int(value: f64, places: usize) -> Option<i128> {
    format!("{value:.places$}").replace('.', "").parse().ok()
}

/// Remainder of `value / step` computed on decimal-scaled integers, so that
/// `0.3 % 0.1` is exactly zero.
pub fn float_safe_remainder(value: f64, step: f64) -> f64 {
    if !value.is_finite() || !step.is_finite() || step == 0.0 {
        return value % step;
    }
    let places = decimal_places(value).max(decimal_places(step));
    match (to_scaled_int(value, places), to_scaled_int(step, places)) {
        (Some(scaled_value), Some(scaled_step)) if scaled_step != 0 => {
            // `i128::MIN % -1` overflows; its remainder is zero
            let remainder = scaled_value.checked_rem(scaled_step).unwrap_or(0);
            remainder as f64 / 10f64.powi(places as i32)
        }
        _ => value % step,
    }
}

#[derive(Debug, Clone)]
pub(crate) enum BigIntCheck {
    Min { value: i128, inclusive: bool },
    Max { value: i128, inclusive: bool },
    MultipleOf(i128),
}

/// Validates arbitrary precision integers.
#[derive(Debug, Clone, Default)]
pub struct BigIntSchema {
    pub(crate) checks: Vec<Check<BigIntCheck>>,
    pub(crate) coerce: bool,
    pub(crate) messages: TypeMessages,
}

impl BigIntSchema {
    fn check(mut self, kind: BigIntCheck) -> Self {
        self.checks.push(Check::new(kind));
        self
    }

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

    pub fn min(self, value: i128) -> Self {
        self.check(BigIntCheck::Min {
            value,
            inclusive: true,
        })
    }

    pub fn max(self, value: i128) -> Self {
        self.check(BigIntCheck::Max {
            value,
            inclusive: true,
        })
    }

    pub fn gt(self, value: i128) -> Self {
        self.check(BigIntCheck::Min {
            value,
            inclusive: false,
        })
    }

    pub fn lt(self, value: i128) -> Self {
        self.check(BigIntCheck::Max {
            value,
            inclusive: false,
        })
    }

    pub fn multiple_of(self, step: i128) -> Self {
        self.check(BigIntCheck::MultipleOf(step))
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        let coerced = match input {
            Value::BigInt(n) => Some(*n),
            _ if !self.coerce => None,
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i128),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i128::from(*b)),
            _ => None,
        };
        let Some(number) = coerced else {
            self.messages.invalid_type(ctx, "bigint", input);
            return ParseResult::Aborted;
        };

        let mut status = ParseStatus::Valid;
        for check in &self.checks {
            let failure = match check.kind {
                BigIntCheck::Min { value, inclusive }
                    if (inclusive && number < value) || (!inclusive && number <= value) =>
                {
                    Some(IssueCode::TooSmall {
                        kind: SizeKind::Bigint,
                        minimum: value as f64,
                        inclusive,
                        exact: false,
                    })
                }
                BigIntCheck::Max { value, inclusive }
                    if (inclusive && number > value) || (!inclusive && number >= value) =>
                {
                    Some(IssueCode::TooBig {
                        kind: SizeKind::Bigint,
                        maximum: value as f64,
                        inclusive,
                        exact: false,
                    })
                }
                BigIntCheck::MultipleOf(step)
                    if number.checked_rem(step).is_some_and(|rest| rest != 0) =>
                {
                    Some(IssueCode::NotMultipleOf {
                        multiple_of: step as f64,
                    })
                }
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
        status.into_result(Value::BigInt(number))
    }
}
