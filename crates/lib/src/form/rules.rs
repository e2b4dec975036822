//! Built-in field rules.
//!
//! Rules are used when a form has no resolver. Each failing rule produces a
//! [`FieldError`] whose kind is the rule name (`required`, `min`, `maxLength`,
//! ...) or, for custom validators, the validator's name.

use std::{fmt, future::Future, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use regex::Regex;

use crate::{
    constants::{DEFAULT_VALIDATOR_NAME, rule},
    path::PathBuf,
    value::Value,
};

use super::state::FieldError;

/// Checks a field value against all form values. `Err` carries the message.
pub type SyncValidator = Arc<dyn Fn(&Value, &Value) -> Result<(), String> + Send + Sync>;

/// Async variant of [`SyncValidator`].
pub type AsyncValidator =
    Arc<dyn Fn(Value, Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Maps a raw element value before it is stored.
pub type SetValueAsFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A custom validator. Async validators are declared as such when they are
/// added rather than detected at call time.
#[derive(Clone)]
pub enum Validator {
    Sync(SyncValidator),
    Async(AsyncValidator),
}

impl Validator {
    pub fn is_async(&self) -> bool {
        matches!(self, Validator::Async(_))
    }

    async fn check(&self, value: &Value, values: &Value) -> Result<(), String> {
        match self {
            Validator::Sync(validate) => validate(value, values),
            Validator::Async(validate) => validate(value.clone(), values.clone()).await,
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Sync(_) => f.write_str("Validator::Sync"),
            Validator::Async(_) => f.write_str("Validator::Async"),
        }
    }
}

/// A rule argument and the message reported when the rule fails.
#[derive(Debug, Clone)]
pub struct Constraint<T> {
    pub value: T,
    pub message: String,
}

impl<T> Constraint<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Required,
    Min,
    Max,
    MinLength,
    MaxLength,
    Pattern,
}

/// Validation rules and value handling for one field.
///
/// Messages default to the empty string; [`message`](Rules::message) sets
/// the message of the rule added last.
///
/// ```rust
/// # use formstate::form::Rules;
/// let rules = Rules::new()
///     .required()
///     .message("Name is required")
///     .max_length(20)
///     .message("Too long");
/// assert!(rules.has_validation());
/// ```
#[derive(Clone, Default)]
pub struct Rules {
    pub(crate) required: Option<Constraint<bool>>,
    pub(crate) min: Option<Constraint<f64>>,
    pub(crate) max: Option<Constraint<f64>>,
    pub(crate) min_length: Option<Constraint<usize>>,
    pub(crate) max_length: Option<Constraint<usize>>,
    pub(crate) pattern: Option<Constraint<Regex>>,
    pub(crate) validate: Vec<(String, Validator)>,
    pub(crate) deps: Vec<PathBuf>,
    pub(crate) disabled: Option<bool>,
    pub(crate) value_as_number: bool,
    pub(crate) set_value_as: Option<SetValueAsFn>,
    pub(crate) should_unregister: Option<bool>,
    pub(crate) value: Option<Value>,
    last: Option<Slot>,
}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("required", &self.required)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern.as_ref().map(|p| p.value.as_str()))
            .field("validate", &self.validate)
            .field("deps", &self.deps)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = Some(Constraint::new(true));
        self.last = Some(Slot::Required);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(Constraint::new(min));
        self.last = Some(Slot::Min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(Constraint::new(max));
        self.last = Some(Slot::Max);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(Constraint::new(len));
        self.last = Some(Slot::MinLength);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(Constraint::new(len));
        self.last = Some(Slot::MaxLength);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(Constraint::new(pattern));
        self.last = Some(Slot::Pattern);
        self
    }

    /// Sets the message of the rule added last.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        match self.last {
            Some(Slot::Required) => set_message(&mut self.required, message),
            Some(Slot::Min) => set_message(&mut self.min, message),
            Some(Slot::Max) => set_message(&mut self.max, message),
            Some(Slot::MinLength) => set_message(&mut self.min_length, message),
            Some(Slot::MaxLength) => set_message(&mut self.max_length, message),
            Some(Slot::Pattern) => set_message(&mut self.pattern, message),
            None => {}
        }
        self
    }

    /// Adds a custom validator reported as `validate`.
    pub fn validate<F>(self, validate: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate_named(DEFAULT_VALIDATOR_NAME, validate)
    }

    /// Adds a custom validator reported under `name`.
    pub fn validate_named<F>(mut self, name: impl Into<String>, validate: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate
            .push((name.into(), Validator::Sync(Arc::new(validate))));
        self
    }

    /// Adds an async validator reported as `validate`.
    pub fn validate_async<F, Fut>(self, validate: F) -> Self
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.validate_async_named(DEFAULT_VALIDATOR_NAME, validate)
    }

    pub fn validate_async_named<F, Fut>(mut self, name: impl Into<String>, validate: F) -> Self
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let validator: AsyncValidator =
            Arc::new(move |value: Value, values: Value| validate(value, values).boxed());
        self.validate.push((name.into(), Validator::Async(validator)));
        self
    }

    /// Fields re-validated after this one changes.
    pub fn deps<I>(mut self, deps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    /// A disabled field is never validated, does not count towards
    /// `is_dirty` and is left out of submitted values.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    /// Stores element values as numbers; an empty input becomes NaN.
    pub fn value_as_number(mut self) -> Self {
        self.value_as_number = true;
        self
    }

    pub fn set_value_as<F>(mut self, map: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.set_value_as = Some(Arc::new(map));
        self
    }

    /// Overrides the form's unregister-on-detach policy for this field.
    pub fn should_unregister(mut self, unregister: bool) -> Self {
        self.should_unregister = Some(unregister);
        self
    }

    /// Initial value used when the form has no default for the field.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// True if any rule can produce an error.
    pub fn has_validation(&self) -> bool {
        self.required.is_some()
            || self.min.is_some()
            || self.max.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.pattern.is_some()
            || !self.validate.is_empty()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    pub fn dependencies(&self) -> &[PathBuf] {
        &self.deps
    }

    /// Combines the rules of a repeated registration; `newer` wins where it
    /// sets something.
    pub(crate) fn merge(self, newer: Rules) -> Rules {
        Rules {
            required: newer.required.or(self.required),
            min: newer.min.or(self.min),
            max: newer.max.or(self.max),
            min_length: newer.min_length.or(self.min_length),
            max_length: newer.max_length.or(self.max_length),
            pattern: newer.pattern.or(self.pattern),
            validate: if newer.validate.is_empty() {
                self.validate
            } else {
                newer.validate
            },
            deps: if newer.deps.is_empty() {
                self.deps
            } else {
                newer.deps
            },
            disabled: newer.disabled.or(self.disabled),
            value_as_number: newer.value_as_number || self.value_as_number,
            set_value_as: newer.set_value_as.or(self.set_value_as),
            should_unregister: newer.should_unregister.or(self.should_unregister),
            value: newer.value.or(self.value),
            last: None,
        }
    }

    /// Applies `value_as_number` and `set_value_as` to a raw element value.
    pub(crate) fn coerce(&self, raw: Value) -> Value {
        let value = if self.value_as_number {
            match raw {
                Value::String(s) if s.trim().is_empty() => Value::Number(f64::NAN),
                Value::String(s) => Value::Number(s.trim().parse().unwrap_or(f64::NAN)),
                other => other,
            }
        } else {
            raw
        };
        match &self.set_value_as {
            Some(map) => map(value),
            None => value,
        }
    }

    fn is_empty_value(&self, value: &Value) -> bool {
        match value {
            Value::Bool(false) => true,
            Value::Number(n) if self.value_as_number => n.is_nan(),
            other => other.is_empty(),
        }
    }
}

fn set_message<T>(slot: &mut Option<Constraint<T>>, message: String) {
    if let Some(constraint) = slot {
        constraint.message = message;
    }
}

struct Collector {
    error: Option<FieldError>,
    all: bool,
}

impl Collector {
    /// Records a failure; returns true when validation should stop.
    fn fail(&mut self, kind: &str, message: &str) -> bool {
        let error = self
            .error
            .get_or_insert_with(|| FieldError::new(kind, message));
        if self.all {
            error.push_type(kind, message);
        }
        !self.all
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse().ok(),
        Value::Date(d) => Some(d.timestamp_millis() as f64),
        _ => None,
    }
    .filter(|n| !n.is_nan())
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Runs the rules against `value`. With `validate_all` every failing rule is
/// collected into the error's `types`; otherwise the first failure wins.
pub(crate) async fn validate_field(
    rules: &Rules,
    value: &Value,
    values: &Value,
    validate_all: bool,
) -> Option<FieldError> {
    if rules.is_disabled() {
        return None;
    }

    let mut collector = Collector {
        error: None,
        all: validate_all,
    };
    let empty = rules.is_empty_value(value);

    if let Some(required) = &rules.required
        && required.value
        && empty
        && collector.fail(rule::REQUIRED, &required.message)
    {
        return collector.error;
    }

    if !empty && let Some(number) = as_number(value) {
        let failed = match (&rules.max, &rules.min) {
            (Some(max), _) if number > max.value => Some((rule::MAX, &max.message)),
            (_, Some(min)) if number < min.value => Some((rule::MIN, &min.message)),
            _ => None,
        };
        if let Some((kind, message)) = failed
            && collector.fail(kind, message)
        {
            return collector.error;
        }
    }

    if !empty && let Some(len) = length_of(value) {
        let failed = match (&rules.max_length, &rules.min_length) {
            (Some(max), _) if len > max.value => Some((rule::MAX_LENGTH, &max.message)),
            (_, Some(min)) if len < min.value => Some((rule::MIN_LENGTH, &min.message)),
            _ => None,
        };
        if let Some((kind, message)) = failed
            && collector.fail(kind, message)
        {
            return collector.error;
        }
    }

    if let (Some(pattern), Value::String(text)) = (&rules.pattern, value)
        && !empty
        && !pattern.value.is_match(text)
        && collector.fail(rule::PATTERN, &pattern.message)
    {
        return collector.error;
    }

    for (name, validator) in &rules.validate {
        if let Err(message) = validator.check(value, values).await
            && collector.fail(name, &message)
        {
            return collector.error;
        }
    }

    collector.error
}
