//! Form state snapshots and the bookkeeping trees behind them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    path::{Path, PathBuf},
    value::{Value, deep_equal, get, set},
};

/// A single field's error, in the shape rendered to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Rule name or issue code, e.g. `required` or `too_small`
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    /// Every failing rule by kind, filled when all criteria are collected
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub types: BTreeMap<String, Vec<String>>,
}

impl FieldError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            types: BTreeMap::new(),
        }
    }

    /// Records another failing rule.
    pub fn push_type(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.types
            .entry(kind.into())
            .or_default()
            .push(message.into());
    }

    pub fn with_type(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.push_type(kind, message);
        self
    }
}

/// Field errors keyed by normalized path.
pub type FieldErrors = BTreeMap<String, FieldError>;

/// Removes `name` and every error stored below it.
pub(crate) fn remove_errors_under(errors: &mut FieldErrors, name: &Path) -> bool {
    let before = errors.len();
    errors.retain(|key, _| !PathBuf::from(key.as_str()).starts_with(name));
    before != errors.len()
}

/// True if `name` or anything below it has an error.
pub(crate) fn has_error_under(errors: &FieldErrors, name: &Path) -> bool {
    errors
        .keys()
        .any(|key| PathBuf::from(key.as_str()).starts_with(name))
}

/// One observable part of [`FormState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateField {
    Values,
    DefaultValues,
    Errors,
    DirtyFields,
    TouchedFields,
    ValidatingFields,
    IsDirty,
    IsValid,
    IsValidating,
    IsSubmitted,
    IsSubmitting,
    IsSubmitSuccessful,
    IsLoading,
    SubmitCount,
    Disabled,
}

impl StateField {
    pub const ALL: [StateField; 15] = [
        StateField::Values,
        StateField::DefaultValues,
        StateField::Errors,
        StateField::DirtyFields,
        StateField::TouchedFields,
        StateField::ValidatingFields,
        StateField::IsDirty,
        StateField::IsValid,
        StateField::IsValidating,
        StateField::IsSubmitted,
        StateField::IsSubmitting,
        StateField::IsSubmitSuccessful,
        StateField::IsLoading,
        StateField::SubmitCount,
        StateField::Disabled,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of [`StateField`]s.
///
/// Subscribers declare the fields they care about up front; updates are only
/// delivered when they touch one of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StateFieldSet(u16);

impl StateFieldSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        StateField::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, field: StateField) {
        self.0 |= field.bit();
    }

    pub fn with(mut self, field: StateField) -> Self {
        self.insert(field);
        self
    }

    pub fn contains(&self, field: StateField) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn intersects(&self, other: StateFieldSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: StateFieldSet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = StateField> + '_ {
        StateField::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<StateField> for StateFieldSet {
    fn from_iter<I: IntoIterator<Item = StateField>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl From<&[StateField]> for StateFieldSet {
    fn from(fields: &[StateField]) -> Self {
        fields.iter().copied().collect()
    }
}

impl<const N: usize> From<[StateField; N]> for StateFieldSet {
    fn from(fields: [StateField; N]) -> Self {
        fields.into_iter().collect()
    }
}

/// Snapshot of a form, published to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub values: Value,
    pub default_values: Value,
    pub errors: FieldErrors,
    /// Sparse tree with `true` leaves for fields that differ from default
    pub dirty_fields: Value,
    /// Sparse tree with `true` leaves for blurred fields
    pub touched_fields: Value,
    /// Sparse tree with `true` leaves for fields under async validation
    pub validating_fields: Value,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub is_validating: bool,
    pub is_submitted: bool,
    pub is_submitting: bool,
    pub is_submit_successful: bool,
    pub is_loading: bool,
    pub submit_count: u32,
    pub disabled: bool,
}

impl FormState {
    pub(crate) fn new() -> Self {
        Self {
            values: Value::object(),
            default_values: Value::object(),
            dirty_fields: Value::object(),
            touched_fields: Value::object(),
            validating_fields: Value::object(),
            ..Default::default()
        }
    }

    /// Derives the state of one field.
    pub fn field_state(&self, name: impl Into<PathBuf>) -> FieldState {
        let name = name.into();
        FieldState {
            invalid: has_error_under(&self.errors, &name),
            is_dirty: is_flagged(&self.dirty_fields, &name),
            is_touched: is_flagged(&self.touched_fields, &name),
            is_validating: is_flagged(&self.validating_fields, &name),
            error: self.errors.get(name.as_str()).cloned(),
        }
    }
}

/// Derived per-field state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    pub invalid: bool,
    pub is_dirty: bool,
    pub is_touched: bool,
    pub is_validating: bool,
    pub error: Option<FieldError>,
}

/// A published state change.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    /// The field that caused the change, if any
    pub name: Option<PathBuf>,
    pub changed: StateFieldSet,
    pub state: FormState,
}

/// True if the tree has a `true` leaf at `name` or anywhere below it.
pub(crate) fn is_flagged(tree: &Value, name: &Path) -> bool {
    match get(tree, name) {
        Some(Value::Bool(flag)) => *flag,
        Some(container) if container.is_container() => !container.is_empty(),
        _ => false,
    }
}

/// Marks `name` in a sparse flag tree.
pub(crate) fn flag(tree: &mut Value, name: &Path) {
    set(tree, name, Value::Bool(true));
}

/// Paths of every `true` leaf in a flag tree.
pub(crate) fn flagged_paths(tree: &Value) -> Vec<PathBuf> {
    fn walk(node: &Value, prefix: PathBuf, out: &mut Vec<PathBuf>) {
        match node {
            Value::Bool(true) => out.push(prefix),
            Value::Object(map) => {
                for (key, child) in map {
                    walk(child, prefix.clone().push(key), out);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    walk(child, prefix.clone().push_index(index), out);
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(tree, PathBuf::new(), &mut out);
    out
}

/// Builds the dirty tree: `true` at every leaf where `values` differs from
/// `defaults`. Leaves present only in `defaults` count as changed.
pub fn get_dirty_fields(defaults: &Value, values: &Value) -> Value {
    dirty_diff(defaults, values).unwrap_or_else(Value::object)
}

fn dirty_diff(defaults: &Value, values: &Value) -> Option<Value> {
    match (defaults, values) {
        (_, Value::Object(current)) => {
            let empty = BTreeMap::new();
            let base = defaults.as_object().unwrap_or(&empty);
            let mut out = BTreeMap::new();
            for (key, value) in current {
                let default = base.get(key).unwrap_or(&Value::Undefined);
                if let Some(diff) = dirty_diff(default, value) {
                    out.insert(key.clone(), diff);
                }
            }
            for (key, default) in base {
                if !current.contains_key(key) && !default.is_undefined() {
                    out.insert(key.clone(), Value::Bool(true));
                }
            }
            (!out.is_empty()).then_some(Value::Object(out))
        }
        (_, Value::Array(current)) => {
            let empty = Vec::new();
            let base = defaults.as_array().unwrap_or(&empty);
            let mut out = vec![Value::Undefined; current.len().max(base.len())];
            let mut any = false;
            for (index, slot) in out.iter_mut().enumerate() {
                let default = base.get(index).unwrap_or(&Value::Undefined);
                let value = current.get(index).unwrap_or(&Value::Undefined);
                if let Some(diff) = dirty_diff(default, value) {
                    *slot = diff;
                    any = true;
                }
            }
            while out.last().is_some_and(Value::is_undefined) {
                out.pop();
            }
            any.then_some(Value::Array(out))
        }
        (default, value) => (!deep_equal(default, value)).then_some(Value::Bool(true)),
    }
}
