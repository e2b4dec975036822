//! The dynamic value tree that forms and schemas operate on.
//!
//! `Value` represents every kind of data a form can hold. Values are either
//! leaf values (primitives such as strings, numbers, dates) or containers
//! (arrays, objects, sets and maps). Host objects that must never be copied or
//! inspected, such as file handles, are carried as [`Value::Opaque`].
//!
//! # Direct Comparisons
//!
//! `Value` implements `PartialEq` with primitive types for ergonomic comparisons:
//!
//! ```
//! # use formstate::Value;
//! let text = Value::from("hello");
//! let number = Value::from(42);
//! let flag = Value::from(true);
//!
//! assert!(text == "hello");
//! assert!(number == 42.0);
//! assert!(flag == true);
//! assert!(!(text == 42.0));
//! ```

use std::{any::Any, collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, SecondsFormat, Utc};

pub mod access;
pub mod compare;

pub use access::{get, get_mut, get_or, set, unset};
pub use compare::{clone_object, deep_equal, merge_values};

/// Object storage used by [`Value::Object`].
pub type Object = BTreeMap<String, Value>;

/// A reference-counted handle to a host object.
///
/// Cloning the handle shares the same underlying object, and two handles are
/// equal only when they point at the same object.
#[derive(Clone)]
pub struct OpaqueHandle {
    label: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueHandle {
    /// Wraps any `Send + Sync` host object under a descriptive label.
    pub fn new<T: Any + Send + Sync>(label: impl AsRef<str>, value: T) -> Self {
        Self {
            label: Arc::from(label.as_ref()),
            inner: Arc::new(value),
        }
    }

    /// Returns the descriptive label given at construction.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Try to downcast to a concrete type reference.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Returns true if both handles share the same host object.
    pub fn ptr_eq(&self, other: &OpaqueHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for OpaqueHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueHandle").field(&self.label).finish()
    }
}

/// Values held by forms and produced by schemas.
///
/// `Undefined` marks an absent value (a missing key or an array hole) and is
/// distinct from an explicit `Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    // Leaf values
    /// Absent value
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean value
    Bool(bool),
    /// Floating point number (may be NaN or infinite)
    Number(f64),
    /// Arbitrary precision integer
    BigInt(i128),
    /// Text string value
    String(String),
    /// Point in time
    Date(DateTime<Utc>),

    // Containers
    /// Ordered sequence
    Array(Vec<Value>),
    /// String-keyed mapping
    Object(Object),
    /// Unique values in insertion order
    Set(Vec<Value>),
    /// Key/value pairs in insertion order
    Map(Vec<(Value, Value)>),

    /// Host object passed through by reference
    Opaque(OpaqueHandle),
}

/// Coarse classification of a [`Value`], used in type-mismatch issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Nan,
    Integer,
    Float,
    Boolean,
    Date,
    Bigint,
    Undefined,
    Null,
    Array,
    Object,
    Map,
    Set,
    Unknown,
}

impl ValueType {
    /// Returns the lowercase display name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Nan => "nan",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Bigint => "bigint",
            ValueType::Undefined => "undefined",
            ValueType::Null => "null",
            ValueType::Array => "array",
            ValueType::Object => "object",
            ValueType::Map => "map",
            ValueType::Set => "set",
            ValueType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Creates an empty object.
    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    /// Creates an empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    /// Classifies this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Undefined => ValueType::Undefined,
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(n) if n.is_nan() => ValueType::Nan,
            Value::Number(_) => ValueType::Number,
            Value::BigInt(_) => ValueType::Bigint,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
            Value::Set(_) => ValueType::Set,
            Value::Map(_) => ValueType::Map,
            Value::Opaque(_) => ValueType::Unknown,
        }
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.value_type().as_str()
    }

    /// Returns true for absent values
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for `Null` and `Undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Returns true for arrays and objects, the containers paths walk through
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Returns true for values that are not containers
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Set(_) | Value::Map(_) | Value::Opaque(_)
        )
    }

    /// Returns true for empty strings, empty containers and nullish values.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.iter().all(Value::is_undefined),
            Value::Object(map) => map.is_empty(),
            Value::Set(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    /// Attempts to convert to a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to convert to a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to convert to a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to convert to a date
    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Attempts to borrow as an array
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Attempts to borrow as a mutable array
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Attempts to borrow as an object
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Attempts to borrow as a mutable object
    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Converts into a `serde_json::Value`.
    ///
    /// Undefined object entries are omitted and undefined array slots become
    /// `null`. Dates are rendered as RFC 3339 strings, sets as arrays, maps as
    /// arrays of `[key, value]` pairs and opaque handles as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Null | Value::Opaque(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::BigInt(n) => match i64::try_from(*n) {
                Ok(small) => Json::Number(small.into()),
                Err(_) => Json::String(n.to_string()),
            },
            Value::String(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Array(items) | Value::Set(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => Json::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Map(entries) => Json::Array(
                entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::String(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}n"),
            Value::Opaque(h) => write!(f, "[{}]", h.label()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Undefined)
    }
}

impl From<OpaqueHandle> for Value {
    fn from(handle: OpaqueHandle) -> Self {
        Value::Opaque(handle)
    }
}

// PartialEq implementations for comparing Value with primitives
impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<f64> for Value {
    fn eq(&self, other: &f64) -> bool {
        self.as_f64() == Some(*other)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}
