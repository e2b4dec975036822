//! Structural cloning, equality and merging of value trees.

use super::{Object, Value};

/// Key ignored by [`deep_equal`]; it carries UI element references rather
/// than data.
pub const REF_KEY: &str = "ref";

/// Deep-clones a value tree.
///
/// Dates, sets and all plain containers are copied. Opaque host handles are
/// passed through by reference: the clone shares the same host object.
pub fn clone_object(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(clone_object).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), clone_object(v)))
                .collect(),
        ),
        Value::Set(items) => Value::Set(items.iter().map(clone_object).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (clone_object(k), clone_object(v)))
                .collect(),
        ),
        Value::Opaque(handle) => Value::Opaque(handle.clone()),
        leaf => leaf.clone(),
    }
}

/// Compares two value trees structurally.
///
/// Numbers compare by value (so `NaN` never equals itself), dates by epoch
/// milliseconds and opaque handles by identity. Objects must have the same key
/// set; the value under a key named `ref` is not compared.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Date(x), Value::Date(y)) => x.timestamp_millis() == y.timestamp_millis(),
        (Value::Array(x), Value::Array(y)) | (Value::Set(x), Value::Set(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => objects_equal(x, y),
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|((lk, lv), (rk, rv))| deep_equal(lk, rk) && deep_equal(lv, rv))
        }
        (Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
        (x, y) => x == y,
    }
}

fn objects_equal(x: &Object, y: &Object) -> bool {
    if x.len() != y.len() {
        return false;
    }
    x.iter().all(|(key, left)| match y.get(key) {
        None => false,
        Some(_) if key == REF_KEY => true,
        Some(right) => deep_equal(left, right),
    })
}

/// Merges two values the way an intersection combines both sides.
///
/// Equal values merge to themselves, objects merge key by key, arrays of
/// equal length merge element-wise. Anything else is a conflict and yields
/// `None`.
pub fn merge_values(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let mut merged = x.clone();
            for (key, right) in y {
                let value = match x.get(key) {
                    Some(left) => merge_values(left, right)?,
                    None => right.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Some(Value::Object(merged))
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.len() != y.len() {
                return None;
            }
            x.iter()
                .zip(y)
                .map(|(l, r)| merge_values(l, r))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
        }
        (x, y) if deep_equal(x, y) => Some(x.clone()),
        _ => None,
    }
}
