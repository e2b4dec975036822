//! Path-based get/set/unset over nested value trees.
//!
//! All three accessors accept dotted or bracketed path strings. Identifier-like
//! keys skip tokenization entirely.

use crate::path::{Segment, is_simple_key, tokenize};

use super::{Object, Value};

/// Keys that are never assigned through, mirroring the prototype-pollution
/// guard of object-graph setters.
const FORBIDDEN_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

fn parse_segments(path: &str) -> Vec<Segment> {
    if is_simple_key(path) {
        if path.is_empty() {
            return Vec::new();
        }
        return vec![Segment::Key(path.to_string())];
    }
    tokenize(path).iter().map(|raw| Segment::parse(raw)).collect()
}

fn child<'a>(container: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (container, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}

fn child_mut<'a>(container: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (container, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get_mut(key),
        (Value::Object(map), Segment::Index(index)) => map.get_mut(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
        _ => None,
    }
}

/// Returns the slot for `segment`, creating an `Undefined` entry if absent.
fn child_slot<'a>(container: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (container, segment) {
        (Value::Object(map), Segment::Key(key)) => {
            Some(map.entry(key.clone()).or_insert(Value::Undefined))
        }
        (Value::Object(map), Segment::Index(index)) => {
            Some(map.entry(index.to_string()).or_insert(Value::Undefined))
        }
        (Value::Array(items), Segment::Index(index)) => {
            if items.len() <= *index {
                items.resize(index + 1, Value::Undefined);
            }
            items.get_mut(*index)
        }
        _ => None,
    }
}

fn container_for(next: &Segment) -> Value {
    match next {
        Segment::Index(_) => Value::Array(Vec::new()),
        Segment::Key(_) => Value::Object(Object::new()),
    }
}

fn lookup<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| match current {
            Value::Undefined | Value::Null => None,
            _ => child(current, segment),
        })
}

fn lookup_mut<'a>(root: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| child_mut(current, segment))
}

/// Returns the value at `path`, or `None` if any segment is absent or the
/// leaf is `Undefined`.
///
/// A key that literally contains the path string (for example a top-level
/// key named `"a.b"`) is used as a fallback when the walk finds nothing.
///
/// ```
/// # use formstate::{Value, value::get};
/// # use serde_json::json;
/// let root = Value::from(json!({"user": {"tags": ["a", "b"]}}));
/// assert_eq!(get(&root, "user.tags[1]"), Some(&Value::from("b")));
/// assert_eq!(get(&root, "user.missing.deeper"), None);
/// ```
pub fn get<'a>(root: &'a Value, path: impl AsRef<str>) -> Option<&'a Value> {
    let path = path.as_ref();
    let segments = parse_segments(path);
    if segments.is_empty() {
        return None;
    }
    match lookup(root, &segments) {
        Some(Value::Undefined) | None => match root {
            Value::Object(map) if segments.len() > 1 => {
                map.get(path).filter(|v| !v.is_undefined())
            }
            _ => None,
        },
        found => found,
    }
}

/// Returns a clone of the value at `path`, or `default` when absent.
pub fn get_or(root: &Value, path: impl AsRef<str>, default: Value) -> Value {
    get(root, path).cloned().unwrap_or(default)
}

/// Returns a mutable reference to an existing value at `path`.
pub fn get_mut<'a>(root: &'a mut Value, path: impl AsRef<str>) -> Option<&'a mut Value> {
    let segments = parse_segments(path.as_ref());
    if segments.is_empty() {
        return None;
    }
    lookup_mut(root, &segments)
}

/// Writes `value` at `path`, creating intermediate containers on demand.
///
/// A newly created container is an array when the following segment is a
/// non-negative integer and an object otherwise. Existing sibling keys are
/// preserved. Paths that pass through `__proto__`, `constructor` or
/// `prototype` are refused and leave `root` untouched.
///
/// Returns the container that now holds the leaf, or `None` if nothing was
/// written.
pub fn set(root: &mut Value, path: impl AsRef<str>, value: Value) -> Option<&mut Value> {
    let segments = parse_segments(path.as_ref());
    let (last, parents) = segments.split_last()?;
    if segments
        .iter()
        .any(|s| matches!(s, Segment::Key(k) if FORBIDDEN_KEYS.contains(&k.as_str())))
    {
        return None;
    }

    if !root.is_container() {
        *root = container_for(segments.first()?);
    }

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        let next = &segments[i + 1];
        let slot = child_slot(current, segment)?;
        if !slot.is_container() {
            *slot = container_for(next);
        }
        current = slot;
    }

    *child_slot(current, last)? = value;
    Some(current)
}

fn remove_leaf(container: &mut Value, segment: &Segment) -> bool {
    match (container, segment) {
        (Value::Object(map), Segment::Key(key)) => map.remove(key).is_some(),
        (Value::Object(map), Segment::Index(index)) => map.remove(&index.to_string()).is_some(),
        (Value::Array(items), Segment::Index(index)) => match items.get_mut(*index) {
            Some(slot) => {
                *slot = Value::Undefined;
                true
            }
            None => false,
        },
        _ => false,
    }
}

fn unset_segments(root: &mut Value, segments: &[Segment]) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let removed = match lookup_mut(root, parents) {
        Some(parent) => remove_leaf(parent, last),
        None => return false,
    };

    // Prune the parent once it has no meaningful content left.
    if !parents.is_empty()
        && let Some(parent) = lookup(root, parents)
        && parent.is_container()
        && parent.is_empty()
    {
        unset_segments(root, parents);
    }
    removed
}

/// Deletes the value at `path`.
///
/// Array slots become holes (`Undefined`) so sibling indices stay stable.
/// When the parent container is left empty (no keys, or only holes) it is
/// removed as well, recursively, up to but excluding the root.
///
/// Returns true if a value was removed.
pub fn unset(root: &mut Value, path: impl AsRef<str>) -> bool {
    let segments = parse_segments(path.as_ref());
    unset_segments(root, &segments)
}
