//! Value accessor and comparison tests

use formstate::{
    Value,
    value::{clone_object, deep_equal, get, get_or, merge_values, set, unset},
};
use serde_json::json;

use crate::helpers::*;

#[test]
fn test_set_then_get_round_trip() {
    let cases = vec![
        ("name", Value::from("Ada")),
        ("user.profile.age", Value::from(36)),
        ("items[2].done", Value::Bool(true)),
        ("matrix.0.1", Value::Null),
        ("tags", v(json!(["a", "b"]))),
    ];

    for (path, value) in cases {
        let mut root = empty_object();
        set(&mut root, path, value.clone());
        assert_eq!(get(&root, path), Some(&value), "round trip through {path}");
    }
}

#[test]
fn test_set_creates_arrays_for_index_segments() {
    let mut root = empty_object();
    set(&mut root, "rows.1.cells.0", Value::from("x"));

    let rows = get(&root, "rows").and_then(Value::as_array).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].is_undefined());
    assert_eq!(get(&root, "rows.0"), None);
    assert_eq!(
        get(&root, "rows.1.cells"),
        Some(&Value::Array(vec![Value::from("x")]))
    );
}

#[test]
fn test_set_preserves_siblings() {
    let mut root = v(json!({"user": {"name": "Ada", "email": "ada@example.com"}}));
    set(&mut root, "user.name", Value::from("Grace"));

    assert_eq!(
        root,
        v(json!({"user": {"name": "Grace", "email": "ada@example.com"}}))
    );
}

#[test]
fn test_prototype_keys_are_refused() {
    let mut root = v(json!({"a": 1}));
    let before = root.clone();

    assert!(set(&mut root, "__proto__.polluted", Value::from(1)).is_none());
    assert!(set(&mut root, "a.constructor.prototype.x", Value::from(1)).is_none());
    assert!(set(&mut root, "prototype", Value::from(1)).is_none());
    assert_eq!(root, before);
}

#[test]
fn test_unset_prunes_empty_parents() {
    let mut root = v(json!({"keep": 1, "a": {"b": [{"c": 1}]}}));

    assert!(unset(&mut root, "a.b.0.c"));
    assert_eq!(root, v(json!({"keep": 1})));
}

#[test]
fn test_unset_leaves_holes_between_siblings() {
    let mut root = v(json!({"list": [1, 2, 3]}));

    assert!(unset(&mut root, "list.1"));
    assert_eq!(
        get(&root, "list"),
        Some(&Value::Array(vec![
            Value::from(1),
            Value::Undefined,
            Value::from(3)
        ]))
    );
    assert!(!unset(&mut root, "missing.path"));
}

#[test]
fn test_zero_padded_keys_are_not_indices() {
    let root = v(json!({"codes": {"007": 1, "7": 2}}));
    assert_eq!(get(&root, "codes.007"), Some(&Value::from(1)));
    assert_eq!(get(&root, "codes[\"007\"]"), Some(&Value::from(1)));
    assert_eq!(get(&root, "codes.7"), Some(&Value::from(2)));

    let mut root = empty_object();
    set(&mut root, "codes.007", Value::from("bond"));
    assert_eq!(root, v(json!({"codes": {"007": "bond"}})));
    assert!(unset(&mut root, "codes.007"));
    assert_eq!(get(&root, "codes"), None);
}

#[test]
fn test_get_or_falls_back() {
    let root = v(json!({"a": {"b": null}}));
    assert_eq!(get_or(&root, "a.b", Value::from(0)), Value::Null);
    assert_eq!(get_or(&root, "a.c", Value::from(0)), Value::from(0));
    assert_eq!(get(&root, "a.b.c"), None);
}

#[test]
fn test_deep_equal_ignores_ref() {
    let left = v(json!({"value": "x", "ref": {"id": 1}}));
    let right = v(json!({"value": "x", "ref": {"id": 2}}));
    assert!(deep_equal(&left, &right));

    let different = v(json!({"value": "y", "ref": {"id": 1}}));
    assert!(!deep_equal(&left, &different));
}

#[test]
fn test_deep_equal_key_sets_must_match() {
    assert!(!deep_equal(&v(json!({"a": 1})), &v(json!({"a": 1, "b": 2}))));
    assert!(!deep_equal(&v(json!([1, 2])), &v(json!([1, 2, 3]))));
    assert!(!deep_equal(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
}

#[test]
fn test_clone_object_is_deep() {
    let original = v(json!({"nested": {"list": [1, 2]}}));
    let mut copy = clone_object(&original);
    set(&mut copy, "nested.list.0", Value::from(9));

    assert_eq!(get(&original, "nested.list.0"), Some(&Value::from(1)));
    assert_eq!(get(&copy, "nested.list.0"), Some(&Value::from(9)));
}

#[test]
fn test_merge_values() {
    let merged = merge_values(&v(json!({"a": 1})), &v(json!({"b": 2}))).unwrap();
    assert_eq!(merged, v(json!({"a": 1, "b": 2})));

    assert!(merge_values(&v(json!({"a": 1})), &v(json!({"a": 2}))).is_none());
    assert!(merge_values(&v(json!([1])), &v(json!([1, 2]))).is_none());
}

#[test]
fn test_to_json_omits_undefined_entries() {
    let mut root = v(json!({"a": 1}));
    set(&mut root, "b", Value::Undefined);
    assert_eq!(root.to_json(), json!({"a": 1}));
}
