//! Registration, field events and dirty/touched bookkeeping

use formstate::{
    FormControl, FormOptions, Value,
    form::{
        ChangeEvent, ElementKind, FieldError, Rules, SetErrorOptions, SetValueOptions,
        UnregisterOptions,
    },
    path::PathBuf,
};
use serde_json::json;

use super::helpers::*;
use crate::helpers::v;

#[tokio::test]
async fn test_register_seeds_value_from_defaults() {
    let form = form_with_defaults(json!({"name": "Ada"}));

    let name = form.register("name", Rules::new());
    let nick = form.register("nick", Rules::new().value("ace"));

    assert!(form.is_registered("name"));
    assert_eq!(name.value(), Value::from("Ada"));
    assert_eq!(nick.value(), Value::from("ace"));
    assert_eq!(name.name(), &PathBuf::from("name"));
    assert!(!form.form_state().is_dirty);
}

#[tokio::test]
async fn test_change_marks_dirty_until_value_returns_to_default() {
    let form = form_with_defaults(json!({"name": "Ada"}));
    let name = form.register("name", Rules::new());

    name.on_change("Bob").await.unwrap();
    assert!(form.form_state().is_dirty);
    assert!(form.get_field_state("name").is_dirty);
    assert_eq!(form.get_value("name"), Value::from("Bob"));

    name.on_change("Ada").await.unwrap();
    assert!(!form.form_state().is_dirty);
    assert!(!form.get_field_state("name").is_dirty);
}

#[tokio::test]
async fn test_blur_marks_touched_without_dirtying() {
    let form = form_with_defaults(json!({"name": "Ada"}));
    let name = form.register("name", Rules::new());

    name.on_blur().await.unwrap();

    let state = form.get_field_state("name");
    assert!(state.is_touched);
    assert!(!state.is_dirty);
    assert_eq!(form.get_value("name"), Value::from("Ada"));
}

#[tokio::test]
async fn test_set_value_dirty_option() {
    let form = form_with_defaults(json!({"name": "Ada"}));
    form.register("name", Rules::new());

    form.set_value("name", "Bob", SetValueOptions::dirty())
        .await
        .unwrap();
    assert!(form.form_state().is_dirty);
    assert!(form.get_field_state("name").is_dirty);

    form.set_value("name", "Ada", SetValueOptions::dirty())
        .await
        .unwrap();
    assert!(!form.form_state().is_dirty);
    assert!(!form.get_field_state("name").is_dirty);
}

#[tokio::test]
async fn test_form_is_dirty_is_derived_without_dirty_option() {
    let form = form_with_defaults(json!({"name": "Ada"}));
    form.register("name", Rules::new());

    form.set_value("name", "Bob", SetValueOptions::default())
        .await
        .unwrap();

    // The form-level flag always follows the values; the per-field tree
    // only changes when asked to
    assert!(form.form_state().is_dirty);
    assert!(!form.get_field_state("name").is_dirty);
}

#[tokio::test]
async fn test_set_value_touch_option() {
    let form = form_with_defaults(json!({"name": "Ada"}));
    form.register("name", Rules::new());

    form.set_value("name", "Ada", SetValueOptions::default().with_touch())
        .await
        .unwrap();
    assert!(form.get_field_state("name").is_touched);
}

#[tokio::test]
async fn test_set_value_on_parent_reaches_nested_fields() {
    let form = form_with_defaults(json!({"address": {"city": "Oslo", "zip": "0150"}}));
    form.register("address.city", Rules::new());
    form.register("address.zip", Rules::new());

    form.set_value(
        "address",
        v(json!({"city": "Bergen", "zip": "5003"})),
        SetValueOptions::dirty(),
    )
    .await
    .unwrap();

    assert_eq!(form.get_value("address.city"), Value::from("Bergen"));
    assert!(form.get_field_state("address.city").is_dirty);
    assert!(form.get_field_state("address.zip").is_dirty);
    assert!(form.get_field_state("address").is_dirty);
}

#[tokio::test]
async fn test_disabled_field_never_dirties_the_form() {
    let form = form_with_defaults(json!({"locked": "a"}));
    let locked = form.register("locked", Rules::new().disabled(true));

    form.set_value("locked", "b", SetValueOptions::dirty())
        .await
        .unwrap();

    assert!(locked.is_disabled());
    assert!(!form.form_state().is_dirty);
    assert!(!form.get_field_state("locked").is_dirty);
}

#[tokio::test]
async fn test_disabled_form_disables_every_field() {
    let form = FormControl::new(FormOptions::new().disabled(true));
    let name = form.register("name", Rules::new());

    assert!(form.form_state().disabled);
    assert!(name.is_disabled());
}

#[tokio::test]
async fn test_value_as_number_coerces_events_but_not_raw_values() {
    let form = FormControl::default();
    let age = form.register("age", Rules::new().value_as_number());

    age.on_change(ChangeEvent::change(ElementKind::Number, "42"))
        .await
        .unwrap();
    assert_eq!(form.get_value("age"), Value::from(42));

    age.on_change(ChangeEvent::change(ElementKind::Number, ""))
        .await
        .unwrap();
    assert!(matches!(form.get_value("age"), Value::Number(n) if n.is_nan()));

    age.on_change("17").await.unwrap();
    assert_eq!(form.get_value("age"), Value::from("17"));
}

#[tokio::test]
async fn test_set_value_as_maps_event_values() {
    let form = FormControl::default();
    let tag = form.register(
        "tag",
        Rules::new().set_value_as(|value| match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        }),
    );

    tag.on_change(ChangeEvent::change(ElementKind::Text, "rust"))
        .await
        .unwrap();
    assert_eq!(form.get_value("tag"), Value::from("RUST"));
}

#[tokio::test]
async fn test_event_on_unregistered_field_is_not_found() {
    let form = FormControl::default();
    let name = form.register("name", Rules::new());
    form.unregister("name");

    let err = name.on_change("late").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.is_form_error());
    assert_eq!(err.module(), "form");
}

#[tokio::test]
async fn test_unregister_drops_value_error_and_default() {
    let form = form_with_defaults(json!({"a": "1", "b": "2"}));
    form.register("a", Rules::new());
    form.register("b", Rules::new());
    form.set_error(
        "a",
        FieldError::new("server", "Taken"),
        SetErrorOptions::default(),
    );

    form.unregister("a");

    let state = form.form_state();
    assert!(!form.is_registered("a"));
    assert_eq!(state.values, v(json!({"b": "2"})));
    assert_eq!(state.default_values, v(json!({"b": "2"})));
    assert!(state.errors.is_empty());
}

#[tokio::test]
async fn test_unregister_with_keep_value() {
    let form = form_with_defaults(json!({"a": "1", "b": "2"}));
    form.register("a", Rules::new());
    form.register("b", Rules::new());

    form.unregister_with(
        Some(vec![PathBuf::from("a")]),
        UnregisterOptions {
            keep_value: true,
            keep_default_value: true,
            ..Default::default()
        },
    );

    assert!(!form.is_registered("a"));
    assert_eq!(form.get_value("a"), Value::from("1"));
    assert!(!form.form_state().is_dirty);
}

#[tokio::test]
async fn test_unregister_all_mounted_fields() {
    let form = form_with_defaults(json!({"a": "1", "b": "2"}));
    form.register("a", Rules::new());
    form.register("b", Rules::new());

    form.unregister_with(None, UnregisterOptions::default());

    assert!(!form.is_registered("a"));
    assert!(!form.is_registered("b"));
    assert_eq!(form.get_values(), v(json!({})));
}

#[tokio::test]
async fn test_watch_falls_back_to_defaults() {
    let form = form_with_defaults(json!({"name": "Ada"}));

    assert_eq!(form.watch("name"), Value::from("Ada"));
    assert_eq!(
        form.watch_or("missing", Value::from("fallback")),
        Value::from("fallback")
    );
    assert!(form.watch("missing").is_undefined());
    assert_eq!(
        form.get_values_of(["name", "missing"]),
        vec![Value::from("Ada"), Value::Undefined]
    );
    assert_eq!(form.watch_all(), v(json!({"name": "Ada"})));
}
