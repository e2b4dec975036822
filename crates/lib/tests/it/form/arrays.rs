//! Field arrays: restructuring, item ids and state that follows items

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use formstate::{
    FormControl, Value,
    form::{FieldArray, FieldError, Rules, SetErrorOptions, SetValueOptions},
};
use serde_json::json;

use super::helpers::*;
use crate::helpers::{TestInput, v};

fn values(list: &FieldArray) -> Vec<Value> {
    list.fields().into_iter().map(|item| item.value).collect()
}

fn ids(list: &FieldArray) -> Vec<String> {
    list.fields().into_iter().map(|item| item.id).collect()
}

fn letters(items: &[&str]) -> Vec<Value> {
    items.iter().map(|item| Value::from(*item)).collect()
}

#[tokio::test]
async fn test_missing_array_is_empty() {
    let form = FormControl::default();
    let list = form.field_array("items");

    assert!(list.is_empty());
    assert!(list.fields().is_empty());
    assert_eq!(list.name().as_str(), "items");
}

#[tokio::test]
async fn test_insertions() {
    let form = FormControl::default();
    let list = form.field_array("items");

    list.append("b");
    list.prepend("a");
    list.append_all(letters(&["d", "e"]));
    list.insert(2, "c");
    list.insert(99, "f");

    assert_eq!(values(&list), letters(&["a", "b", "c", "d", "e", "f"]));
    assert_eq!(list.len(), 6);
    assert_eq!(
        form.get_value("items"),
        Value::Array(letters(&["a", "b", "c", "d", "e", "f"]))
    );
}

#[tokio::test]
async fn test_removals() {
    let form = form_with_defaults(json!({"items": ["a", "b", "c", "d"]}));
    let list = form.field_array("items");

    list.remove(1);
    assert_eq!(values(&list), letters(&["a", "c", "d"]));

    list.remove_many(vec![0, 2]);
    assert_eq!(values(&list), letters(&["c"]));

    list.clear();
    assert!(list.is_empty());
    assert_eq!(form.get_value("items"), v(json!([])));
}

#[tokio::test]
async fn test_ids_follow_items_through_reordering() {
    let form = form_with_defaults(json!({"items": ["a", "b", "c"]}));
    let list = form.field_array("items");
    let before = ids(&list);

    list.move_item(0, 2);
    assert_eq!(values(&list), letters(&["b", "c", "a"]));
    assert_eq!(
        ids(&list),
        vec![before[1].clone(), before[2].clone(), before[0].clone()]
    );

    list.swap(0, 1);
    assert_eq!(values(&list), letters(&["c", "b", "a"]));
    assert_eq!(
        ids(&list),
        vec![before[2].clone(), before[1].clone(), before[0].clone()]
    );
}

#[tokio::test]
async fn test_ids_are_stable_between_reads() {
    let form = form_with_defaults(json!({"items": ["a", "b"]}));
    let list = form.field_array("items");

    assert_eq!(ids(&list), ids(&list));
    assert_ne!(ids(&list)[0], ids(&list)[1]);
}

#[tokio::test]
async fn test_update_and_replace_issue_new_ids() {
    let form = form_with_defaults(json!({"items": ["a", "b"]}));
    let list = form.field_array("items");
    let before = ids(&list);

    list.update(1, "B");
    let after = ids(&list);
    assert_eq!(values(&list), letters(&["a", "B"]));
    assert_eq!(after[0], before[0]);
    assert_ne!(after[1], before[1]);

    list.replace(letters(&["x", "y"]));
    let replaced = ids(&list);
    assert_eq!(values(&list), letters(&["x", "y"]));
    assert!(replaced.iter().all(|id| !after.contains(id)));
}

#[tokio::test]
async fn test_errors_follow_their_items() {
    let form =
        form_with_defaults(json!({"items": [{"name": ""}, {"name": ""}, {"name": ""}]}));
    let list = form.field_array("items");
    form.set_error(
        "items.0.name",
        FieldError::new("required", "first"),
        SetErrorOptions::default(),
    );
    form.set_error(
        "items.2.name",
        FieldError::new("required", "third"),
        SetErrorOptions::default(),
    );

    list.remove(0);

    let errors = form.form_state().errors;
    assert_eq!(
        errors.keys().cloned().collect::<Vec<_>>(),
        vec!["items.1.name".to_string()]
    );
    assert_eq!(errors["items.1.name"].message, "third");

    list.prepend(v(json!({"name": "new"})));
    assert!(form.form_state().errors.contains_key("items.2.name"));
}

#[tokio::test]
async fn test_array_level_root_error_survives_restructuring() {
    let form = form_with_defaults(json!({"items": ["a", "b"]}));
    let list = form.field_array("items");
    form.set_error(
        "items.root",
        FieldError::new("too_small", "Add more"),
        SetErrorOptions::default(),
    );

    list.swap(0, 1);

    assert!(form.form_state().errors.contains_key("items.root"));
}

#[tokio::test]
async fn test_touched_state_follows_items() {
    let form = form_with_defaults(json!({"items": [{"name": "a"}, {"name": "b"}]}));
    let list = form.field_array("items");
    form.set_value("items.1.name", "b", SetValueOptions::default().with_touch())
        .await
        .unwrap();

    list.prepend(v(json!({"name": "z"})));

    assert!(form.get_field_state("items.2.name").is_touched);
    assert!(!form.get_field_state("items.1.name").is_touched);
}

#[tokio::test]
async fn test_registered_fields_move_with_items() {
    let form = form_with_defaults(json!({"items": [{"name": "a"}, {"name": "b"}]}));
    let list = form.field_array("items");
    form.register("items.0.name", Rules::new());
    form.register("items.1.name", Rules::new().required());

    list.remove(0);

    assert!(form.is_registered("items.0.name"));
    assert!(!form.is_registered("items.1.name"));
    form.set_value("items.0.name", "", SetValueOptions::default())
        .await
        .unwrap();
    assert!(!form.trigger().await.unwrap());
    assert!(form.form_state().errors.contains_key("items.0.name"));
}

#[tokio::test]
async fn test_array_changes_update_dirty_state() {
    let form = form_with_defaults(json!({"items": []}));
    let list = form.field_array("items");

    list.append("a");
    assert!(form.form_state().is_dirty);
    assert!(form.get_field_state("items").is_dirty);

    list.clear();
    assert!(!form.form_state().is_dirty);
    assert!(!form.get_field_state("items").is_dirty);
}

#[tokio::test]
async fn test_appended_item_takes_focus_when_attached() {
    let form = form_with_defaults(json!({"items": [{"name": "a"}]}));
    let list = form.field_array("items");

    list.append(v(json!({"name": ""})));
    let input = TestInput::text();
    form.register("items.1.name", Rules::new()).attach(input.clone());

    assert_eq!(input.focus_count(), 1);
    assert_eq!(input.current(), Value::from(""));
}

#[tokio::test]
async fn test_array_subscribers_see_restructuring() {
    let form = FormControl::default();
    let list = form.field_array("items");
    let events = recorder();
    let sink = Arc::clone(&events);
    let _subscription = form.watch_arrays(move |event| {
        sink.lock().unwrap().push((event.name.clone(), event.values.clone()));
    });

    list.append("a");
    list.append("b");

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    let (name, values) = &events[1];
    assert_eq!(name.as_ref().map(|name| name.as_str()), Some("items"));
    assert_eq!(values, &v(json!(["a", "b"])));
}

#[tokio::test]
async fn test_set_value_on_array_root_publishes_array_event() {
    let form = FormControl::default();
    form.field_array("items");
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let _subscription = form.watch_arrays(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    form.set_value("items", v(json!(["x"])), SetValueOptions::dirty())
        .await
        .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(form.get_field_state("items").is_dirty);
}
