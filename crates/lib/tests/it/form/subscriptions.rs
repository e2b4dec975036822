//! State subscriptions, value watchers and validity tracking

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use formstate::{
    FormControl, Value,
    form::{FieldError, Rules, SetErrorOptions, SetValueOptions, StateField, StateFieldSet},
};
use serde_json::json;

use super::helpers::*;
use crate::helpers::v;

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&count), count)
}

#[tokio::test]
async fn test_subscribe_filters_by_state_field() {
    let form = form_with_defaults(json!({"name": ""}));
    let name = form.register("name", Rules::new());
    let (seen, count) = counter();
    let _subscription = form.subscribe([StateField::Errors], move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    name.on_change("Ada").await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    form.set_error(
        "name",
        FieldError::new("server", "Taken"),
        SetErrorOptions::default(),
    );
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_subscribers_receive_the_new_snapshot() {
    let form = form_with_defaults(json!({"name": ""}));
    let name = form.register("name", Rules::new());
    let states = recorder();
    let sink = Arc::clone(&states);
    let _subscription = form.subscribe([StateField::IsDirty], move |state| {
        sink.lock().unwrap().push(state.is_dirty);
    });

    name.on_change("Ada").await.unwrap();
    name.on_change("").await.unwrap();

    assert_eq!(*states.lock().unwrap(), vec![true, false]);
}

#[tokio::test]
async fn test_unsubscribe_stops_notifications() {
    let form = FormControl::default();
    let (seen, count) = counter();
    let subscription = form.subscribe(StateFieldSet::all(), move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    form.clear_errors();
    subscription.unsubscribe();
    form.clear_errors();

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_subscribe_updates_carries_the_changed_field() {
    let form = FormControl::default();
    form.register("a", Rules::new());
    let updates = recorder();
    let sink = Arc::clone(&updates);
    let _subscription = form.subscribe_updates(move |update| {
        let name = update.name.as_ref().map(|name| name.to_string());
        sink.lock().unwrap().push((name, update.changed));
    });

    form.set_value("a", "x", SetValueOptions::default())
        .await
        .unwrap();

    let updates = updates.lock().unwrap();
    let (name, changed) = updates
        .iter()
        .find(|(name, _)| name.is_some())
        .cloned()
        .unwrap();
    assert_eq!(name.as_deref(), Some("a"));
    assert!(changed.contains(StateField::Values));
    assert!(changed.contains(StateField::IsDirty));
}

#[tokio::test]
async fn test_watch_with_reports_change_events() {
    let form = form_with_defaults(json!({"name": ""}));
    let name = form.register("name", Rules::new());
    let events = recorder();
    let sink = Arc::clone(&events);
    let _subscription = form.watch_with(move |event| {
        let field = event.name.as_ref().map(|name| name.to_string());
        sink.lock().unwrap().push((field, event.event, event.values.clone()));
    });

    name.on_change("Ada").await.unwrap();
    form.set_value("name", "Bob", SetValueOptions::default())
        .await
        .unwrap();
    name.on_blur().await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            (
                Some("name".to_string()),
                Some("change"),
                v(json!({"name": "Ada"}))
            ),
            (Some("name".to_string()), None, v(json!({"name": "Bob"}))),
        ]
    );
}

#[tokio::test]
async fn test_reset_notifies_value_watchers_without_a_name() {
    let form = form_with_defaults(json!({"name": "Ada"}));
    form.register("name", Rules::new());
    let events = recorder();
    let sink = Arc::clone(&events);
    let _subscription = form.watch_with(move |event| {
        sink.lock().unwrap().push(event.name.is_none());
    });

    form.reset(None, Default::default());

    assert_eq!(*events.lock().unwrap(), vec![true]);
}

#[tokio::test]
async fn test_tracking_is_valid_keeps_it_current() {
    let form = form_with_defaults(json!({"name": ""}));
    form.track([StateField::IsValid]);
    let name = form.register("name", Rules::new().required());
    settle().await;
    assert!(!form.form_state().is_valid);

    name.on_change("Ada").await.unwrap();
    settle().await;
    let state = form.form_state();
    assert!(state.is_valid);
    // Validity checks never write errors
    assert!(state.errors.is_empty());

    name.on_change("").await.unwrap();
    settle().await;
    assert!(!form.form_state().is_valid);
    assert!(form.form_state().errors.is_empty());
}

#[tokio::test]
async fn test_untracked_is_valid_only_changes_on_validation() {
    let form = form_with_defaults(json!({"name": ""}));
    let name = form.register("name", Rules::new().required());

    name.on_change("Ada").await.unwrap();
    settle().await;
    assert!(!form.form_state().is_valid);

    assert!(form.trigger().await.unwrap());
    assert!(form.form_state().is_valid);
}

#[tokio::test]
async fn test_validity_subscription_sees_register_and_change() {
    let form = form_with_defaults(json!({"name": "Ada"}));
    let flags = recorder();
    let sink = Arc::clone(&flags);
    let _subscription = form.subscribe([StateField::IsValid], move |state| {
        sink.lock().unwrap().push(state.is_valid);
    });

    let name = form.register("name", Rules::new().required());
    settle().await;
    name.on_change("").await.unwrap();
    settle().await;

    assert_eq!(*flags.lock().unwrap(), vec![true, false]);
    assert_eq!(form.get_value("name"), Value::from(""));
}
