//! Validation modes, built-in rules, resolvers and manual errors

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use formstate::{
    FormControl, FormOptions, Value,
    form::{
        CallbackError, FieldError, Mode, ReValidateMode, Rules, SetErrorOptions,
        SetValueOptions, StateField, TriggerOptions,
    },
    path::PathBuf,
    schema::CriteriaMode,
    value::get,
};
use regex::Regex;
use serde_json::json;

use super::helpers::*;
use crate::helpers::{CountingResolver, TestInput, v};

fn error_kind(form: &FormControl, name: &str) -> Option<String> {
    form.get_field_state(name).error.map(|error| error.kind)
}

// ===== MODES =====

#[tokio::test]
async fn test_on_submit_mode_defers_validation() {
    let form = form_with_defaults(json!({"name": ""}));
    let name = form.register(
        "name",
        Rules::new().required().message("Name is required"),
    );

    name.on_change("").await.unwrap();
    name.on_blur().await.unwrap();
    assert!(form.form_state().errors.is_empty());

    assert!(!form.trigger().await.unwrap());
    let error = form.get_field_state("name").error.unwrap();
    assert_eq!(error.kind, "required");
    assert_eq!(error.message, "Name is required");
    assert!(!form.form_state().is_valid);
}

#[tokio::test]
async fn test_on_change_mode_validates_each_change() {
    let form = on_change_form(json!({"name": ""}));
    let name = form.register("name", Rules::new().min_length(3).message("Too short"));

    name.on_change("ab").await.unwrap();
    let error = form.get_field_state("name").error.unwrap();
    assert_eq!(error.kind, "minLength");
    assert_eq!(error.message, "Too short");

    name.on_change("abc").await.unwrap();
    assert!(form.get_field_state("name").error.is_none());

    // Blur events do not validate in this mode
    name.on_change("a").await.unwrap();
    form.clear_errors();
    name.on_blur().await.unwrap();
    assert!(form.form_state().errors.is_empty());
}

#[tokio::test]
async fn test_on_blur_mode_validates_on_blur_only() {
    let form = FormControl::new(
        FormOptions::new()
            .mode(Mode::OnBlur)
            .default_values(v(json!({"name": ""}))),
    );
    let name = form.register("name", Rules::new().required());

    name.on_change("").await.unwrap();
    assert!(form.form_state().errors.is_empty());

    name.on_blur().await.unwrap();
    assert_eq!(error_kind(&form, "name").as_deref(), Some("required"));
}

#[tokio::test]
async fn test_on_touched_mode_validates_changes_after_first_blur() {
    let form = FormControl::new(FormOptions::new().mode(Mode::OnTouched));
    let code = form.register("code", Rules::new().min_length(4));

    code.on_change("ab").await.unwrap();
    assert!(error_kind(&form, "code").is_none());

    code.on_blur().await.unwrap();
    assert_eq!(error_kind(&form, "code").as_deref(), Some("minLength"));

    code.on_change("abcd").await.unwrap();
    assert!(error_kind(&form, "code").is_none());
}

#[tokio::test]
async fn test_all_mode_validates_changes_and_blurs() {
    let form = FormControl::new(FormOptions::new().mode(Mode::All));
    let code = form.register("code", Rules::new().required());

    code.on_change("").await.unwrap();
    assert_eq!(error_kind(&form, "code").as_deref(), Some("required"));

    form.clear_errors();
    code.on_blur().await.unwrap();
    assert_eq!(error_kind(&form, "code").as_deref(), Some("required"));
}

#[tokio::test]
async fn test_revalidate_mode_applies_after_submit() {
    let form = FormControl::new(
        FormOptions::new()
            .re_validate_mode(ReValidateMode::OnBlur)
            .default_values(v(json!({"name": ""}))),
    );
    let name = form.register("name", Rules::new().required());
    form.handle_submit(|_| async { Ok::<_, CallbackError>(()) })
        .submit()
        .await
        .unwrap();
    assert_eq!(error_kind(&form, "name").as_deref(), Some("required"));

    // Changes no longer validate; the blur does
    name.on_change("Ada").await.unwrap();
    assert_eq!(error_kind(&form, "name").as_deref(), Some("required"));
    name.on_blur().await.unwrap();
    assert!(error_kind(&form, "name").is_none());
}

// ===== BUILT-IN RULES =====

#[tokio::test]
async fn test_number_bounds() {
    let form = on_change_form(json!({}));
    let qty = form.register(
        "qty",
        Rules::new().min(1.0).message("At least one").max(10.0),
    );

    qty.on_change(0).await.unwrap();
    let error = form.get_field_state("qty").error.unwrap();
    assert_eq!(error.kind, "min");
    assert_eq!(error.message, "At least one");

    qty.on_change(11).await.unwrap();
    assert_eq!(error_kind(&form, "qty").as_deref(), Some("max"));

    qty.on_change("5").await.unwrap();
    assert!(error_kind(&form, "qty").is_none());
}

#[tokio::test]
async fn test_empty_values_skip_everything_but_required() {
    let form = on_change_form(json!({}));
    let zip = form.register(
        "zip",
        Rules::new()
            .min_length(5)
            .pattern(Regex::new("^[0-9]+$").unwrap()),
    );

    zip.on_change("").await.unwrap();
    assert!(error_kind(&form, "zip").is_none());

    zip.on_change("12a45").await.unwrap();
    assert_eq!(error_kind(&form, "zip").as_deref(), Some("pattern"));
}

#[tokio::test]
async fn test_criteria_all_collects_every_failing_rule() {
    let form = FormControl::new(FormOptions::new().criteria_mode(CriteriaMode::All));
    form.register(
        "code",
        Rules::new()
            .min_length(5)
            .message("Too short")
            .pattern(Regex::new("^[0-9]+$").unwrap())
            .message("Digits only"),
    );
    form.set_value("code", "ab", SetValueOptions::default())
        .await
        .unwrap();

    assert!(!form.trigger_field("code").await.unwrap());

    let error = form.get_field_state("code").error.unwrap();
    assert_eq!(error.kind, "minLength");
    assert_eq!(error.types["minLength"], vec!["Too short".to_string()]);
    assert_eq!(error.types["pattern"], vec!["Digits only".to_string()]);
}

#[tokio::test]
async fn test_first_error_criteria_leaves_types_empty() {
    let form = FormControl::default();
    form.register(
        "code",
        Rules::new()
            .min_length(5)
            .pattern(Regex::new("^[0-9]+$").unwrap()),
    );
    form.set_value("code", "ab", SetValueOptions::default())
        .await
        .unwrap();

    form.trigger().await.unwrap();

    let error = form.get_field_state("code").error.unwrap();
    assert_eq!(error.kind, "minLength");
    assert!(error.types.is_empty());
}

#[tokio::test]
async fn test_named_custom_validator() {
    let form = on_change_form(json!({}));
    let qty = form.register(
        "qty",
        Rules::new().validate_named("positive", |value, _| match value {
            Value::Number(n) if *n > 0.0 => Ok(()),
            _ => Err("Must be positive".to_string()),
        }),
    );

    qty.on_change(-1).await.unwrap();

    let error = form.get_field_state("qty").error.unwrap();
    assert_eq!(error.kind, "positive");
    assert_eq!(error.message, "Must be positive");
}

#[tokio::test]
async fn test_disabled_field_is_not_validated() {
    let form = FormControl::default();
    form.register("name", Rules::new().required().disabled(true));

    assert!(form.trigger().await.unwrap());
    assert!(form.form_state().errors.is_empty());
}

#[tokio::test]
async fn test_confirm_password_revalidates_through_deps() {
    let form = on_change_form(json!({"password": "", "confirm": ""}));
    let password = form.register("password", Rules::new().deps(["confirm"]));
    let confirm = form.register(
        "confirm",
        Rules::new().validate_async(|value: Value, values: Value| async move {
            if get(&values, "password") == Some(&value) {
                Ok(())
            } else {
                Err("Passwords do not match".to_string())
            }
        }),
    );

    password.on_change("secret").await.unwrap();
    let error = form.get_field_state("confirm").error.unwrap();
    assert_eq!(error.kind, "validate");
    assert_eq!(error.message, "Passwords do not match");

    confirm.on_change("secret").await.unwrap();
    assert!(form.get_field_state("confirm").error.is_none());

    password.on_change("changed").await.unwrap();
    assert!(form.get_field_state("confirm").error.is_some());
}

// ===== RESOLVERS =====

#[tokio::test]
async fn test_resolver_reports_field_errors_on_change() {
    let form = FormControl::new(
        FormOptions::new()
            .mode(Mode::OnChange)
            .default_values(v(contact_defaults()))
            .resolver(contact_resolver()),
    );
    let email = form.register("email", Rules::new());
    form.register("name", Rules::new());

    email.on_change("nope").await.unwrap();

    let error = form.get_field_state("email").error.unwrap();
    assert_eq!(error.kind, "invalid_string");
    assert_eq!(error.message, "Invalid email");
    // Only the changed field's error is written
    assert!(form.get_field_state("name").error.is_none());
    assert!(!form.form_state().is_valid);
}

#[tokio::test]
async fn test_skipped_events_never_call_the_resolver() {
    let resolver = CountingResolver::new(contact_resolver());
    let calls = resolver.counter();
    let form = FormControl::new(
        FormOptions::new()
            .default_values(v(contact_defaults()))
            .resolver(resolver),
    );
    let email = form.register("email", Rules::new());

    email.on_change("a@b.co").await.unwrap();
    email.on_blur().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    form.trigger().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fields_without_rules_skip_validation_entirely() {
    let form = on_change_form(json!({"note": ""}));
    let note = form.register("note", Rules::new());
    let updates = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&updates);
    let _subscription = form.subscribe([StateField::IsValidating], move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    note.on_change("anything").await.unwrap();

    assert_eq!(updates.load(Ordering::SeqCst), 0);
    assert_eq!(form.get_value("note"), Value::from("anything"));
}

#[tokio::test]
async fn test_validation_publishes_validating_flags() {
    let form = on_change_form(json!({}));
    let name = form.register("name", Rules::new().required());
    let states = recorder();
    let sink = Arc::clone(&states);
    let _subscription = form.subscribe([StateField::IsValidating], move |state| {
        sink.lock().unwrap().push(state.clone());
    });

    name.on_change("Ada").await.unwrap();

    let states = states.lock().unwrap();
    assert_eq!(validating_flags(&states), vec![true, false]);
    assert!(!form.get_field_state("name").is_validating);
}

#[tokio::test]
async fn test_trigger_field_only_touches_its_errors() {
    let form = FormControl::new(
        FormOptions::new()
            .default_values(v(contact_defaults()))
            .resolver(contact_resolver()),
    );
    form.register("email", Rules::new());
    form.register("name", Rules::new());

    assert!(!form.trigger_field("email").await.unwrap());
    let errors = form.form_state().errors;
    assert!(errors.contains_key("email"));
    assert!(!errors.contains_key("name"));

    assert!(!form.trigger().await.unwrap());
    assert_eq!(form.form_state().errors.len(), 2);
}

#[tokio::test]
async fn test_trigger_with_focus_moves_to_first_invalid_field() {
    let form = FormControl::default();
    let first = TestInput::text();
    let second = TestInput::text();
    form.register("first", Rules::new().required()).attach(first.clone());
    form.register("second", Rules::new().required()).attach(second.clone());

    let valid = form
        .trigger_with(None, TriggerOptions { should_focus: true })
        .await
        .unwrap();

    assert!(!valid);
    assert_eq!(first.focus_count(), 1);
    assert_eq!(second.focus_count(), 0);
}

#[tokio::test]
async fn test_trigger_fields_with_builtin_rules() {
    let form = FormControl::default();
    form.register("a", Rules::new().required());
    form.register("b", Rules::new().required());

    assert!(!form.trigger_fields(["a"]).await.unwrap());
    assert_eq!(
        form.form_state().errors.keys().cloned().collect::<Vec<_>>(),
        vec!["a".to_string()]
    );
}

// ===== DELAYED ERRORS =====

#[tokio::test(start_paused = true)]
async fn test_delay_error_shows_error_after_delay() {
    let form = FormControl::new(
        FormOptions::new()
            .mode(Mode::OnChange)
            .delay_error(Duration::from_millis(500)),
    );
    let name = form.register("name", Rules::new().min_length(3));

    name.on_change("a").await.unwrap();
    assert!(form.form_state().errors.is_empty());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(error_kind(&form, "name").as_deref(), Some("minLength"));

    name.on_change("abc").await.unwrap();
    assert!(form.form_state().errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delay_error_is_cancelled_by_a_valid_change() {
    let form = FormControl::new(
        FormOptions::new()
            .mode(Mode::OnChange)
            .delay_error(Duration::from_millis(500)),
    );
    let name = form.register("name", Rules::new().min_length(3));

    name.on_change("a").await.unwrap();
    name.on_change("abcd").await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(form.form_state().errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delayed_error_publishes_errors_once_shown() {
    let form = FormControl::new(
        FormOptions::new()
            .mode(Mode::OnChange)
            .delay_error(Duration::from_millis(500)),
    );
    let name = form.register("name", Rules::new().min_length(3));
    let notified = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&notified);
    let _subscription = form.subscribe([StateField::Errors], move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    name.on_change("a").await.unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(error_kind(&form, "name").as_deref(), Some("minLength"));
}

// ===== ASYNC ORDERING =====

#[tokio::test(start_paused = true)]
async fn test_change_result_for_unregistered_field_is_dropped() {
    let form = on_change_form(json!({"name": ""}));
    let name = form.register("name", slow_min_three(Duration::from_millis(50)));

    let (result, ()) = tokio::join!(name.on_change("x"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        form.unregister("name");
    });

    result.unwrap();
    assert!(form.form_state().errors.is_empty());
    assert!(!form.form_state().is_validating);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_result_for_unregistered_field_is_dropped() {
    let form = form_with_defaults(json!({"a": "x", "b": "y"}));
    form.register("a", slow_min_three(Duration::from_millis(50)));
    form.register("b", slow_min_three(Duration::from_millis(50)));

    let (valid, ()) = tokio::join!(form.trigger(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        form.unregister("a");
    });

    assert!(!valid.unwrap());
    let errors = form.form_state().errors;
    assert!(!errors.contains_key("a"));
    assert_eq!(errors["b"].message, "Too short");
}

#[tokio::test(start_paused = true)]
async fn test_resolver_result_for_unregistered_field_is_dropped() {
    let form = FormControl::new(
        FormOptions::new()
            .default_values(v(json!({"name": "x"})))
            .resolver(slow_name_resolver(Duration::from_millis(50))),
    );
    form.register("name", Rules::new());

    let (valid, ()) = tokio::join!(form.trigger(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        form.unregister("name");
    });

    assert!(valid.unwrap());
    assert!(form.form_state().errors.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_result_for_an_outdated_value_is_dropped() {
    let form = on_change_form(json!({"name": ""}));
    let name = form.register("name", slow_min_three(Duration::from_millis(50)));

    let (result, ()) = tokio::join!(name.on_change("ab"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        form.set_value("name", "abcd", SetValueOptions::default())
            .await
            .unwrap();
    });

    result.unwrap();
    assert_eq!(form.get_value("name"), Value::from("abcd"));
    assert!(error_kind(&form, "name").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_triggers_last_write_wins() {
    let form = form_with_defaults(json!({"name": "ab"}));
    form.register("name", slow_min_three(Duration::from_millis(50)));

    let (first, second, between) = tokio::join!(
        form.trigger_field("name"),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            form.set_value("name", "abcd", SetValueOptions::default())
                .await
                .unwrap();
            form.trigger_field("name").await
        },
        async {
            tokio::time::sleep(Duration::from_millis(55)).await;
            error_kind(&form, "name")
        },
    );

    // The first run saw "ab" and wrote its error before the second finished
    assert!(!first.unwrap());
    assert_eq!(between.as_deref(), Some("validate"));
    assert!(second.unwrap());
    assert!(error_kind(&form, "name").is_none());
    assert!(!form.form_state().is_validating);
}

// ===== MANUAL ERRORS =====

#[tokio::test]
async fn test_set_error_marks_form_invalid_and_focuses() {
    let form = FormControl::default();
    let input = TestInput::text();
    form.register("email", Rules::new()).attach(input.clone());

    form.set_error(
        "email",
        FieldError::new("server", "Already registered"),
        SetErrorOptions { should_focus: true },
    );

    let state = form.form_state();
    assert!(!state.is_valid);
    assert_eq!(state.errors["email"].message, "Already registered");
    assert_eq!(input.focus_count(), 1);
}

#[tokio::test]
async fn test_set_error_keeps_existing_types() {
    let form = FormControl::default();
    form.set_error(
        "code",
        FieldError::new("minLength", "short").with_type("pattern", "digits"),
        SetErrorOptions::default(),
    );

    form.set_error(
        "code",
        FieldError::new("server", "rejected"),
        SetErrorOptions::default(),
    );

    let error = form.get_field_state("code").error.unwrap();
    assert_eq!(error.kind, "server");
    assert_eq!(error.types["pattern"], vec!["digits".to_string()]);
}

#[tokio::test]
async fn test_clear_errors_for_removes_nested_errors() {
    let form = FormControl::default();
    for name in ["items.0.name", "items.1.name", "title"] {
        form.set_error(
            name,
            FieldError::new("required", ""),
            SetErrorOptions::default(),
        );
    }
    assert!(form.get_field_state("items").invalid);

    form.clear_errors_for([PathBuf::from("items")]);

    let errors = form.form_state().errors;
    assert_eq!(
        errors.keys().cloned().collect::<Vec<_>>(),
        vec!["title".to_string()]
    );
    assert!(!form.get_field_state("items").invalid);

    form.clear_errors();
    assert!(form.form_state().errors.is_empty());
}
