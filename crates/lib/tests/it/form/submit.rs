//! Submission flow and its state flags

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use formstate::{
    FormControl, FormOptions, SchemaExt, Value,
    form::{CallbackError, FieldError, FieldErrors, Rules, SetErrorOptions},
    resolver::SchemaResolver,
    schema::{object, string},
};
use serde_json::json;

use super::helpers::*;
use crate::helpers::{CountingResolver, TestInput, v};

fn required_email_form() -> FormControl {
    FormControl::new(
        FormOptions::new()
            .default_values(v(json!({"email": ""})))
            .resolver(SchemaResolver::new(
                object().field("email", string().min(1)).into_schema(),
            )),
    )
}

#[tokio::test]
async fn test_submit_with_missing_required_email() {
    let form = required_email_form();
    form.register("email", Rules::new());
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);

    form.handle_submit(move |_| {
        flag.store(true, Ordering::SeqCst);
        async { Ok::<_, CallbackError>(()) }
    })
    .submit()
    .await
    .unwrap();

    let state = form.form_state();
    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(state.errors["email"].kind, "too_small");
    assert_eq!(
        state.errors["email"].message,
        "String must contain at least 1 character"
    );
    assert!(state.is_submitted);
    assert!(!state.is_submitting);
    assert!(!state.is_submit_successful);
    assert_eq!(state.submit_count, 1);
}

#[tokio::test]
async fn test_submit_passes_parsed_values() {
    let form = FormControl::new(
        FormOptions::new()
            .default_values(v(json!({"name": "  Ada "})))
            .resolver(SchemaResolver::new(
                object().field("name", string().trim()).into_schema(),
            )),
    );
    form.register("name", Rules::new());
    let received = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&received);

    form.handle_submit(move |values| {
        *sink.lock().unwrap() = Some(values);
        async { Ok::<_, CallbackError>(()) }
    })
    .submit()
    .await
    .unwrap();

    assert_eq!(*received.lock().unwrap(), Some(v(json!({"name": "Ada"}))));
    let state = form.form_state();
    assert!(state.is_submit_successful);
    assert!(state.errors.is_empty());
    // The form keeps its raw values
    assert_eq!(form.get_value("name"), Value::from("  Ada "));
}

#[tokio::test]
async fn test_invalid_submit_calls_on_invalid_and_focuses() {
    let form = FormControl::default();
    let input = TestInput::text();
    form.register("name", Rules::new().required().message("Required"))
        .attach(input.clone());
    let reported = recorder::<FieldErrors>();
    let sink = Arc::clone(&reported);

    form.handle_submit_with(
        |_| async { Ok::<_, CallbackError>(()) },
        move |errors| {
            sink.lock().unwrap().push(errors);
            async { Ok::<_, CallbackError>(()) }
        },
    )
    .submit()
    .await
    .unwrap();

    let reported = reported.lock().unwrap();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0]["name"], FieldError::new("required", "Required"));
    assert_eq!(input.focus_count(), 1);
}

#[tokio::test]
async fn test_invalid_submit_without_focus() {
    let form = FormControl::new(FormOptions::new().should_focus_error(false));
    let input = TestInput::text();
    form.register("name", Rules::new().required())
        .attach(input.clone());

    form.handle_submit(|_| async { Ok::<_, CallbackError>(()) })
        .submit()
        .await
        .unwrap();

    assert_eq!(input.focus_count(), 0);
}

#[tokio::test]
async fn test_failing_callback_still_finalizes_submit() {
    let form = FormControl::default();
    form.register("name", Rules::new());

    let err = form
        .handle_submit(|_| async { Err::<(), CallbackError>("network down".into()) })
        .submit()
        .await
        .unwrap_err();

    assert!(err.is_submit_error());
    assert!(err.is_callback_error());
    assert!(err.to_string().contains("network down"));
    let state = form.form_state();
    assert!(state.is_submitted);
    assert!(!state.is_submitting);
    assert!(!state.is_submit_successful);
    assert_eq!(state.submit_count, 1);
}

#[tokio::test]
async fn test_disabled_fields_are_left_out_of_submitted_values() {
    let form = form_with_defaults(json!({"a": 1, "b": 2}));
    form.register("a", Rules::new());
    form.register("b", Rules::new().disabled(true));
    let received = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&received);

    form.handle_submit(move |values| {
        *sink.lock().unwrap() = Some(values);
        async { Ok::<_, CallbackError>(()) }
    })
    .submit()
    .await
    .unwrap();

    assert_eq!(*received.lock().unwrap(), Some(v(json!({"a": 1}))));
    assert_eq!(form.get_value("b"), Value::from(2));
}

#[tokio::test]
async fn test_submit_clears_manual_root_errors() {
    let form = FormControl::default();
    form.register("name", Rules::new());
    form.set_error(
        "root.server",
        FieldError::new("server", "Service unavailable"),
        SetErrorOptions::default(),
    );

    form.handle_submit(|_| async { Ok::<_, CallbackError>(()) })
        .submit()
        .await
        .unwrap();

    let state = form.form_state();
    assert!(state.errors.is_empty());
    assert!(state.is_submit_successful);
}

#[tokio::test]
async fn test_resolver_failure_finalizes_submit() {
    let schema = string().refine_async(|_| async { Ok::<_, String>(true) }, "never");
    let resolver = SchemaResolver::new(object().field("name", schema).into_schema()).sync();
    let form = FormControl::new(
        FormOptions::new()
            .default_values(v(json!({"name": "Ada"})))
            .resolver(resolver),
    );
    form.register("name", Rules::new());

    let err = form
        .handle_submit(|_| async { Ok::<_, CallbackError>(()) })
        .submit()
        .await
        .unwrap_err();

    assert!(err.is_form_error());
    assert!(!err.is_submit_error());
    let state = form.form_state();
    assert_eq!(state.submit_count, 1);
    assert!(!state.is_submit_successful);
    assert!(!state.is_submitting);
}

#[tokio::test]
async fn test_each_submit_runs_the_resolver_once() {
    let resolver = CountingResolver::new(SchemaResolver::new(
        object().field("email", string().min(1)).into_schema(),
    ));
    let calls = resolver.counter();
    let form = FormControl::new(
        FormOptions::new()
            .default_values(v(json!({"email": ""})))
            .resolver(resolver),
    );
    let email = form.register("email", Rules::new());
    let submit = form.handle_submit(|_| async { Ok::<_, CallbackError>(()) });

    submit.submit().await.unwrap();
    email.on_change("a@b.co").await.unwrap();
    submit.submit().await.unwrap();

    let state = form.form_state();
    // The change after the first submit re-validates on change
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(state.submit_count, 2);
    assert!(state.is_submit_successful);
    assert!(state.errors.is_empty());
}
