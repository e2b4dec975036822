//! Helpers for form controller tests

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use formstate::{
    FormControl, FormOptions, SchemaExt, Value,
    form::{FormState, Mode, Rules},
    resolver::SchemaResolver,
    schema::{object, string},
};
use serde_json::json;

use crate::helpers::v;

/// Lets spawned validity refreshes and other queued tasks run.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// A form with static default values.
pub fn form_with_defaults(defaults: serde_json::Value) -> FormControl {
    FormControl::new(FormOptions::new().default_values(v(defaults)))
}

/// A form validating on every change with the given defaults.
pub fn on_change_form(defaults: serde_json::Value) -> FormControl {
    FormControl::new(
        FormOptions::new()
            .mode(Mode::OnChange)
            .default_values(v(defaults)),
    )
}

/// Resolver for `{email: string().email(), name: string().min(2)}`.
pub fn contact_resolver() -> SchemaResolver {
    SchemaResolver::new(
        object()
            .field("email", string().email())
            .field("name", string().min(2))
            .into_schema(),
    )
}

fn at_least_three(value: &Value) -> bool {
    value.as_str().is_some_and(|text| text.chars().count() >= 3)
}

/// Rules with an async validator that answers after `delay`; values
/// shorter than three characters fail with "Too short".
pub fn slow_min_three(delay: Duration) -> Rules {
    Rules::new().validate_async(move |value: Value, _values: Value| async move {
        tokio::time::sleep(delay).await;
        if at_least_three(&value) {
            Ok(())
        } else {
            Err("Too short".to_string())
        }
    })
}

/// Resolver for `{name}` whose length check answers after `delay`.
pub fn slow_name_resolver(delay: Duration) -> SchemaResolver {
    SchemaResolver::new(
        object()
            .field(
                "name",
                string().refine_async(
                    move |value| async move {
                        tokio::time::sleep(delay).await;
                        Ok(at_least_three(&value))
                    },
                    "Too short",
                ),
            )
            .into_schema(),
    )
}

pub fn contact_defaults() -> serde_json::Value {
    json!({"email": "", "name": ""})
}

/// Shared slot a callback can record into.
pub fn recorder<T>() -> Arc<Mutex<Vec<T>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records every snapshot's `is_validating` flag.
pub fn validating_flags(states: &[FormState]) -> Vec<bool> {
    states.iter().map(|state| state.is_validating).collect()
}
