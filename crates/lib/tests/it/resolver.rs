//! Issue-to-field-error adaptation and the schema resolver

use formstate::{
    FieldError, FieldErrors, SchemaExt, Value,
    path::{Path, PathBuf},
    resolver::{ResolveOptions, Resolver, SchemaResolver, schema_error_lookup, to_field_errors},
    schema::{CriteriaMode, ParseParams, array, number, object, string},
};
use serde_json::json;

use crate::helpers::v;

fn issues(schema: formstate::Schema, input: serde_json::Value) -> Vec<formstate::schema::Issue> {
    schema
        .safe_parse_with(&v(input), ParseParams::new().with_criteria_mode(CriteriaMode::All))
        .unwrap()
        .error()
        .map(|err| err.issues().to_vec())
        .unwrap_or_default()
}

fn keys(errors: &FieldErrors) -> Vec<&str> {
    errors.keys().map(String::as_str).collect()
}

fn line_items() -> formstate::Schema {
    object()
        .field(
            "items",
            array(object().field("name", string().min(1))).min(2),
        )
        .into_schema()
}

#[test]
fn test_parent_issue_moves_to_root_key_when_children_fail() {
    let found = issues(line_items(), json!({"items": [{"name": ""}]}));
    let errors = to_field_errors(found, CriteriaMode::FirstError, &[]);

    assert_eq!(keys(&errors), vec!["items.0.name", "items.root"]);
    assert_eq!(errors["items.root"].kind, "too_small");
    assert_eq!(
        errors["items.root"].message,
        "Array must contain at least 2 element(s)"
    );
}

#[test]
fn test_parent_issue_moves_to_root_key_when_children_are_registered() {
    let found = issues(line_items(), json!({"items": [{"name": "ok"}]}));

    let unregistered = to_field_errors(found.clone(), CriteriaMode::FirstError, &[]);
    assert_eq!(keys(&unregistered), vec!["items"]);

    let registered = [PathBuf::from("items.0.name")];
    let errors = to_field_errors(found, CriteriaMode::FirstError, &registered);
    assert_eq!(keys(&errors), vec!["items.root"]);
}

#[test]
fn test_pathless_issue_is_stored_under_root() {
    let schema = object()
        .field("a", number())
        .refine(|_| false, "Something is off");
    let errors = to_field_errors(issues(schema, json!({"a": 1})), CriteriaMode::FirstError, &[]);

    assert_eq!(
        errors.get("root"),
        Some(&FieldError::new("custom", "Something is off"))
    );
}

#[test]
fn test_all_criteria_collects_types() {
    let schema = object()
        .field("email", string().min(5).email())
        .into_schema();
    let errors = to_field_errors(
        issues(schema, json!({"email": "ab"})),
        CriteriaMode::All,
        &[],
    );

    let error = &errors["email"];
    assert_eq!(error.kind, "too_small");
    assert_eq!(error.types.len(), 2);
    assert_eq!(error.types["invalid_string"], vec!["Invalid email".to_string()]);
}

#[test]
fn test_first_error_mode_keeps_first_issue_only() {
    let schema = object()
        .field("email", string().min(5).email())
        .into_schema();
    let errors = to_field_errors(
        issues(schema, json!({"email": "ab"})),
        CriteriaMode::FirstError,
        &[],
    );

    assert_eq!(errors["email"].kind, "too_small");
    assert!(errors["email"].types.is_empty());
}

#[test]
fn test_union_failure_uses_first_branch_issue() {
    let schema = object()
        .field("contact", string().email().or(number()))
        .into_schema();
    let errors = to_field_errors(
        issues(schema, json!({"contact": true})),
        CriteriaMode::FirstError,
        &[],
    );

    assert_eq!(
        errors["contact"],
        FieldError::new("invalid_type", "Expected string, received boolean")
    );
}

#[test]
fn test_error_lookup_climbs_to_parent_root() {
    let mut errors = FieldErrors::new();
    errors.insert("items.root".to_string(), FieldError::new("too_small", "Add more"));

    let name = PathBuf::from("items.0.name");
    let (key, error) = schema_error_lookup(&errors, |_: &Path| false, &name);
    assert_eq!(key.as_str(), "items.root");
    assert_eq!(error.unwrap().message, "Add more");

    // A registered ancestor owns its own errors; the lookup stops there.
    let (key, error) =
        schema_error_lookup(&errors, |path: &Path| path.as_str() == "items.0", &name);
    assert_eq!(key, name);
    assert!(error.is_none());
}

#[test]
fn test_error_lookup_prefers_exact_match() {
    let mut errors = FieldErrors::new();
    errors.insert("user".to_string(), FieldError::new("custom", "parent"));
    errors.insert("user.email".to_string(), FieldError::new("custom", "child"));

    let (key, error) = schema_error_lookup(&errors, |_: &Path| false, &PathBuf::from("user.email"));
    assert_eq!(key.as_str(), "user.email");
    assert_eq!(error.unwrap().message, "child");

    let (key, _) = schema_error_lookup(&errors, |_: &Path| false, &PathBuf::from("user.name"));
    assert_eq!(key.as_str(), "user");
}

// ===== SCHEMA RESOLVER =====

fn trimmed_name() -> formstate::Schema {
    object()
        .field("name", string().trim().min(1))
        .into_schema()
}

#[tokio::test]
async fn test_schema_resolver_returns_parsed_values() {
    let resolver = SchemaResolver::new(trimmed_name());
    let outcome = resolver
        .resolve(&v(json!({"name": "  Ada "})), &ResolveOptions::default())
        .await
        .unwrap();

    assert!(outcome.is_valid());
    assert_eq!(outcome.values, v(json!({"name": "Ada"})));
}

#[tokio::test]
async fn test_schema_resolver_raw_mode_returns_input() {
    let resolver = SchemaResolver::new(trimmed_name()).raw();
    let input = v(json!({"name": "  Ada "}));
    let outcome = resolver
        .resolve(&input, &ResolveOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.values, input);
}

#[tokio::test]
async fn test_schema_resolver_failure_has_empty_values() {
    let resolver = SchemaResolver::new(trimmed_name());
    let outcome = resolver
        .resolve(&v(json!({"name": "   "})), &ResolveOptions::default())
        .await
        .unwrap();

    assert!(!outcome.is_valid());
    assert_eq!(outcome.values, Value::object());
    assert_eq!(outcome.errors["name"].kind, "too_small");
}

#[tokio::test]
async fn test_sync_resolver_rejects_async_schema() {
    let schema = object().field(
        "name",
        string().refine_async(|_| async move { Ok::<_, String>(true) }, "unused"),
    );
    let resolver = SchemaResolver::new(schema).sync();

    let err = resolver
        .resolve(&v(json!({"name": "x"})), &ResolveOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_schema_error());

    let outcome = SchemaResolver::new(resolver.schema().clone())
        .resolve(&v(json!({"name": "x"})), &ResolveOptions::default())
        .await
        .unwrap();
    assert!(outcome.is_valid());
}
