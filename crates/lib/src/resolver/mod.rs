//! Whole-form validation through a schema.
//!
//! A [`Resolver`] validates every form value at once and reports errors in
//! the controller's flat, path-keyed [`FieldErrors`] shape. [`SchemaResolver`]
//! is the implementation backed by a [`Schema`]; [`to_field_errors`] is the
//! adapter that turns a parse's issue list into field errors.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::{
    Result,
    constants::ROOT_ERROR_KEY,
    form::{FieldError, FieldErrors},
    path::{Path, PathBuf},
    schema::{CriteriaMode, Issue, IssueCode, ParseParams, SafeParse, Schema},
    value::Value,
};

/// What the controller asks a resolver to validate.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Fields whose results the caller will use; every mounted field when
    /// the whole form is validated.
    pub names: Vec<PathBuf>,
    /// Every registered field, used to place parent-level errors.
    pub registered: Vec<PathBuf>,
    pub criteria_mode: CriteriaMode,
}

/// Result of resolving a form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverOutcome {
    /// The parsed values on success, an empty object otherwise
    pub values: Value,
    pub errors: FieldErrors,
}

impl ResolverOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates all form values at once.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Validates `values`.
    ///
    /// Validation failures are reported in [`ResolverOutcome::errors`]; an
    /// `Err` means the resolver itself could not run.
    async fn resolve(&self, values: &Value, options: &ResolveOptions) -> Result<ResolverOutcome>;
}

/// A [`Resolver`] that parses the form values with a schema.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    schema: Schema,
    sync: bool,
    raw: bool,
}

impl SchemaResolver {
    pub fn new(schema: impl Into<Schema>) -> Self {
        Self {
            schema: schema.into(),
            sync: false,
            raw: false,
        }
    }

    /// Parses synchronously. Async effects in the schema become an error.
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Returns the raw input values on success instead of the parsed output.
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl Resolver for SchemaResolver {
    async fn resolve(&self, values: &Value, options: &ResolveOptions) -> Result<ResolverOutcome> {
        let params = ParseParams::new().with_criteria_mode(options.criteria_mode);
        let outcome = if self.sync {
            self.schema.safe_parse_with(values, params)?
        } else {
            self.schema.safe_parse_async(values, params).await?
        };

        Ok(match outcome {
            SafeParse::Success(parsed) => ResolverOutcome {
                values: if self.raw { values.clone() } else { parsed },
                errors: FieldErrors::new(),
            },
            SafeParse::Failure(err) => {
                tracing::debug!(issues = err.issues().len(), "schema resolver rejected values");
                ResolverOutcome {
                    values: Value::object(),
                    errors: to_field_errors(
                        err.into_issues(),
                        options.criteria_mode,
                        &options.registered,
                    ),
                }
            }
        })
    }
}

/// Converts a parse's issues into field errors.
///
/// The first issue at a path decides the error's kind and message; in
/// [`CriteriaMode::All`] every message is also collected into `types` by
/// issue code. Union failures are reported through their first branch issue
/// and every branch issue is processed as well.
///
/// An issue whose path has other erroring or registered fields below it is
/// stored under `<path>.root`, so a parent-level issue (an array length, an
/// object refinement) never replaces the errors of its children. Path-less
/// issues are stored under `root`.
pub fn to_field_errors(
    issues: Vec<Issue>,
    criteria_mode: CriteriaMode,
    registered: &[PathBuf],
) -> FieldErrors {
    let mut by_path: Vec<(PathBuf, FieldError)> = Vec::new();
    let mut queue: VecDeque<Issue> = issues.into();

    while let Some(issue) = queue.pop_front() {
        let path = issue.path_buf();
        let code = issue.code.name();

        let (kind, message) = match &issue.code {
            IssueCode::InvalidUnion { union_errors } => {
                queue.extend(union_errors.iter().flatten().cloned());
                match union_errors.first().and_then(|branch| branch.first()) {
                    Some(first) => (first.code.name(), first.message.clone()),
                    None => (code, issue.message.clone()),
                }
            }
            _ => (code, issue.message.clone()),
        };

        let index = match by_path.iter().position(|(existing, _)| *existing == path) {
            Some(index) => index,
            None => {
                by_path.push((path, FieldError::new(kind, message)));
                by_path.len() - 1
            }
        };
        if criteria_mode == CriteriaMode::All {
            by_path[index].1.push_type(code, issue.message);
        }
    }

    let erroring: Vec<PathBuf> = by_path.iter().map(|(path, _)| path.clone()).collect();
    let has_children = |path: &Path| {
        erroring
            .iter()
            .chain(registered)
            .any(|other| other.is_descendant_of(path))
    };

    let mut errors = FieldErrors::new();
    for (path, error) in by_path {
        let key = if path.is_empty() {
            ROOT_ERROR_KEY.to_string()
        } else if has_children(&*path) {
            path.push(ROOT_ERROR_KEY).as_str().to_string()
        } else {
            path.as_str().to_string()
        };
        merge_error(&mut errors, key, error);
    }
    errors
}

fn merge_error(errors: &mut FieldErrors, key: String, error: FieldError) {
    match errors.get_mut(&key) {
        Some(existing) => {
            for (kind, messages) in error.types {
                existing.types.entry(kind).or_default().extend(messages);
            }
        }
        None => {
            errors.insert(key, error);
        }
    }
}

/// Locates the error that belongs to `name` after a schema run.
///
/// Returns the key the error is stored under: `name` itself, a parent whose
/// error applies to it, or that parent's `root` entry. Stops climbing at the
/// first registered ancestor.
pub fn schema_error_lookup(
    errors: &FieldErrors,
    is_registered: impl Fn(&Path) -> bool,
    name: &Path,
) -> (PathBuf, Option<FieldError>) {
    if let Some(error) = errors.get(name.as_str()) {
        return (name.to_path_buf(), Some(error.clone()));
    }

    let mut current = Some(name.to_path_buf());
    while let Some(candidate) = current {
        if candidate.as_str() != name.as_str() && is_registered(&*candidate) {
            return (name.to_path_buf(), None);
        }
        if let Some(error) = errors.get(candidate.as_str()) {
            return (candidate, Some(error.clone()));
        }
        let root = candidate.clone().push(ROOT_ERROR_KEY);
        if let Some(error) = errors.get(root.as_str()) {
            return (root, Some(error.clone()));
        }
        current = candidate.parent();
    }
    (name.to_path_buf(), None)
}
