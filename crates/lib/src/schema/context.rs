//! Parse state threaded through schema nodes.
//!
//! A [`ParseContext`] is an immutable value passed by argument into every
//! node: it carries the current path, the shared parameters of the parse call
//! and an [`IssueSink`]. The sink is the only mutable part and is append-only.
//! Combinators that must isolate their children (unions, catch) hand them a
//! context pointing at a fresh sink.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{
    path::Segment,
    value::{Object, Value},
};

use super::{
    errors::SchemaError,
    issue::{ErrorMap, Issue, IssueCode, default_message},
};

/// Whether a parse stops at the first failing check of a node or collects
/// every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CriteriaMode {
    #[default]
    FirstError,
    All,
}

/// Per-call parameters of a parse.
#[derive(Debug, Clone, Default)]
pub struct ParseParams {
    pub criteria_mode: CriteriaMode,
    pub error_map: Option<ErrorMap>,
}

impl ParseParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria_mode(mut self, mode: CriteriaMode) -> Self {
        self.criteria_mode = mode;
        self
    }

    pub fn with_error_map(mut self, map: ErrorMap) -> Self {
        self.error_map = Some(map);
        self
    }
}

/// State shared by every node of one parse call.
#[derive(Debug)]
pub(crate) struct ParseShared {
    params: ParseParams,
    is_async: bool,
    misuse: Mutex<Option<SchemaError>>,
}

impl ParseShared {
    pub(crate) fn new(params: ParseParams, is_async: bool) -> Self {
        Self {
            params,
            is_async,
            misuse: Mutex::new(None),
        }
    }

    pub(crate) fn take_misuse(&self) -> Option<SchemaError> {
        self.misuse
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Append-only accumulator of issues.
#[derive(Debug, Default)]
pub struct IssueSink(Mutex<Vec<Issue>>);

impl IssueSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn issues(&self) -> MutexGuard<'_, Vec<Issue>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, issue: Issue) {
        self.issues().push(issue);
    }

    pub fn extend(&self, issues: impl IntoIterator<Item = Issue>) {
        self.issues().extend(issues);
    }

    pub fn len(&self) -> usize {
        self.issues().len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues().is_empty()
    }

    /// Removes and returns every issue collected so far.
    pub fn take(&self) -> Vec<Issue> {
        std::mem::take(&mut *self.issues())
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.0.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Where a node is in the input and where its issues go.
#[derive(Debug, Clone)]
pub struct ParseContext<'a> {
    shared: &'a ParseShared,
    sink: &'a IssueSink,
    path: Vec<Segment>,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn root(shared: &'a ParseShared, sink: &'a IssueSink) -> Self {
        Self {
            shared,
            sink,
            path: Vec::new(),
        }
    }

    /// A context one segment deeper.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Self {
            shared: self.shared,
            sink: self.sink,
            path,
        }
    }

    /// The same position, reporting into another sink.
    pub fn with_sink<'b>(&self, sink: &'b IssueSink) -> ParseContext<'b>
    where
        'a: 'b,
    {
        ParseContext {
            shared: self.shared,
            sink,
            path: self.path.clone(),
        }
    }

    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    pub fn is_async(&self) -> bool {
        self.shared.is_async
    }

    pub fn criteria_mode(&self) -> CriteriaMode {
        self.shared.params.criteria_mode
    }

    /// Stop after the first failing check of a node?
    pub fn first_error_only(&self) -> bool {
        self.criteria_mode() == CriteriaMode::FirstError
    }

    pub fn sink(&self) -> &'a IssueSink {
        self.sink
    }

    /// Resolves the message for an issue raised at this position.
    pub fn message_for(&self, code: &IssueCode, input: &Value, custom: Option<&str>) -> String {
        match (custom, &self.shared.params.error_map) {
            (Some(message), _) => message.to_string(),
            (None, Some(map)) => map.message(code, input),
            (None, None) => default_message(code, input),
        }
    }

    /// Records an issue at the current path.
    pub fn add_issue(&self, code: IssueCode, input: &Value, custom: Option<&str>) {
        let message = self.message_for(&code, input, custom);
        self.sink.push(Issue {
            code,
            path: self.path.clone(),
            message,
            fatal: false,
        });
    }

    /// Records a fully built issue whose path is relative to this position.
    pub fn add_relative(&self, mut issue: Issue) {
        let mut path = self.path.clone();
        path.append(&mut issue.path);
        issue.path = path;
        self.sink.push(issue);
    }

    /// Flags API misuse. The parse entry point turns it into an error.
    pub fn misuse(&self, error: SchemaError) {
        let mut slot = self
            .shared
            .misuse
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            tracing::debug!(%error, "schema misuse during parse");
            *slot = Some(error);
        }
    }
}

/// Aggregate status of a parse result, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ParseStatus {
    #[default]
    Valid,
    Dirty,
    Aborted,
}

impl ParseStatus {
    /// Raises to `Dirty` unless already aborted.
    pub fn dirty(&mut self) {
        if *self == ParseStatus::Valid {
            *self = ParseStatus::Dirty;
        }
    }

    pub fn abort(&mut self) {
        *self = ParseStatus::Aborted;
    }

    pub fn merge(&mut self, other: ParseStatus) {
        *self = (*self).max(other);
    }

    /// Pairs the status with a value.
    pub fn into_result(self, value: Value) -> ParseResult {
        match self {
            ParseStatus::Valid => ParseResult::Valid(value),
            ParseStatus::Dirty => ParseResult::Dirty(value),
            ParseStatus::Aborted => ParseResult::Aborted,
        }
    }
}

/// Outcome of parsing one node.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// Accepted without issues
    Valid(Value),
    /// Accepted, but a descendant reported a non-fatal issue
    Dirty(Value),
    /// No usable value
    Aborted,
}

impl ParseResult {
    pub fn status(&self) -> ParseStatus {
        match self {
            ParseResult::Valid(_) => ParseStatus::Valid,
            ParseResult::Dirty(_) => ParseStatus::Dirty,
            ParseResult::Aborted => ParseStatus::Aborted,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ParseResult::Valid(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ParseResult::Aborted)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ParseResult::Valid(v) | ParseResult::Dirty(v) => Some(v),
            ParseResult::Aborted => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            ParseResult::Valid(v) | ParseResult::Dirty(v) => Some(v),
            ParseResult::Aborted => None,
        }
    }

    /// Downgrades a valid result to dirty.
    pub fn into_dirty(self) -> Self {
        match self {
            ParseResult::Valid(v) => ParseResult::Dirty(v),
            other => other,
        }
    }
}

/// Combines element results: any abort aborts the array, any dirty
/// element makes it dirty.
pub fn merge_array(results: Vec<ParseResult>) -> ParseResult {
    merge_items(ParseStatus::Valid, results).map_or(ParseResult::Aborted, |(status, items)| {
        status.into_result(Value::Array(items))
    })
}

pub(crate) fn merge_items(
    mut status: ParseStatus,
    results: Vec<ParseResult>,
) -> Option<(ParseStatus, Vec<Value>)> {
    let mut items = Vec::with_capacity(results.len());
    for result in results {
        status.merge(result.status());
        items.push(result.into_value()?);
    }
    (status != ParseStatus::Aborted).then_some((status, items))
}

/// One parsed object property.
pub struct ObjectEntry {
    pub key: String,
    pub result: ParseResult,
    /// The key was present in the input, so an undefined value is kept.
    pub always_set: bool,
}

/// Combines property results into an object.
///
/// Undefined values are dropped unless the key was present in the input, and
/// a `__proto__` key is never written.
pub fn merge_object(mut status: ParseStatus, entries: Vec<ObjectEntry>) -> ParseResult {
    let mut object = Object::new();
    for entry in entries {
        status.merge(entry.result.status());
        let Some(value) = entry.result.into_value() else {
            return ParseResult::Aborted;
        };
        if entry.key != "__proto__" && (!value.is_undefined() || entry.always_set) {
            object.insert(entry.key, value);
        }
    }
    status.into_result(Value::Object(object))
}
