//! Sequence and keyed collection schemas: array, tuple, record, map, set.

use futures::{FutureExt, future::BoxFuture};

use crate::{path::Segment, value::Value};

use super::{
    Check, Schema, TypeMessages,
    context::{
        ObjectEntry, ParseContext, ParseResult, ParseStatus, merge_items, merge_object,
    },
    issue::{IssueCode, SizeKind},
};

#[derive(Debug, Clone, Copy)]
pub(crate) enum LengthCheck {
    Exact(usize),
    Min(usize),
    Max(usize),
}

/// Reports every violated length constraint. Violations never short-circuit.
fn check_lengths(
    checks: &[Check<LengthCheck>],
    kind: SizeKind,
    len: usize,
    input: &Value,
    ctx: &ParseContext<'_>,
    status: &mut ParseStatus,
) {
    for check in checks {
        let failure = match check.kind {
            LengthCheck::Exact(exact) if len > exact => Some(IssueCode::TooBig {
                kind,
                maximum: exact as f64,
                inclusive: true,
                exact: true,
            }),
            LengthCheck::Exact(exact) if len < exact => Some(IssueCode::TooSmall {
                kind,
                minimum: exact as f64,
                inclusive: true,
                exact: true,
            }),
            LengthCheck::Min(min) if len < min => Some(IssueCode::TooSmall {
                kind,
                minimum: min as f64,
                inclusive: true,
                exact: false,
            }),
            LengthCheck::Max(max) if len > max => Some(IssueCode::TooBig {
                kind,
                maximum: max as f64,
                inclusive: true,
                exact: false,
            }),
            _ => None,
        };
        if let Some(code) = failure {
            ctx.add_issue(code, input, check.message.as_deref());
            status.dirty();
        }
    }
}

/// Validates arrays whose elements all match one schema.
#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub(crate) element: Schema,
    pub(crate) lengths: Vec<Check<LengthCheck>>,
    pub(crate) messages: TypeMessages,
}

impl ArraySchema {
    pub(crate) fn new(element: Schema) -> Self {
        Self {
            element,
            lengths: Vec::new(),
            messages: TypeMessages::default(),
        }
    }

    pub fn element(&self) -> &Schema {
        &self.element
    }

    /// Overrides the message of the most recently added length constraint.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.lengths.last_mut() {
            last.message = Some(message.into());
        }
        self
    }

    pub fn min(mut self, len: usize) -> Self {
        self.lengths.push(Check::new(LengthCheck::Min(len)));
        self
    }

    pub fn max(mut self, len: usize) -> Self {
        self.lengths.push(Check::new(LengthCheck::Max(len)));
        self
    }

    pub fn length(mut self, len: usize) -> Self {
        self.lengths.push(Check::new(LengthCheck::Exact(len)));
        self
    }

    pub fn nonempty(self) -> Self {
        self.min(1)
    }

    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let Value::Array(items) = input else {
                self.messages.invalid_type(&ctx, "array", input);
                return ParseResult::Aborted;
            };

            let mut status = ParseStatus::Valid;
            check_lengths(
                &self.lengths,
                SizeKind::Array,
                items.len(),
                input,
                &ctx,
                &mut status,
            );

            let mut results = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                results.push(self.element.run(item, ctx.child(index)).await);
            }
            merge_items(status, results).map_or(ParseResult::Aborted, |(status, items)| {
                status.into_result(Value::Array(items))
            })
        }
        .boxed()
    }
}

/// Validates fixed-position arrays, with an optional schema for extra items.
#[derive(Debug, Clone)]
pub struct TupleSchema {
    pub(crate) items: Vec<Schema>,
    pub(crate) rest: Option<Schema>,
    pub(crate) messages: TypeMessages,
}

impl TupleSchema {
    pub(crate) fn new(items: Vec<Schema>) -> Self {
        Self {
            items,
            rest: None,
            messages: TypeMessages::default(),
        }
    }

    /// Accepts any number of trailing items matching `schema`.
    pub fn rest(mut self, schema: impl Into<Schema>) -> Self {
        self.rest = Some(schema.into());
        self
    }

    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let Value::Array(values) = input else {
                self.messages.invalid_type(&ctx, "array", input);
                return ParseResult::Aborted;
            };

            if values.len() < self.items.len() {
                ctx.add_issue(
                    IssueCode::TooSmall {
                        kind: SizeKind::Array,
                        minimum: self.items.len() as f64,
                        inclusive: true,
                        exact: false,
                    },
                    input,
                    None,
                );
                return ParseResult::Aborted;
            }

            let mut status = ParseStatus::Valid;
            if self.rest.is_none() && values.len() > self.items.len() {
                ctx.add_issue(
                    IssueCode::TooBig {
                        kind: SizeKind::Array,
                        maximum: self.items.len() as f64,
                        inclusive: true,
                        exact: false,
                    },
                    input,
                    None,
                );
                status.dirty();
            }

            let mut results = Vec::with_capacity(values.len());
            for (index, value) in values.iter().enumerate() {
                let Some(schema) = self.items.get(index).or(self.rest.as_ref()) else {
                    break;
                };
                results.push(schema.run(value, ctx.child(index)).await);
            }
            merge_items(status, results).map_or(ParseResult::Aborted, |(status, items)| {
                status.into_result(Value::Array(items))
            })
        }
        .boxed()
    }
}

/// Validates objects used as dictionaries: every key and value is checked.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub(crate) key: Schema,
    pub(crate) value: Schema,
    pub(crate) messages: TypeMessages,
}

impl RecordSchema {
    pub(crate) fn new(key: Schema, value: Schema) -> Self {
        Self {
            key,
            value,
            messages: TypeMessages::default(),
        }
    }

    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let Value::Object(map) = input else {
                self.messages.invalid_type(&ctx, "object", input);
                return ParseResult::Aborted;
            };

            let mut status = ParseStatus::Valid;
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                let raw_key = Value::String(key.clone());
                let key_result = self.key.run(&raw_key, ctx.child(key.as_str())).await;
                status.merge(key_result.status());
                let Some(parsed_key) = key_result.into_value() else {
                    return ParseResult::Aborted;
                };
                let result = self.value.run(value, ctx.child(key.as_str())).await;
                entries.push(ObjectEntry {
                    key: parsed_key
                        .as_str()
                        .map_or_else(|| parsed_key.to_string(), str::to_string),
                    result,
                    always_set: true,
                });
            }
            merge_object(status, entries)
        }
        .boxed()
    }
}

/// Validates key/value maps.
#[derive(Debug, Clone)]
pub struct MapSchema {
    pub(crate) key: Schema,
    pub(crate) value: Schema,
    pub(crate) messages: TypeMessages,
}

impl MapSchema {
    pub(crate) fn new(key: Schema, value: Schema) -> Self {
        Self {
            key,
            value,
            messages: TypeMessages::default(),
        }
    }

    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let Value::Map(pairs) = input else {
                self.messages.invalid_type(&ctx, "map", input);
                return ParseResult::Aborted;
            };

            let mut status = ParseStatus::Valid;
            let mut output = Vec::with_capacity(pairs.len());
            for (index, (key, value)) in pairs.iter().enumerate() {
                let entry_ctx = ctx.child(index);
                let key_result = self.key.run(key, entry_ctx.child("key")).await;
                let value_result = self.value.run(value, entry_ctx.child("value")).await;
                status.merge(key_result.status());
                status.merge(value_result.status());
                if let (Some(k), Some(v)) = (key_result.into_value(), value_result.into_value()) {
                    output.push((k, v));
                }
            }
            status.into_result(Value::Map(output))
        }
        .boxed()
    }
}

/// Validates sets of unique values.
#[derive(Debug, Clone)]
pub struct SetSchema {
    pub(crate) element: Schema,
    pub(crate) sizes: Vec<Check<LengthCheck>>,
    pub(crate) messages: TypeMessages,
}

impl SetSchema {
    pub(crate) fn new(element: Schema) -> Self {
        Self {
            element,
            sizes: Vec::new(),
            messages: TypeMessages::default(),
        }
    }

    /// Overrides the message of the most recently added size constraint.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.sizes.last_mut() {
            last.message = Some(message.into());
        }
        self
    }

    pub fn min(mut self, size: usize) -> Self {
        self.sizes.push(Check::new(LengthCheck::Min(size)));
        self
    }

    pub fn max(mut self, size: usize) -> Self {
        self.sizes.push(Check::new(LengthCheck::Max(size)));
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.sizes.push(Check::new(LengthCheck::Exact(size)));
        self
    }

    pub fn nonempty(self) -> Self {
        self.min(1)
    }

    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let Value::Set(items) = input else {
                self.messages.invalid_type(&ctx, "set", input);
                return ParseResult::Aborted;
            };

            let mut status = ParseStatus::Valid;
            check_lengths(
                &self.sizes,
                SizeKind::Set,
                items.len(),
                input,
                &ctx,
                &mut status,
            );

            let mut results = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                results.push(self.element.run(item, ctx.child(Segment::Index(index))).await);
            }
            merge_items(status, results).map_or(ParseResult::Aborted, |(status, items)| {
                status.into_result(Value::Set(items))
            })
        }
        .boxed()
    }
}
