//! Combinators over several schemas: union, discriminated union, intersection.

use std::collections::HashMap;

use futures::{FutureExt, future::BoxFuture};

use crate::value::{Value, merge_values};

use super::{
    Schema, SchemaKind, TypeMessages, UNDEFINED,
    context::{IssueSink, ParseContext, ParseResult},
    errors::SchemaError,
    issue::IssueCode,
    object::ObjectSchema,
    primitives::UnitKind,
};

/// Accepts the first branch that validates.
#[derive(Debug, Clone)]
pub struct UnionSchema {
    pub(crate) options: Vec<Schema>,
}

impl UnionSchema {
    pub fn options(&self) -> &[Schema] {
        &self.options
    }

    /// Tries branches in order, each against its own issue sink.
    ///
    /// The first valid branch wins outright. Otherwise the first dirty branch
    /// wins and its issues are promoted. If every branch aborted, a single
    /// `invalid_union` issue carries every branch's issues.
    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let mut first_dirty: Option<(ParseResult, Vec<_>)> = None;
            let mut branch_issues = Vec::with_capacity(self.options.len());

            for option in &self.options {
                let sink = IssueSink::new();
                let result = option.run(input, ctx.with_sink(&sink)).await;
                match result {
                    ParseResult::Valid(_) => return result,
                    ParseResult::Dirty(_) if first_dirty.is_none() => {
                        first_dirty = Some((result, sink.into_issues()));
                    }
                    _ => branch_issues.push(sink.into_issues()),
                }
            }

            if let Some((result, issues)) = first_dirty {
                ctx.sink().extend(issues);
                return result;
            }

            ctx.add_issue(
                IssueCode::InvalidUnion {
                    union_errors: branch_issues,
                },
                input,
                None,
            );
            ParseResult::Aborted
        }
        .boxed()
    }
}

/// Hashable form of the primitive values a discriminator can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiscriminatorKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    BigInt(i128),
    String(String),
}

impl DiscriminatorKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Undefined => DiscriminatorKey::Undefined,
            Value::Null => DiscriminatorKey::Null,
            Value::Bool(b) => DiscriminatorKey::Bool(*b),
            // -0.0 and 0.0 select the same branch
            Value::Number(n) if *n == 0.0 => DiscriminatorKey::Number(0f64.to_bits()),
            Value::Number(n) => DiscriminatorKey::Number(n.to_bits()),
            Value::BigInt(n) => DiscriminatorKey::BigInt(*n),
            Value::String(s) => DiscriminatorKey::String(s.clone()),
            _ => return None,
        })
    }
}

/// The literal values `schema` accepts for a discriminator property.
fn discriminator_values(schema: &Schema) -> Vec<Value> {
    match schema.kind() {
        SchemaKind::Literal(literal) => vec![literal.value.clone()],
        SchemaKind::Enum(enumeration) => enumeration
            .options()
            .iter()
            .map(|v| Value::String(v.clone()))
            .collect(),
        SchemaKind::NativeEnum(native) => native.values().to_vec(),
        SchemaKind::Unit(unit) => match unit.kind {
            UnitKind::Undefined => vec![Value::Undefined],
            UnitKind::Null => vec![Value::Null],
            _ => Vec::new(),
        },
        SchemaKind::Optional(inner) => {
            let mut values = vec![Value::Undefined];
            values.extend(discriminator_values(inner));
            values
        }
        SchemaKind::Nullable(inner) => {
            let mut values = vec![Value::Null];
            values.extend(discriminator_values(inner));
            values
        }
        SchemaKind::Default(wrapper) => discriminator_values(&wrapper.inner),
        SchemaKind::Catch(wrapper) => discriminator_values(&wrapper.inner),
        SchemaKind::Branded(wrapper) => discriminator_values(&wrapper.inner),
        SchemaKind::Readonly(inner) => discriminator_values(inner),
        SchemaKind::Effects(effects) => discriminator_values(&effects.inner),
        SchemaKind::Lazy(lazy) => discriminator_values(lazy.schema()),
        _ => Vec::new(),
    }
}

/// Selects exactly one branch by the value of a discriminator property.
#[derive(Debug, Clone)]
pub struct DiscriminatedUnionSchema {
    pub(crate) discriminator: String,
    pub(crate) options: Vec<ObjectSchema>,
    pub(crate) dispatch: HashMap<DiscriminatorKey, usize>,
    pub(crate) accepted: Vec<Value>,
    pub(crate) messages: TypeMessages,
}

impl DiscriminatedUnionSchema {
    /// Builds the dispatch table from each branch's discriminator schema.
    ///
    /// Every branch must declare the discriminator with at least one literal
    /// value, and no value may select two branches.
    pub(crate) fn new(
        discriminator: impl Into<String>,
        options: Vec<ObjectSchema>,
    ) -> Result<Self, SchemaError> {
        let discriminator = discriminator.into();
        let mut dispatch = HashMap::new();
        let mut accepted = Vec::new();

        for (index, option) in options.iter().enumerate() {
            let values = option
                .get(&discriminator)
                .map(discriminator_values)
                .unwrap_or_default();
            if values.is_empty() {
                return Err(SchemaError::InvalidDiscriminatedUnion {
                    reason: format!(
                        "a discriminator value could not be extracted from option {index}"
                    ),
                    discriminator,
                });
            }
            for value in values {
                let Some(key) = DiscriminatorKey::from_value(&value) else {
                    return Err(SchemaError::InvalidDiscriminatedUnion {
                        reason: format!("value {value} cannot be used as a discriminator"),
                        discriminator,
                    });
                };
                if dispatch.insert(key, index).is_some() {
                    return Err(SchemaError::InvalidDiscriminatedUnion {
                        reason: format!("duplicate discriminator value {}", value.to_json()),
                        discriminator,
                    });
                }
                accepted.push(value);
            }
        }

        tracing::trace!(
            discriminator = %discriminator,
            branches = options.len(),
            "built discriminated union"
        );
        Ok(Self {
            discriminator,
            options,
            dispatch,
            accepted,
            messages: TypeMessages::default(),
        })
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn options(&self) -> &[ObjectSchema] {
        &self.options
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

            let tag = map.get(&self.discriminator).unwrap_or(&UNDEFINED);
            let branch = DiscriminatorKey::from_value(tag)
                .and_then(|key| self.dispatch.get(&key))
                .and_then(|index| self.options.get(*index));
            match branch {
                Some(option) => option.run(input, ctx).await,
                None => {
                    ctx.child(self.discriminator.as_str()).add_issue(
                        IssueCode::InvalidUnionDiscriminator {
                            options: self.accepted.clone(),
                        },
                        tag,
                        None,
                    );
                    ParseResult::Aborted
                }
            }
        }
        .boxed()
    }
}

/// Requires both sides to validate and merges their outputs.
#[derive(Debug, Clone)]
pub struct IntersectionSchema {
    pub(crate) left: Schema,
    pub(crate) right: Schema,
}

impl IntersectionSchema {
    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let left = self.left.run(input, ctx.clone()).await;
            let right = self.right.run(input, ctx.clone()).await;

            let mut status = left.status();
            status.merge(right.status());
            let (Some(l), Some(r)) = (left.value(), right.value()) else {
                return ParseResult::Aborted;
            };
            match merge_values(l, r) {
                Some(merged) => status.into_result(merged),
                None => {
                    ctx.add_issue(IssueCode::InvalidIntersectionTypes, input, None);
                    ParseResult::Aborted
                }
            }
        }
        .boxed()
    }
}
