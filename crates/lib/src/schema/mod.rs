//! Composable schema validation.
//!
//! A [`Schema`] is an immutable, cheaply cloned tree of nodes built from the
//! constructor functions in this module ([`string`], [`object`], [`union`],
//! ...) and the combinators of [`SchemaExt`]. Schemas describe shape, not
//! state, so one schema can be shared by any number of forms.
//!
//! Parsing produces either the validated (possibly transformed) value or a
//! [`ValidationError`] holding every [`Issue`] found. Internally each node
//! returns a [`ParseResult`] whose status is `Valid`, `Dirty` (accepted with a
//! non-fatal issue) or `Aborted` (no usable value); parents merge child
//! statuses so that `Aborted` dominates `Dirty`, which dominates `Valid`.
//!
//! ```
//! use formstate::schema::{number, object, string, SchemaExt};
//! use formstate::Value;
//! use serde_json::json;
//!
//! let signup = object()
//!     .field("email", string().email())
//!     .field("age", number().int().min(18.0))
//!     .into_schema();
//!
//! let outcome = signup
//!     .safe_parse(&Value::from(json!({"email": "nope", "age": 12})))
//!     .unwrap();
//! let error = outcome.error().unwrap();
//! assert_eq!(error.issues().len(), 2);
//! assert_eq!(error.issues()[0].path_buf().as_str(), "email");
//! ```
//!
//! Schemas containing async refinements or transforms must be parsed with the
//! `*_async` entry points. A synchronous parse that reaches one returns
//! [`SchemaError::AsyncInSyncParse`] rather than a validation result.

use std::{fmt, future::Future, sync::Arc};

use futures::{
    FutureExt,
    future::{BoxFuture, ready},
};

use crate::value::Value;

pub mod collections;
pub mod context;
pub mod effects;
pub mod enums;
pub mod errors;
pub mod issue;
pub mod number;
pub mod object;
pub mod primitives;
pub mod string;
pub mod union;
pub mod wrappers;

pub use collections::{ArraySchema, MapSchema, RecordSchema, SetSchema, TupleSchema};
pub use context::{
    CriteriaMode, IssueSink, ParseContext, ParseParams, ParseResult, ParseStatus, merge_array,
    merge_object,
};
pub use effects::{CustomIssue, Effect, EffectsSchema, RefinementCtx};
pub use enums::{EnumSchema, LiteralSchema, NativeEnumSchema};
pub use errors::{ParseError, SchemaError};
pub use issue::{
    ErrorMap, FlattenedErrors, Issue, IssueCode, SizeKind, StringValidation, ValidationError,
    default_message,
};
pub use number::{BigIntSchema, NumberSchema, float_safe_remainder};
pub use object::{ObjectSchema, UnknownKeys};
pub use primitives::{BooleanSchema, DateSchema, UnitKind, UnitSchema};
pub use string::StringSchema;
pub use union::{DiscriminatedUnionSchema, DiscriminatorKey, IntersectionSchema, UnionSchema};
pub use wrappers::{BrandedSchema, CatchSchema, DefaultSchema, LazySchema, PipelineSchema};

use context::ParseShared;

/// Stand-in for a missing input.
pub(crate) static UNDEFINED: Value = Value::Undefined;

/// One configured check and its optional message override.
#[derive(Debug, Clone)]
pub(crate) struct Check<K> {
    pub(crate) kind: K,
    pub(crate) message: Option<String>,
}

impl<K> Check<K> {
    pub(crate) fn new(kind: K) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

/// Schema-level messages for a type mismatch.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeMessages {
    pub(crate) required: Option<String>,
    pub(crate) invalid_type: Option<String>,
}

impl TypeMessages {
    /// Reports `invalid_type`; an undefined input uses the required message.
    pub(crate) fn invalid_type(&self, ctx: &ParseContext<'_>, expected: &str, input: &Value) {
        let custom = if input.is_undefined() {
            self.required.as_deref()
        } else {
            self.invalid_type.as_deref()
        };
        ctx.add_issue(
            IssueCode::InvalidType {
                expected: expected.to_string(),
                received: input.value_type(),
            },
            input,
            custom,
        );
    }
}

macro_rules! impl_type_messages {
    ($($schema:ty),* $(,)?) => {
        $(
            impl $schema {
                /// Message used when the input is missing.
                pub fn required_error(mut self, message: impl Into<String>) -> Self {
                    self.messages.required = Some(message.into());
                    self
                }

                /// Message used when the input has the wrong type.
                pub fn invalid_type_error(mut self, message: impl Into<String>) -> Self {
                    self.messages.invalid_type = Some(message.into());
                    self
                }
            }
        )*
    };
}

impl_type_messages!(
    StringSchema,
    NumberSchema,
    BigIntSchema,
    BooleanSchema,
    DateSchema,
    UnitSchema,
    ObjectSchema,
    ArraySchema,
    TupleSchema,
    RecordSchema,
    MapSchema,
    SetSchema,
    DiscriminatedUnionSchema,
    EnumSchema,
    NativeEnumSchema,
);

/// Every node type a schema tree can contain.
#[derive(Debug)]
pub enum SchemaKind {
    // Leaves
    String(StringSchema),
    Number(NumberSchema),
    BigInt(BigIntSchema),
    Boolean(BooleanSchema),
    Date(DateSchema),
    Unit(UnitSchema),
    Literal(LiteralSchema),
    Enum(EnumSchema),
    NativeEnum(NativeEnumSchema),

    // Containers
    Object(ObjectSchema),
    Array(ArraySchema),
    Tuple(TupleSchema),
    Record(RecordSchema),
    Map(MapSchema),
    Set(SetSchema),

    // Combinators
    Union(UnionSchema),
    DiscriminatedUnion(DiscriminatedUnionSchema),
    Intersection(IntersectionSchema),

    // Wrappers
    Optional(Schema),
    Nullable(Schema),
    Default(DefaultSchema),
    Catch(CatchSchema),
    Branded(BrandedSchema),
    Readonly(Schema),
    Pipeline(PipelineSchema),
    Lazy(LazySchema),
    Effects(EffectsSchema),
}

impl SchemaKind {
    /// Short node name, used in logs and debug output.
    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::String(_) => "string",
            SchemaKind::Number(_) => "number",
            SchemaKind::BigInt(_) => "bigint",
            SchemaKind::Boolean(_) => "boolean",
            SchemaKind::Date(_) => "date",
            SchemaKind::Unit(unit) => match unit.kind {
                UnitKind::Undefined => "undefined",
                UnitKind::Null => "null",
                UnitKind::Void => "void",
                UnitKind::Nan => "nan",
                UnitKind::Any => "any",
                UnitKind::Unknown => "unknown",
                UnitKind::Never => "never",
            },
            SchemaKind::Literal(_) => "literal",
            SchemaKind::Enum(_) => "enum",
            SchemaKind::NativeEnum(_) => "native_enum",
            SchemaKind::Object(_) => "object",
            SchemaKind::Array(_) => "array",
            SchemaKind::Tuple(_) => "tuple",
            SchemaKind::Record(_) => "record",
            SchemaKind::Map(_) => "map",
            SchemaKind::Set(_) => "set",
            SchemaKind::Union(_) => "union",
            SchemaKind::DiscriminatedUnion(_) => "discriminated_union",
            SchemaKind::Intersection(_) => "intersection",
            SchemaKind::Optional(_) => "optional",
            SchemaKind::Nullable(_) => "nullable",
            SchemaKind::Default(_) => "default",
            SchemaKind::Catch(_) => "catch",
            SchemaKind::Branded(_) => "branded",
            SchemaKind::Readonly(_) => "readonly",
            SchemaKind::Pipeline(_) => "pipeline",
            SchemaKind::Lazy(_) => "lazy",
            SchemaKind::Effects(_) => "effects",
        }
    }
}

/// Outcome of a safe parse.
#[derive(Debug, Clone, PartialEq)]
pub enum SafeParse {
    Success(Value),
    Failure(ValidationError),
}

impl SafeParse {
    pub fn is_success(&self) -> bool {
        matches!(self, SafeParse::Success(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            SafeParse::Success(value) => Some(value),
            SafeParse::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            SafeParse::Success(_) => None,
            SafeParse::Failure(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<Value, ValidationError> {
        match self {
            SafeParse::Success(value) => Ok(value),
            SafeParse::Failure(err) => Err(err),
        }
    }

    fn from_parts(result: ParseResult, issues: Vec<Issue>) -> Self {
        match result {
            ParseResult::Valid(value) => SafeParse::Success(value),
            _ => SafeParse::Failure(ValidationError::new(issues)),
        }
    }
}

/// A shareable schema tree.
#[derive(Clone)]
pub struct Schema(Arc<SchemaKind>);

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schema({})", self.0.name())
    }
}

impl Schema {
    pub fn new(kind: SchemaKind) -> Self {
        Self(Arc::new(kind))
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.0
    }

    /// Returns true if both handles share the same node.
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Parses one node. Leaves resolve immediately; containers and effects
    /// return a future that completes without suspending unless an async
    /// effect is awaited.
    pub fn run<'a>(&'a self, input: &'a Value, ctx: ParseContext<'a>) -> BoxFuture<'a, ParseResult> {
        match self.kind() {
            SchemaKind::String(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::Number(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::BigInt(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::Boolean(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::Date(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::Unit(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::Literal(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::Enum(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::NativeEnum(s) => ready(s.parse(input, &ctx)).boxed(),
            SchemaKind::Object(s) => s.run(input, ctx),
            SchemaKind::Array(s) => s.run(input, ctx),
            SchemaKind::Tuple(s) => s.run(input, ctx),
            SchemaKind::Record(s) => s.run(input, ctx),
            SchemaKind::Map(s) => s.run(input, ctx),
            SchemaKind::Set(s) => s.run(input, ctx),
            SchemaKind::Union(s) => s.run(input, ctx),
            SchemaKind::DiscriminatedUnion(s) => s.run(input, ctx),
            SchemaKind::Intersection(s) => s.run(input, ctx),
            SchemaKind::Optional(inner) => wrappers::run_optional(inner, input, ctx),
            SchemaKind::Nullable(inner) => wrappers::run_nullable(inner, input, ctx),
            SchemaKind::Default(s) => s.run(input, ctx),
            SchemaKind::Catch(s) => s.run(input, ctx),
            SchemaKind::Branded(s) => s.inner.run(input, ctx),
            SchemaKind::Readonly(inner) => wrappers::run_readonly(inner, input, ctx),
            SchemaKind::Pipeline(s) => s.run(input, ctx),
            SchemaKind::Lazy(s) => s.schema().run(input, ctx),
            SchemaKind::Effects(s) => s.run(input, ctx),
        }
    }

    /// Validates `input` synchronously with default parameters.
    pub fn safe_parse(&self, input: &Value) -> Result<SafeParse, SchemaError> {
        self.safe_parse_with(input, ParseParams::default())
    }

    /// Validates `input` synchronously.
    ///
    /// Returns `Err` only for misuse, i.e. when the tree contains an async
    /// effect.
    pub fn safe_parse_with(
        &self,
        input: &Value,
        params: ParseParams,
    ) -> Result<SafeParse, SchemaError> {
        tracing::trace!(schema = self.0.name(), "sync parse");
        let shared = ParseShared::new(params, false);
        let sink = IssueSink::new();
        let outcome = self
            .run(input, ParseContext::root(&shared, &sink))
            .now_or_never();
        if let Some(misuse) = shared.take_misuse() {
            return Err(misuse);
        }
        match outcome {
            Some(result) => Ok(SafeParse::from_parts(result, sink.into_issues())),
            None => Err(SchemaError::AsyncInSyncParse { node: self.0.name() }),
        }
    }

    /// Validates `input`, awaiting any async effects.
    pub async fn safe_parse_async(
        &self,
        input: &Value,
        params: ParseParams,
    ) -> Result<SafeParse, SchemaError> {
        tracing::trace!(schema = self.0.name(), "async parse");
        let shared = ParseShared::new(params, true);
        let sink = IssueSink::new();
        let result = self.run(input, ParseContext::root(&shared, &sink)).await;
        if let Some(misuse) = shared.take_misuse() {
            return Err(misuse);
        }
        Ok(SafeParse::from_parts(result, sink.into_issues()))
    }

    /// Returns the validated value or the reason it was rejected.
    pub fn parse(&self, input: &Value) -> Result<Value, ParseError> {
        Ok(self.safe_parse(input)?.into_result()?)
    }

    pub async fn parse_async(&self, input: &Value) -> Result<Value, ParseError> {
        Ok(self
            .safe_parse_async(input, ParseParams::default())
            .await?
            .into_result()?)
    }

    /// Returns true when the schema accepts `undefined`.
    pub fn is_optional(&self) -> bool {
        matches!(self.safe_parse(&Value::Undefined), Ok(SafeParse::Success(_)))
    }

    /// Returns true when the schema accepts `null`.
    pub fn is_nullable(&self) -> bool {
        matches!(self.safe_parse(&Value::Null), Ok(SafeParse::Success(_)))
    }
}

macro_rules! impl_into_schema {
    ($($schema:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$schema> for Schema {
                fn from(schema: $schema) -> Self {
                    Schema::new(SchemaKind::$variant(schema))
                }
            }
        )*
    };
}

impl_into_schema!(
    StringSchema => String,
    NumberSchema => Number,
    BigIntSchema => BigInt,
    BooleanSchema => Boolean,
    DateSchema => Date,
    UnitSchema => Unit,
    LiteralSchema => Literal,
    EnumSchema => Enum,
    NativeEnumSchema => NativeEnum,
    ObjectSchema => Object,
    ArraySchema => Array,
    TupleSchema => Tuple,
    RecordSchema => Record,
    MapSchema => Map,
    SetSchema => Set,
    UnionSchema => Union,
    DiscriminatedUnionSchema => DiscriminatedUnion,
    IntersectionSchema => Intersection,
    PipelineSchema => Pipeline,
    LazySchema => Lazy,
    EffectsSchema => Effects,
);

/// Combinators available on every schema builder.
pub trait SchemaExt: Into<Schema> + Sized {
    fn into_schema(self) -> Schema {
        self.into()
    }

    /// Accepts `undefined` without running the inner schema.
    fn optional(self) -> Schema {
        Schema::new(SchemaKind::Optional(self.into()))
    }

    /// Accepts `null` without running the inner schema.
    fn nullable(self) -> Schema {
        Schema::new(SchemaKind::Nullable(self.into()))
    }

    fn nullish(self) -> Schema {
        self.nullable().optional()
    }

    /// Substitutes `value` for `undefined`. The substitute is still validated.
    fn default_value(self, value: impl Into<Value>) -> Schema {
        let value = value.into();
        self.default_with(move || value.clone())
    }

    fn default_with<F>(self, factory: F) -> Schema
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Schema::new(SchemaKind::Default(DefaultSchema {
            inner: self.into(),
            default: Arc::new(factory),
        }))
    }

    /// Replaces any failure with `value`.
    fn catch(self, value: impl Into<Value>) -> Schema {
        let value = value.into();
        self.catch_with(move |_, _| value.clone())
    }

    fn catch_with<F>(self, fallback: F) -> Schema
    where
        F: Fn(&[Issue], &Value) -> Value + Send + Sync + 'static,
    {
        Schema::new(SchemaKind::Catch(CatchSchema {
            inner: self.into(),
            catch: Arc::new(fallback),
        }))
    }

    /// Adds a custom issue when `check` returns false.
    fn refine<F>(self, check: F, message: impl Into<String>) -> Schema
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        self.super_refine(move |value, ctx| {
            if !check(value) {
                ctx.add_issue(CustomIssue::new(message.clone()));
            }
        })
    }

    /// Like [`refine`](Self::refine), reporting at a descendant path.
    fn refine_at<F>(self, check: F, message: impl Into<String>, path: &str) -> Schema
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        let path = path.to_string();
        self.super_refine(move |value, ctx| {
            if !check(value) {
                ctx.add_issue(CustomIssue::new(message.clone()).at(path.as_str()));
            }
        })
    }

    /// Runs `refinement` on the inner output; it reports through the context.
    fn super_refine<F>(self, refinement: F) -> Schema
    where
        F: Fn(&Value, &mut RefinementCtx) + Send + Sync + 'static,
    {
        EffectsSchema {
            inner: self.into(),
            effect: Effect::Refinement(Arc::new(refinement)),
        }
        .into()
    }

    /// Async [`refine`](Self::refine). An `Err` from the future becomes a
    /// custom issue carrying its message.
    fn refine_async<F, Fut>(self, check: F, message: impl Into<String>) -> Schema
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, String>> + Send + 'static,
    {
        let message = message.into();
        let check = Arc::new(check);
        EffectsSchema {
            inner: self.into(),
            effect: Effect::RefinementAsync(Arc::new(move |value: Value| {
                let message = message.clone();
                let pending = check(value);
                async move {
                    match pending.await {
                        Ok(true) => Ok(Vec::new()),
                        Ok(false) => Ok(vec![CustomIssue::new(message)]),
                        Err(rejection) => Err(rejection),
                    }
                }
                .boxed()
            })),
        }
        .into()
    }

    /// Maps the validated value. Runs only when the inner result is valid.
    fn transform<F>(self, transform: F) -> Schema
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform_with(move |value, _| transform(value))
    }

    /// [`transform`](Self::transform) that may also report issues.
    fn transform_with<F>(self, transform: F) -> Schema
    where
        F: Fn(Value, &mut RefinementCtx) -> Value + Send + Sync + 'static,
    {
        EffectsSchema {
            inner: self.into(),
            effect: Effect::Transform(Arc::new(transform)),
        }
        .into()
    }

    /// Async [`transform`](Self::transform). An `Err` from the future becomes
    /// a custom issue and aborts.
    fn transform_async<F, Fut>(self, transform: F) -> Schema
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        EffectsSchema {
            inner: self.into(),
            effect: Effect::TransformAsync(Arc::new(move |value: Value| transform(value).boxed())),
        }
        .into()
    }

    fn brand(self, brand: impl Into<String>) -> Schema {
        Schema::new(SchemaKind::Branded(BrandedSchema {
            inner: self.into(),
            brand: brand.into(),
        }))
    }

    fn readonly(self) -> Schema {
        Schema::new(SchemaKind::Readonly(self.into()))
    }

    /// Parses with `self`, then feeds the output to `next`.
    fn pipe(self, next: impl Into<Schema>) -> Schema {
        PipelineSchema {
            input: self.into(),
            output: next.into(),
        }
        .into()
    }

    fn or(self, other: impl Into<Schema>) -> Schema {
        union([self.into_schema(), other.into()])
    }

    fn and(self, other: impl Into<Schema>) -> Schema {
        intersection(self, other)
    }

    fn array(self) -> ArraySchema {
        ArraySchema::new(self.into())
    }
}

impl<T: Into<Schema>> SchemaExt for T {}

pub fn string() -> StringSchema {
    StringSchema::default()
}

pub fn number() -> NumberSchema {
    NumberSchema::default()
}

pub fn bigint() -> BigIntSchema {
    BigIntSchema::default()
}

pub fn boolean() -> BooleanSchema {
    BooleanSchema::default()
}

pub fn date() -> DateSchema {
    DateSchema::default()
}

pub fn nan() -> UnitSchema {
    UnitSchema::new(UnitKind::Nan)
}

pub fn undefined() -> UnitSchema {
    UnitSchema::new(UnitKind::Undefined)
}

pub fn null() -> UnitSchema {
    UnitSchema::new(UnitKind::Null)
}

pub fn void() -> UnitSchema {
    UnitSchema::new(UnitKind::Void)
}

pub fn any() -> UnitSchema {
    UnitSchema::new(UnitKind::Any)
}

pub fn unknown() -> UnitSchema {
    UnitSchema::new(UnitKind::Unknown)
}

pub fn never() -> UnitSchema {
    UnitSchema::new(UnitKind::Never)
}

pub fn literal(value: impl Into<Value>) -> LiteralSchema {
    LiteralSchema {
        value: value.into(),
        message: None,
    }
}

/// A string enum over `values`.
pub fn enumeration(values: impl IntoIterator<Item = impl Into<String>>) -> EnumSchema {
    EnumSchema::new(values)
}

/// An enum over a host enumeration's name/value pairs.
pub fn native_enum(
    entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
) -> NativeEnumSchema {
    NativeEnumSchema::new(
        entries
            .into_iter()
            .map(|(name, value)| (name.into(), value.into())),
    )
}

pub fn object() -> ObjectSchema {
    ObjectSchema::default()
}

pub fn array(element: impl Into<Schema>) -> ArraySchema {
    ArraySchema::new(element.into())
}

pub fn tuple(items: impl IntoIterator<Item = Schema>) -> TupleSchema {
    TupleSchema::new(items.into_iter().collect())
}

/// A dictionary whose keys match `key` and values match `value`.
pub fn record(key: impl Into<Schema>, value: impl Into<Schema>) -> RecordSchema {
    RecordSchema::new(key.into(), value.into())
}

pub fn map(key: impl Into<Schema>, value: impl Into<Schema>) -> MapSchema {
    MapSchema::new(key.into(), value.into())
}

pub fn set(element: impl Into<Schema>) -> SetSchema {
    SetSchema::new(element.into())
}

pub fn union(options: impl IntoIterator<Item = Schema>) -> Schema {
    UnionSchema {
        options: options.into_iter().collect(),
    }
    .into()
}

/// Builds a union that dispatches on `discriminator`.
///
/// Fails when a branch has no literal value for the discriminator or two
/// branches share a value.
pub fn discriminated_union(
    discriminator: impl Into<String>,
    options: impl IntoIterator<Item = ObjectSchema>,
) -> Result<DiscriminatedUnionSchema, SchemaError> {
    DiscriminatedUnionSchema::new(discriminator, options.into_iter().collect())
}

pub fn intersection(left: impl Into<Schema>, right: impl Into<Schema>) -> Schema {
    IntersectionSchema {
        left: left.into(),
        right: right.into(),
    }
    .into()
}

/// Defers building the schema until first use, for recursive shapes.
pub fn lazy<F>(getter: F) -> Schema
where
    F: Fn() -> Schema + Send + Sync + 'static,
{
    LazySchema::new(Arc::new(getter)).into()
}

/// Rewrites the raw input with `preprocess` before `schema` parses it.
pub fn preprocess<F>(preprocess: F, schema: impl Into<Schema>) -> Schema
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    EffectsSchema {
        inner: schema.into(),
        effect: Effect::Preprocess(Arc::new(preprocess)),
    }
    .into()
}
