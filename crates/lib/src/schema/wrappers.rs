//! Schemas that wrap a single inner schema.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use futures::{FutureExt, future::BoxFuture};

use crate::value::{Value, clone_object};

use super::{
    Schema,
    context::{IssueSink, ParseContext, ParseResult},
    issue::Issue,
};

pub(crate) fn run_optional<'a>(
    inner: &'a Schema,
    input: &'a Value,
    ctx: ParseContext<'a>,
) -> BoxFuture<'a, ParseResult> {
    match input {
        Value::Undefined => futures::future::ready(ParseResult::Valid(Value::Undefined)).boxed(),
        _ => inner.run(input, ctx),
    }
}

pub(crate) fn run_nullable<'a>(
    inner: &'a Schema,
    input: &'a Value,
    ctx: ParseContext<'a>,
) -> BoxFuture<'a, ParseResult> {
    match input {
        Value::Null => futures::future::ready(ParseResult::Valid(Value::Null)).boxed(),
        _ => inner.run(input, ctx),
    }
}

/// Produces the substitute for an undefined input.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Substitutes a default for `undefined`, then validates it like any input.
#[derive(Clone)]
pub struct DefaultSchema {
    pub(crate) inner: Schema,
    pub(crate) default: DefaultFn,
}

impl fmt::Debug for DefaultSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultSchema")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl DefaultSchema {
    /// Removes the default, returning the wrapped schema.
    pub fn remove_default(&self) -> Schema {
        self.inner.clone()
    }

    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        match input {
            Value::Undefined => async move {
                let substituted = (self.default)();
                self.inner.run(&substituted, ctx).await
            }
            .boxed(),
            _ => self.inner.run(input, ctx),
        }
    }
}

/// Computes the fallback from the swallowed issues and the original input.
pub type CatchFn = Arc<dyn Fn(&[Issue], &Value) -> Value + Send + Sync>;

/// Replaces any failure of the inner schema with a fallback value.
#[derive(Clone)]
pub struct CatchSchema {
    pub(crate) inner: Schema,
    pub(crate) catch: CatchFn,
}

impl fmt::Debug for CatchSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatchSchema")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl CatchSchema {
    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            let sink = IssueSink::new();
            let result = self.inner.run(input, ctx.with_sink(&sink)).await;
            match result {
                ParseResult::Valid(value) => ParseResult::Valid(value),
                _ => ParseResult::Valid((self.catch)(&sink.into_issues(), input)),
            }
        }
        .boxed()
    }
}

/// Tags a schema with a nominal brand. Parsing is unchanged.
#[derive(Debug, Clone)]
pub struct BrandedSchema {
    pub(crate) inner: Schema,
    pub(crate) brand: String,
}

impl BrandedSchema {
    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn unwrap(&self) -> &Schema {
        &self.inner
    }
}

/// Produces a detached copy of the parsed value.
pub(crate) fn run_readonly<'a>(
    inner: &'a Schema,
    input: &'a Value,
    ctx: ParseContext<'a>,
) -> BoxFuture<'a, ParseResult> {
    async move {
        match inner.run(input, ctx).await {
            ParseResult::Valid(value) => ParseResult::Valid(clone_object(&value)),
            ParseResult::Dirty(value) => ParseResult::Dirty(clone_object(&value)),
            ParseResult::Aborted => ParseResult::Aborted,
        }
    }
    .boxed()
}

/// Feeds the output of one schema into another.
#[derive(Debug, Clone)]
pub struct PipelineSchema {
    pub(crate) input: Schema,
    pub(crate) output: Schema,
}

impl PipelineSchema {
    /// A dirty intermediate result stops the pipeline without running the
    /// output schema.
    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            match self.input.run(input, ctx.clone()).await {
                ParseResult::Valid(intermediate) => self.output.run(&intermediate, ctx).await,
                other => other,
            }
        }
        .boxed()
    }
}

/// Builds the wrapped schema.
pub type LazyFn = Arc<dyn Fn() -> Schema + Send + Sync>;

/// Defers building the inner schema until first use, enabling recursion.
#[derive(Clone)]
pub struct LazySchema {
    pub(crate) getter: LazyFn,
    pub(crate) cached: Arc<OnceLock<Schema>>,
}

impl fmt::Debug for LazySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySchema")
            .field("resolved", &self.cached.get().is_some())
            .finish_non_exhaustive()
    }
}

impl LazySchema {
    pub(crate) fn new(getter: LazyFn) -> Self {
        Self {
            getter,
            cached: Arc::new(OnceLock::new()),
        }
    }

    /// The wrapped schema, built on first access.
    pub fn schema(&self) -> &Schema {
        self.cached.get_or_init(|| (self.getter)())
    }
}
