//! Preprocess, refinement and transform effects.
//!
//! Async effects are flagged when they are built. A synchronous parse that
//! reaches one reports misuse instead of blocking.

use std::{fmt, sync::Arc};

use futures::{FutureExt, future::BoxFuture};

use crate::{
    path::{PathBuf, Segment},
    value::Value,
};

use super::{
    Schema,
    context::{ParseContext, ParseResult, ParseStatus},
    errors::SchemaError,
    issue::{Issue, IssueCode},
};

/// An issue raised by user code inside a refinement or transform.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomIssue {
    pub message: String,
    /// Relative to the value being refined
    pub path: Vec<Segment>,
    pub fatal: bool,
    pub params: Option<Value>,
}

impl CustomIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            fatal: false,
            params: None,
        }
    }

    /// Points the issue at a descendant, e.g. `"confirm"` or `"items[0].name"`.
    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into().segments().collect();
        self
    }

    /// Aborts the enclosing parse instead of marking it dirty.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn with_params(mut self, params: impl Into<Value>) -> Self {
        self.params = Some(params.into());
        self
    }

    fn into_issue(self) -> Issue {
        Issue {
            code: IssueCode::Custom {
                params: self.params,
            },
            path: self.path,
            message: self.message,
            fatal: self.fatal,
        }
    }
}

/// Collects issues raised by user code.
#[derive(Debug, Default)]
pub struct RefinementCtx {
    issues: Vec<CustomIssue>,
}

impl RefinementCtx {
    pub fn add_issue(&mut self, issue: CustomIssue) {
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[CustomIssue] {
        &self.issues
    }
}

pub type PreprocessFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type RefineFn = Arc<dyn Fn(&Value, &mut RefinementCtx) + Send + Sync>;
pub type AsyncRefineFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Vec<CustomIssue>, String>> + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(Value, &mut RefinementCtx) -> Value + Send + Sync>;
pub type AsyncTransformFn =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

#[derive(Clone)]
pub enum Effect {
    /// Rewrites the raw input before the inner schema sees it
    Preprocess(PreprocessFn),
    /// Side-effect-only check on the inner output
    Refinement(RefineFn),
    /// Async check; an `Err` becomes a custom issue
    RefinementAsync(AsyncRefineFn),
    /// Maps a valid inner output to a new value
    Transform(TransformFn),
    /// Async map; an `Err` becomes a custom issue
    TransformAsync(AsyncTransformFn),
}

impl Effect {
    pub fn is_async(&self) -> bool {
        matches!(self, Effect::RefinementAsync(_) | Effect::TransformAsync(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Effect::Preprocess(_) => "preprocess",
            Effect::Refinement(_) | Effect::RefinementAsync(_) => "refinement",
            Effect::Transform(_) | Effect::TransformAsync(_) => "transform",
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effect({})", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct EffectsSchema {
    pub(crate) inner: Schema,
    pub(crate) effect: Effect,
}

impl EffectsSchema {
    pub fn inner(&self) -> &Schema {
        &self.inner
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    pub(crate) fn run<'a>(
        &'a self,
        input: &'a Value,
        ctx: ParseContext<'a>,
    ) -> BoxFuture<'a, ParseResult> {
        async move {
            if self.effect.is_async() && !ctx.is_async() {
                ctx.misuse(SchemaError::AsyncInSyncParse {
                    node: self.effect.name(),
                });
                return ParseResult::Aborted;
            }

            match &self.effect {
                Effect::Preprocess(preprocess) => {
                    let processed = preprocess(input.clone());
                    self.inner.run(&processed, ctx).await
                }
                Effect::Refinement(refine) => {
                    let inner = self.inner.run(input, ctx.clone()).await;
                    let mut status = inner.status();
                    let Some(value) = inner.into_value() else {
                        return ParseResult::Aborted;
                    };
                    let mut refinement = RefinementCtx::default();
                    refine(&value, &mut refinement);
                    report(&ctx, refinement.issues, &mut status);
                    status.into_result(value)
                }
                Effect::RefinementAsync(refine) => {
                    let inner = self.inner.run(input, ctx.clone()).await;
                    let mut status = inner.status();
                    let Some(value) = inner.into_value() else {
                        return ParseResult::Aborted;
                    };
                    let issues = refine(value.clone())
                        .await
                        .unwrap_or_else(|rejection| vec![CustomIssue::new(rejection)]);
                    report(&ctx, issues, &mut status);
                    status.into_result(value)
                }
                Effect::Transform(transform) => {
                    let value = match self.inner.run(input, ctx.clone()).await {
                        ParseResult::Valid(value) => value,
                        other => return other,
                    };
                    let mut status = ParseStatus::Valid;
                    let mut refinement = RefinementCtx::default();
                    let output = transform(value, &mut refinement);
                    report(&ctx, refinement.issues, &mut status);
                    status.into_result(output)
                }
                Effect::TransformAsync(transform) => {
                    let value = match self.inner.run(input, ctx.clone()).await {
                        ParseResult::Valid(value) => value,
                        other => return other,
                    };
                    match transform(value).await {
                        Ok(output) => ParseResult::Valid(output),
                        Err(rejection) => {
                            ctx.add_relative(CustomIssue::new(rejection).into_issue());
                            ParseResult::Aborted
                        }
                    }
                }
            }
        }
        .boxed()
    }
}

fn report(ctx: &ParseContext<'_>, issues: Vec<CustomIssue>, status: &mut ParseStatus) {
    for issue in issues {
        if issue.fatal {
            status.abort();
        } else {
            status.dirty();
        }
        ctx.add_relative(issue.into_issue());
    }
}
