//! Membership schemas: literal, enum and native enum.
//!
//! Enum membership sets are built lazily on the first parse and cached.

use std::{
    collections::HashSet,
    sync::{Arc, OnceLock},
};

use crate::value::{Value, ValueType, deep_equal};

use super::{
    TypeMessages,
    context::{ParseContext, ParseResult},
    issue::IssueCode,
};

/// Accepts exactly one value.
#[derive(Debug, Clone)]
pub struct LiteralSchema {
    pub(crate) value: Value,
    pub(crate) message: Option<String>,
}

impl LiteralSchema {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        if deep_equal(input, &self.value) {
            return ParseResult::Valid(input.clone());
        }
        ctx.add_issue(
            IssueCode::InvalidLiteral {
                expected: self.value.clone(),
            },
            input,
            self.message.as_deref(),
        );
        ParseResult::Aborted
    }
}

fn quoted(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Accepts one of a fixed list of strings.
#[derive(Debug, Clone)]
pub struct EnumSchema {
    pub(crate) values: Vec<String>,
    pub(crate) members: Arc<OnceLock<HashSet<String>>>,
    pub(crate) messages: TypeMessages,
}

impl EnumSchema {
    pub(crate) fn new(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            members: Arc::new(OnceLock::new()),
            messages: TypeMessages::default(),
        }
    }

    pub fn options(&self) -> &[String] {
        &self.values
    }

    /// A new enum with only the given members.
    pub fn extract(&self, keep: &[&str]) -> Self {
        Self::new(
            self.values
                .iter()
                .filter(|v| keep.contains(&v.as_str()))
                .cloned(),
        )
    }

    /// A new enum without the given members.
    pub fn exclude(&self, drop: &[&str]) -> Self {
        Self::new(
            self.values
                .iter()
                .filter(|v| !drop.contains(&v.as_str()))
                .cloned(),
        )
    }

    fn members(&self) -> &HashSet<String> {
        self.members
            .get_or_init(|| self.values.iter().cloned().collect())
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        let Value::String(text) = input else {
            self.messages.invalid_type(ctx, &quoted(&self.values), input);
            return ParseResult::Aborted;
        };
        if self.members().contains(text) {
            return ParseResult::Valid(input.clone());
        }
        ctx.add_issue(
            IssueCode::InvalidEnumValue {
                options: self.values.iter().map(|v| Value::from(v.as_str())).collect(),
                received: input.clone(),
            },
            input,
            self.messages.invalid_type.as_deref(),
        );
        ParseResult::Aborted
    }
}

/// Accepts the values of a host enumeration given as name/value pairs.
///
/// Numeric members are listed once even if the host also maps their value
/// back to the name.
#[derive(Debug, Clone)]
pub struct NativeEnumSchema {
    pub(crate) entries: Vec<(String, Value)>,
    pub(crate) valid: Arc<OnceLock<Vec<Value>>>,
    pub(crate) messages: TypeMessages,
}

impl NativeEnumSchema {
    pub(crate) fn new(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
            valid: Arc::new(OnceLock::new()),
            messages: TypeMessages::default(),
        }
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    /// The accepted values, reverse mappings excluded.
    pub fn values(&self) -> &[Value] {
        self.valid.get_or_init(|| {
            let numeric_keys: HashSet<String> = self
                .entries
                .iter()
                .filter_map(|(_, v)| v.as_f64().map(|n| n.to_string()))
                .collect();
            self.entries
                .iter()
                .filter(|(name, _)| !numeric_keys.contains(name))
                .map(|(_, value)| value.clone())
                .collect()
        })
    }

    pub(crate) fn parse(&self, input: &Value, ctx: &ParseContext<'_>) -> ParseResult {
        if !matches!(input.value_type(), ValueType::String | ValueType::Number) {
            let expected = self
                .values()
                .iter()
                .map(|v| v.to_json().to_string())
                .collect::<Vec<_>>()
                .join(" | ");
            self.messages.invalid_type(ctx, &expected, input);
            return ParseResult::Aborted;
        }
        if self.values().iter().any(|v| deep_equal(v, input)) {
            return ParseResult::Valid(input.clone());
        }
        ctx.add_issue(
            IssueCode::InvalidEnumValue {
                options: self.values().to_vec(),
                received: input.clone(),
            },
            input,
            self.messages.invalid_type.as_deref(),
        );
        ParseResult::Aborted
    }
}
