//! Object schema and its shape helpers.

use futures::{FutureExt, future::BoxFuture};

use crate::value::Value;

use super::{
    Schema, SchemaKind, TypeMessages, UNDEFINED,
    context::{ObjectEntry, ParseContext, ParseResult, ParseStatus, merge_object},
    enums::EnumSchema,
    issue::IssueCode,
};

/// What happens to input keys that are not part of the shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Dropped from the output
    #[default]
    Strip,
    /// Reported as `unrecognized_keys`
    Strict { message: Option<String> },
    /// Copied to the output unparsed
    Passthrough,
}

/// Validates objects against a declared shape.
///
/// Shape keys are parsed in declaration order. A missing key is parsed as
/// `undefined`, so `optional` and `default` wrappers decide what happens.
///
/// ```
/// # use formstate::schema::{object, string, number, SchemaExt};
/// # use formstate::Value;
/// # use serde_json::json;
/// let user = object()
///     .field("name", string().min(1))
///     .field("age", number().int().optional())
///     .into_schema();
///
/// let parsed = user.parse(&Value::from(json!({"name": "Ada", "extra": 1}))).unwrap();
/// assert_eq!(parsed.to_json(), json!({"name": "Ada"}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    pub(crate) shape: Vec<(String, Schema)>,
    pub(crate) unknown_keys: UnknownKeys,
    pub(crate) catchall: Option<Schema>,
    pub(crate) messages: TypeMessages,
}

impl ObjectSchema {
    /// Adds a property, replacing an existing one of the same name in place.
    pub fn field(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        let name = name.into();
        let schema = schema.into();
        match self.shape.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = schema,
            None => self.shape.push((name, schema)),
        }
        self
    }

    /// The declared properties in order.
    pub fn shape(&self) -> &[(String, Schema)] {
        &self.shape
    }

    /// Returns the schema of one property.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.shape
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, schema)| schema)
    }

    pub fn strict(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Strict { message: None };
        self
    }

    pub fn strict_with_message(mut self, message: impl Into<String>) -> Self {
        self.unknown_keys = UnknownKeys::Strict {
            message: Some(message.into()),
        };
        self
    }

    pub fn strip(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Strip;
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.unknown_keys = UnknownKeys::Passthrough;
        self
    }

    /// Validates unknown keys against `schema` instead of the unknown-key policy.
    pub fn catchall(mut self, schema: impl Into<Schema>) -> Self {
        self.catchall = Some(schema.into());
        self
    }

    /// Adds or replaces every property of `other`.
    pub fn extend(self, other: ObjectSchema) -> Self {
        other
            .shape
            .into_iter()
            .fold(self, |merged, (key, schema)| merged.field(key, schema))
    }

    /// Like [`extend`](Self::extend), but `other` also decides the unknown-key
    /// policy and catchall.
    pub fn merge(self, other: ObjectSchema) -> Self {
        let unknown_keys = other.unknown_keys.clone();
        let catchall = other.catchall.clone();
        let mut merged = self.extend(other);
        merged.unknown_keys = unknown_keys;
        merged.catchall = catchall;
        merged
    }

    /// Keeps only the named properties.
    pub fn pick(mut self, keys: &[&str]) -> Self {
        self.shape.retain(|(key, _)| keys.contains(&key.as_str()));
        self
    }

    /// Drops the named properties.
    pub fn omit(mut self, keys: &[&str]) -> Self {
        self.shape.retain(|(key, _)| !keys.contains(&key.as_str()));
        self
    }

    /// Makes every property optional.
    pub fn partial(mut self) -> Self {
        for (_, schema) in &mut self.shape {
            *schema = Schema::new(SchemaKind::Optional(schema.clone()));
        }
        self
    }

    /// Removes every `optional` wrapper from the properties.
    pub fn required(mut self) -> Self {
        for (_, schema) in &mut self.shape {
            while let SchemaKind::Optional(inner) = schema.kind() {
                let unwrapped = inner.clone();
                *schema = unwrapped;
            }
        }
        self
    }

    /// An enum of the property names.
    pub fn keyof(&self) -> EnumSchema {
        EnumSchema::new(self.shape.iter().map(|(key, _)| key.clone()))
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
            let mut entries = Vec::with_capacity(map.len().max(self.shape.len()));
            for (key, schema) in &self.shape {
                let value = map.get(key).unwrap_or(&UNDEFINED);
                let result = schema.run(value, ctx.child(key.as_str())).await;
                entries.push(ObjectEntry {
                    key: key.clone(),
                    result,
                    always_set: map.contains_key(key),
                });
            }

            let extra: Vec<&String> = map
                .keys()
                .filter(|key| self.get(key).is_none())
                .collect();

            match (&self.catchall, &self.unknown_keys) {
                (Some(catchall), _) => {
                    for key in extra {
                        let result = catchall.run(&map[key], ctx.child(key.as_str())).await;
                        entries.push(ObjectEntry {
                            key: key.clone(),
                            result,
                            always_set: true,
                        });
                    }
                }
                (None, UnknownKeys::Passthrough) => {
                    for key in extra {
                        entries.push(ObjectEntry {
                            key: key.clone(),
                            result: ParseResult::Valid(map[key].clone()),
                            always_set: true,
                        });
                    }
                }
                (None, UnknownKeys::Strict { message }) if !extra.is_empty() => {
                    ctx.add_issue(
                        IssueCode::UnrecognizedKeys {
                            keys: extra.into_iter().cloned().collect(),
                        },
                        input,
                        message.as_deref(),
                    );
                    status.dirty();
                }
                (None, _) => {}
            }

            merge_object(status, entries)
        }
        .boxed()
    }
}
