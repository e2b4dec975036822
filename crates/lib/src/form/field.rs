//! Field registrations and the UI elements attached to them.
//!
//! The controller never touches a concrete widget. It talks to elements
//! through [`FieldElement`], which tells it what kind of control it is reading
//! (checkbox and radio groups, multi-selects and file inputs all read
//! differently) and lets it write values back and move focus.

use std::{fmt, sync::Arc};

use crate::{path::PathBuf, value::Value};

use super::rules::Rules;

/// The kind of control behind a [`FieldElement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementKind {
    #[default]
    Text,
    Number,
    Checkbox,
    Radio,
    Select,
    SelectMultiple,
    File,
    /// A custom control that reports its value directly
    Custom,
}

impl ElementKind {
    pub fn is_checkable(&self) -> bool {
        matches!(self, ElementKind::Checkbox | ElementKind::Radio)
    }
}

/// A UI control bound to a field.
///
/// For checkboxes and radios, [`value`](FieldElement::value) is the option's
/// own value and [`checked`](FieldElement::checked) its state.
pub trait FieldElement: Send + Sync {
    fn kind(&self) -> ElementKind;

    fn value(&self) -> Value;

    fn set_value(&self, value: &Value);

    fn checked(&self) -> bool {
        false
    }

    fn set_checked(&self, _checked: bool) {}

    /// Moves focus to the element. Returns false if it cannot take focus.
    fn focus(&self) -> bool {
        false
    }

    /// False once the element has been removed from its host tree.
    fn is_connected(&self) -> bool {
        true
    }
}

/// A registered field.
#[derive(Clone)]
pub(crate) struct Field {
    pub name: PathBuf,
    pub rules: Rules,
    pub mounted: bool,
    pub elements: Vec<Arc<dyn FieldElement>>,
    /// Registration order, used to find the first invalid field
    pub order: u64,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("mounted", &self.mounted)
            .field("elements", &self.elements.len())
            .finish_non_exhaustive()
    }
}

impl Field {
    pub fn new(name: PathBuf, rules: Rules, order: u64) -> Self {
        Self {
            name,
            rules,
            mounted: true,
            elements: Vec::new(),
            order,
        }
    }

    fn kind(&self) -> Option<ElementKind> {
        self.elements.first().map(|element| element.kind())
    }

    /// Attaches an element. Checkable elements accumulate into a group;
    /// anything else replaces the current element.
    ///
    /// Returns false if the element was already attached.
    pub fn attach(&mut self, element: Arc<dyn FieldElement>) -> bool {
        if self.elements.iter().any(|e| Arc::ptr_eq(e, &element)) {
            return false;
        }
        if element.kind().is_checkable() {
            self.elements.retain(|e| e.is_connected());
            self.elements.push(element);
        } else {
            self.elements = vec![element];
        }
        true
    }

    pub fn has_elements(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Focuses the first element that accepts focus.
    pub fn focus(&self) -> bool {
        self.elements.iter().any(|element| element.focus())
    }

    /// Reads the field's value from its elements, or `None` if no element is
    /// attached.
    pub fn read_elements(&self) -> Option<Value> {
        let kind = self.kind()?;
        let value = match kind {
            ElementKind::Radio => self
                .elements
                .iter()
                .find(|e| e.checked())
                .map(|e| e.value())
                .unwrap_or(Value::Null),
            ElementKind::Checkbox if self.elements.len() > 1 => Value::Array(
                self.elements
                    .iter()
                    .filter(|e| e.checked())
                    .map(|e| e.value())
                    .collect(),
            ),
            ElementKind::Checkbox => {
                let element = &self.elements[0];
                match element.value() {
                    _ if !element.checked() => Value::Bool(false),
                    Value::String(option) if !option.is_empty() && option != "on" => {
                        Value::String(option)
                    }
                    _ => Value::Bool(true),
                }
            }
            _ => self.rules.coerce(self.elements[0].value()),
        };
        Some(value)
    }

    /// Writes `value` into every attached element.
    pub fn write_elements(&self, value: &Value) {
        let Some(kind) = self.kind() else {
            return;
        };
        match kind {
            ElementKind::Radio => {
                for element in &self.elements {
                    element.set_checked(element.value() == *value);
                }
            }
            ElementKind::Checkbox if self.elements.len() > 1 => {
                for element in &self.elements {
                    let option = element.value();
                    let checked = match value {
                        Value::Array(selected) => selected.contains(&option),
                        other => *other == option,
                    };
                    element.set_checked(checked);
                }
            }
            ElementKind::Checkbox => {
                let element = &self.elements[0];
                let checked = match value {
                    Value::Bool(flag) => *flag,
                    Value::Undefined | Value::Null => false,
                    other => *other == element.value(),
                };
                element.set_checked(checked);
            }
            // File inputs cannot be written programmatically
            ElementKind::File => {}
            _ => {
                let shown = if value.is_nullish() {
                    &Value::String(String::new())
                } else {
                    value
                };
                self.elements[0].set_value(shown);
            }
        }
    }
}
