//! Glue between a registered field and the UI control rendering it.

use std::{fmt, sync::Arc};

use crate::{Result, path::PathBuf, value::Value};

use super::{
    FormControl,
    field::{ElementKind, FieldElement},
};

/// Whether an event is a change or a blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventKind {
    #[default]
    Change,
    Blur,
}

/// The element an event came from.
#[derive(Debug, Clone, Default)]
pub struct EventTarget {
    pub name: Option<String>,
    pub kind: ElementKind,
    pub value: Value,
    pub checked: bool,
}

/// An event-shaped change notification.
#[derive(Debug, Clone, Default)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub target: EventTarget,
}

impl ChangeEvent {
    pub fn change(kind: ElementKind, value: impl Into<Value>) -> Self {
        Self {
            kind: EventKind::Change,
            target: EventTarget {
                kind,
                value: value.into(),
                ..Default::default()
            },
        }
    }

    pub fn checkbox(checked: bool) -> Self {
        Self {
            kind: EventKind::Change,
            target: EventTarget {
                kind: ElementKind::Checkbox,
                checked,
                ..Default::default()
            },
        }
    }
}

/// What a change handler receives: a bare value or an event.
#[derive(Debug, Clone)]
pub enum ChangeInput {
    Raw(Value),
    Event(ChangeEvent),
}

impl ChangeInput {
    /// The carried value: the raw value, the checked state of a checkbox
    /// target, or the target's value.
    pub fn value(&self) -> Value {
        match self {
            ChangeInput::Raw(value) => value.clone(),
            ChangeInput::Event(event) if event.target.kind == ElementKind::Checkbox => {
                Value::Bool(event.target.checked)
            }
            ChangeInput::Event(event) => event.target.value.clone(),
        }
    }

    pub fn is_blur(&self) -> bool {
        matches!(self, ChangeInput::Event(event) if event.kind == EventKind::Blur)
    }

    pub fn is_event(&self) -> bool {
        matches!(self, ChangeInput::Event(_))
    }
}

macro_rules! impl_raw_input {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ChangeInput {
                fn from(value: $ty) -> Self {
                    ChangeInput::Raw(Value::from(value))
                }
            }
        )*
    };
}

impl_raw_input!(Value, bool, f64, i32, i64, &str, String);

impl From<ChangeEvent> for ChangeInput {
    fn from(event: ChangeEvent) -> Self {
        ChangeInput::Event(event)
    }
}

/// Handlers for one registered field, returned by
/// [`FormControl::register`].
#[derive(Clone)]
pub struct FieldBinding {
    control: FormControl,
    name: PathBuf,
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FieldBinding {
    pub(crate) fn new(control: FormControl, name: PathBuf) -> Self {
        Self { control, name }
    }

    pub fn name(&self) -> &PathBuf {
        &self.name
    }

    /// The field's current value.
    pub fn value(&self) -> Value {
        self.control.get_value(&self.name)
    }

    pub fn is_disabled(&self) -> bool {
        self.control.is_field_disabled(&self.name)
    }

    /// Handles a change (or blur, for blur events).
    pub async fn on_change(&self, input: impl Into<ChangeInput>) -> Result<()> {
        let input = input.into();
        let is_blur = input.is_blur();
        self.control
            .handle_field_event(&self.name, Some(input), is_blur)
            .await
    }

    pub async fn on_blur(&self) -> Result<()> {
        self.control
            .handle_field_event(&self.name, None, true)
            .await
    }

    /// Attaches the rendered control. Radio and checkbox options are
    /// collected into a group.
    pub fn attach(&self, element: Arc<dyn FieldElement>) {
        self.control.attach_element(&self.name, element);
    }

    /// Called when the control is removed.
    pub fn detach(&self) {
        self.control.detach_elements(&self.name);
    }
}
