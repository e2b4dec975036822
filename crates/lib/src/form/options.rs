//! Form configuration and per-operation options.
//!
//! [`FormConfig`] is the plain-data part of the configuration and can be
//! loaded from JSON. [`FormOptions`] adds the parts that carry code: default
//! values (possibly loaded asynchronously) and the resolver.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};

use crate::{resolver::Resolver, schema::CriteriaMode, value::Value};

use super::errors::CallbackError;

/// When field validation first runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    /// Only on submit, then per [`ReValidateMode`]
    #[default]
    OnSubmit,
    OnBlur,
    OnChange,
    /// On the first blur, then on every change
    OnTouched,
    /// On every change and blur
    All,
}

/// When fields re-validate after the form has been submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReValidateMode {
    #[default]
    OnChange,
    OnBlur,
    OnSubmit,
}

/// Decides whether a change or blur event skips validation.
pub(crate) fn skip_validation(
    is_blur_event: bool,
    is_touched: bool,
    is_submitted: bool,
    re_validate_mode: ReValidateMode,
    mode: Mode,
) -> bool {
    if mode == Mode::All {
        return false;
    }
    if !is_submitted && mode == Mode::OnTouched {
        return !(is_touched || is_blur_event);
    }
    let on_blur = if is_submitted {
        re_validate_mode == ReValidateMode::OnBlur
    } else {
        mode == Mode::OnBlur
    };
    if on_blur {
        return !is_blur_event;
    }
    let on_change = if is_submitted {
        re_validate_mode == ReValidateMode::OnChange
    } else {
        mode == Mode::OnChange
    };
    if on_change {
        return is_blur_event;
    }
    true
}

/// Serializable form settings.
///
/// ```rust
/// # use formstate::form::{FormConfig, Mode};
/// let config: FormConfig =
///     serde_json::from_str(r#"{"mode": "onBlur", "delayErrorMs": 300}"#).unwrap();
/// assert_eq!(config.mode, Mode::OnBlur);
/// assert!(config.should_focus_error);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormConfig {
    pub mode: Mode,
    pub re_validate_mode: ReValidateMode,
    pub criteria_mode: CriteriaMode,
    /// Delay before a newly found error is shown
    pub delay_error_ms: Option<u64>,
    /// Focus the first invalid field after a failed submit
    pub should_focus_error: bool,
    /// Drop a field's value when its element detaches
    pub should_unregister: bool,
    pub disabled: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            re_validate_mode: ReValidateMode::default(),
            criteria_mode: CriteriaMode::default(),
            delay_error_ms: None,
            should_focus_error: true,
            should_unregister: false,
            disabled: false,
        }
    }
}

impl FormConfig {
    /// Parse settings from a JSON document; missing keys take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn delay_error(&self) -> Option<Duration> {
        self.delay_error_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Loads default values, e.g. from a server.
pub type DefaultValuesLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Value, CallbackError>> + Send + Sync>;

/// Where a form's default values come from.
#[derive(Clone)]
pub enum DefaultValues {
    Static(Value),
    /// Loaded by [`FormControl::load_default_values`](super::FormControl::load_default_values)
    Async(DefaultValuesLoader),
}

impl fmt::Debug for DefaultValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValues::Static(values) => f.debug_tuple("Static").field(values).finish(),
            DefaultValues::Async(_) => f.write_str("Async(..)"),
        }
    }
}

/// Options for [`FormControl::new`](super::FormControl::new).
#[derive(Clone, Default)]
pub struct FormOptions {
    pub config: FormConfig,
    pub default_values: Option<DefaultValues>,
    pub resolver: Option<Arc<dyn Resolver>>,
}

impl fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormOptions")
            .field("config", &self.config)
            .field("default_values", &self.default_values)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl From<FormConfig> for FormOptions {
    fn from(config: FormConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn re_validate_mode(mut self, mode: ReValidateMode) -> Self {
        self.config.re_validate_mode = mode;
        self
    }

    pub fn criteria_mode(mut self, mode: CriteriaMode) -> Self {
        self.config.criteria_mode = mode;
        self
    }

    pub fn default_values(mut self, values: impl Into<Value>) -> Self {
        self.default_values = Some(DefaultValues::Static(values.into()));
        self
    }

    pub fn default_values_async<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallbackError>> + Send + 'static,
    {
        self.default_values = Some(DefaultValues::Async(Arc::new(move || loader().boxed())));
        self
    }

    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn delay_error(mut self, delay: Duration) -> Self {
        self.config.delay_error_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn should_focus_error(mut self, focus: bool) -> Self {
        self.config.should_focus_error = focus;
        self
    }

    pub fn should_unregister(mut self, unregister: bool) -> Self {
        self.config.should_unregister = unregister;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.config.disabled = disabled;
        self
    }
}

/// Options for [`FormControl::set_value`](super::FormControl::set_value).
#[derive(Debug, Clone, Copy, Default)]
pub struct SetValueOptions {
    pub should_validate: bool,
    pub should_dirty: bool,
    pub should_touch: bool,
}

impl SetValueOptions {
    pub fn validate() -> Self {
        Self {
            should_validate: true,
            ..Default::default()
        }
    }

    pub fn dirty() -> Self {
        Self {
            should_dirty: true,
            ..Default::default()
        }
    }

    pub fn with_validate(mut self) -> Self {
        self.should_validate = true;
        self
    }

    pub fn with_dirty(mut self) -> Self {
        self.should_dirty = true;
        self
    }

    pub fn with_touch(mut self) -> Self {
        self.should_touch = true;
        self
    }
}

/// Options for [`FormControl::trigger_with`](super::FormControl::trigger_with).
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerOptions {
    /// Focus the first invalid field in scope
    pub should_focus: bool,
}

/// Which parts of the state survive [`FormControl::reset`](super::FormControl::reset).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetOptions {
    /// Keep the values of dirty fields; other fields take the new values
    pub keep_dirty_values: bool,
    pub keep_errors: bool,
    pub keep_dirty: bool,
    pub keep_values: bool,
    pub keep_default_values: bool,
    pub keep_is_submitted: bool,
    pub keep_is_submit_successful: bool,
    pub keep_touched: bool,
    pub keep_is_valid: bool,
    pub keep_submit_count: bool,
}

/// Options for [`FormControl::reset_field`](super::FormControl::reset_field).
#[derive(Debug, Clone, Default)]
pub struct ResetFieldOptions {
    pub keep_dirty: bool,
    pub keep_touched: bool,
    pub keep_error: bool,
    /// Becomes the field's new default value
    pub default_value: Option<Value>,
}

/// Options for [`FormControl::unregister_with`](super::FormControl::unregister_with).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnregisterOptions {
    pub keep_value: bool,
    pub keep_error: bool,
    pub keep_dirty: bool,
    pub keep_touched: bool,
    pub keep_is_validating: bool,
    pub keep_default_value: bool,
    pub keep_is_valid: bool,
}

/// Options for [`FormControl::set_error`](super::FormControl::set_error).
#[derive(Debug, Clone, Copy, Default)]
pub struct SetErrorOptions {
    pub should_focus: bool,
}
