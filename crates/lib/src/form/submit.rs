//! Submission, reset and default-value loading.

use std::{fmt, future::Future, sync::Arc};

use futures::{FutureExt, future::BoxFuture};

use crate::{
    Result,
    constants::ROOT_ERROR_KEY,
    path::PathBuf,
    value::{Value, clone_object, get, get_or, set, unset},
};

use super::{
    FormControl,
    errors::{CallbackError, FormError},
    field::Field,
    options::{DefaultValues, ResetFieldOptions, ResetOptions},
    state::{
        FieldErrors, StateField, StateFieldSet, flagged_paths, get_dirty_fields,
        remove_errors_under,
    },
};

/// Future returned by submit callbacks.
pub type SubmitFuture = BoxFuture<'static, std::result::Result<(), CallbackError>>;

/// Called with the (parsed) values of a valid form.
pub type OnValid = Arc<dyn Fn(Value) -> SubmitFuture + Send + Sync>;

/// Called with the errors of an invalid form.
pub type OnInvalid = Arc<dyn Fn(FieldErrors) -> SubmitFuture + Send + Sync>;

/// A prepared submit, returned by [`FormControl::handle_submit`].
#[derive(Clone)]
pub struct SubmitHandler {
    control: FormControl,
    on_valid: OnValid,
    on_invalid: Option<OnInvalid>,
}

impl fmt::Debug for SubmitHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitHandler")
            .field("on_invalid", &self.on_invalid.is_some())
            .finish_non_exhaustive()
    }
}

fn is_root_error(key: &str) -> bool {
    PathBuf::from(key).starts_with(PathBuf::from(ROOT_ERROR_KEY))
}

impl SubmitHandler {
    /// Validates the form and calls the matching callback.
    ///
    /// The submit flags and `submit_count` are updated whatever the outcome.
    /// A failing callback still finalizes the state before its error is
    /// returned as [`FormError::SubmitCallback`].
    pub async fn submit(&self) -> Result<()> {
        let control = &self.control;
        {
            let mut data = control.data();
            data.state.is_submitting = true;
            data.state.errors.retain(|key, _| !is_root_error(key));
        }
        control.publish(None, StateFieldSet::from([StateField::IsSubmitting]));

        let mut values = match control.run_resolver(None).await {
            Ok(Some(outcome)) => {
                control.data().state.errors = outcome.errors;
                outcome.values
            }
            Ok(None) => {
                control.execute_builtin(None, false).await;
                control.get_values()
            }
            Err(err) => {
                self.finish(false);
                return Err(err);
            }
        };

        let errors = {
            let data = control.data();
            for field in data.fields.values().filter(|field| field.rules.is_disabled()) {
                unset(&mut values, &field.name);
            }
            data.state.errors.clone()
        };

        let callback = if errors.is_empty() {
            (self.on_valid)(values).await
        } else {
            let result = match &self.on_invalid {
                Some(on_invalid) => on_invalid(errors.clone()).await,
                None => Ok(()),
            };
            if control.config().should_focus_error {
                control.focus_first_error();
            }
            result
        };

        self.finish(errors.is_empty() && callback.is_ok());
        tracing::debug!(
            errors = errors.len(),
            callback_failed = callback.is_err(),
            "form submitted"
        );
        callback.map_err(|source| FormError::SubmitCallback { source }.into())
    }

    fn finish(&self, successful: bool) {
        {
            let mut data = self.control.data();
            let state = &mut data.state;
            state.is_submitted = true;
            state.is_submitting = false;
            state.is_submit_successful = successful;
            state.submit_count += 1;
        }
        self.control.publish(
            None,
            StateFieldSet::from([
                StateField::Errors,
                StateField::IsSubmitted,
                StateField::IsSubmitting,
                StateField::IsSubmitSuccessful,
                StateField::SubmitCount,
            ]),
        );
    }
}

fn is_empty_reset(values: &Value) -> bool {
    values.is_undefined() || values.as_object().is_some_and(|object| object.is_empty())
}

impl FormControl {
    /// Prepares a submit that calls `on_valid` when validation passes.
    pub fn handle_submit<F, Fut>(&self, on_valid: F) -> SubmitHandler
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), CallbackError>> + Send + 'static,
    {
        SubmitHandler {
            control: self.clone(),
            on_valid: Arc::new(move |values| on_valid(values).boxed()),
            on_invalid: None,
        }
    }

    /// Like [`handle_submit`](FormControl::handle_submit), also calling
    /// `on_invalid` with the errors when validation fails.
    pub fn handle_submit_with<F, Fut, G, Gut>(&self, on_valid: F, on_invalid: G) -> SubmitHandler
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), CallbackError>> + Send + 'static,
        G: Fn(FieldErrors) -> Gut + Send + Sync + 'static,
        Gut: Future<Output = std::result::Result<(), CallbackError>> + Send + 'static,
    {
        let mut handler = self.handle_submit(on_valid);
        handler.on_invalid = Some(Arc::new(move |errors| on_invalid(errors).boxed()));
        handler
    }

    /// Resets the form to `values`, or to its default values for `None` or
    /// an empty object. Non-empty `values` also become the new defaults
    /// unless `keep_default_values` is set.
    pub fn reset(&self, values: Option<Value>, options: ResetOptions) {
        let provided = values.filter(|values| !is_empty_reset(values));
        let should_unregister = self.config().should_unregister;

        let writes: Vec<(Field, Value)> = {
            let mut data = self.data();
            let previous = data.state.clone();
            let source = provided
                .as_ref()
                .map(clone_object)
                .unwrap_or_else(|| clone_object(&previous.default_values));
            if !options.keep_default_values {
                data.state.default_values = clone_object(&source);
            }

            let mut writes = Vec::new();
            if !options.keep_values {
                let mut next = source;
                if options.keep_dirty_values {
                    for path in flagged_paths(&previous.dirty_fields) {
                        let current = get_or(&previous.values, &path, Value::Undefined);
                        set(&mut next, &path, current);
                    }
                }
                data.state.values = match (should_unregister, options.keep_default_values) {
                    (true, true) => clone_object(&data.state.default_values),
                    (true, false) => Value::object(),
                    (false, _) => next,
                };
                for field in data.fields.values().filter(|field| field.has_elements()) {
                    let value = get_or(&data.state.values, &field.name, Value::Undefined);
                    writes.push((field.clone(), value));
                }
                data.array_ids.clear();
            }

            data.names.watch.clear();
            data.names.watch_all = false;
            data.names.focus = None;

            let state = &mut data.state;
            state.dirty_fields = if options.keep_dirty_values
                || (options.keep_default_values && provided.is_some())
            {
                get_dirty_fields(&state.default_values, &state.values)
            } else if options.keep_dirty && provided.is_some() {
                previous.dirty_fields.clone()
            } else {
                Value::object()
            };
            if !options.keep_touched {
                state.touched_fields = Value::object();
            }
            if !options.keep_errors {
                state.errors.clear();
            }
            if !options.keep_submit_count {
                state.submit_count = 0;
            }
            if !options.keep_is_submitted {
                state.is_submitted = false;
            }
            if !options.keep_is_submit_successful {
                state.is_submit_successful = false;
            }
            state.is_submitting = false;
            state.validating_fields = Value::object();
            state.is_validating = false;
            if !options.keep_dirty {
                data.refresh_is_dirty();
            }
            writes
        };

        for (field, value) in &writes {
            field.write_elements(value);
        }
        tracing::debug!(fields = writes.len(), "form reset");

        if !options.keep_values {
            self.publish_array(None);
            self.publish_values(None, None);
        }
        self.publish(None, StateFieldSet::all());
        if !options.keep_is_valid {
            self.schedule_valid_update();
        }
    }

    /// Resets one field to its default value, or to a new default.
    pub fn reset_field(
        &self,
        name: impl Into<PathBuf>,
        options: ResetFieldOptions,
    ) -> Result<()> {
        let name = name.into();
        let (field, value) = {
            let mut data = self.data();
            let Some(field) = data.fields.get(&name).cloned() else {
                return Err(FormError::FieldNotRegistered {
                    name: name.to_string(),
                }
                .into());
            };

            let state = &mut data.state;
            let value = match options.default_value {
                Some(default) => {
                    set(&mut state.default_values, &name, clone_object(&default));
                    default
                }
                None => get(&state.default_values, &name)
                    .map(clone_object)
                    .unwrap_or(Value::Undefined),
            };
            if value.is_undefined() {
                unset(&mut state.values, &name);
            } else {
                set(&mut state.values, &name, clone_object(&value));
            }
            if !options.keep_touched {
                unset(&mut state.touched_fields, &name);
            }
            if !options.keep_dirty {
                unset(&mut state.dirty_fields, &name);
            }
            data.refresh_is_dirty();
            if !options.keep_error {
                remove_errors_under(&mut data.state.errors, &name);
            }
            (field, value)
        };

        field.write_elements(&value);
        self.publish_values(Some(name.clone()), None);
        self.publish(Some(name), StateFieldSet::all());
        if !options.keep_error {
            self.schedule_valid_update();
        }
        Ok(())
    }

    /// Runs the async default-values loader and resets the form to its
    /// result. Does nothing for static defaults.
    pub async fn load_default_values(&self) -> Result<()> {
        let Some(DefaultValues::Async(loader)) = self.options().default_values.clone() else {
            return Ok(());
        };
        self.set_loading(true);

        match loader().await {
            Ok(values) => {
                self.reset(Some(values), ResetOptions::default());
                self.set_loading(false);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(error = %source, "failed to load default values");
                self.set_loading(false);
                Err(FormError::DefaultValuesLoader { source }.into())
            }
        }
    }

    fn set_loading(&self, loading: bool) {
        self.data().state.is_loading = loading;
        self.publish(None, StateFieldSet::from([StateField::IsLoading]));
    }
}
