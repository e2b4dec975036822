//! Field events and validation runs.

use std::{sync::Arc, time::Duration};

use tokio::runtime::Handle;

use crate::{
    Result,
    constants::event,
    path::{Path, PathBuf},
    resolver::{ResolveOptions, ResolverOutcome, schema_error_lookup},
    schema::CriteriaMode,
    value::{Value, deep_equal, get_or, set, unset},
};

use super::{
    FormControl,
    binding::ChangeInput,
    errors::FormError,
    field::Field,
    options::{TriggerOptions, skip_validation},
    rules::validate_field,
    state::{
        FieldError, FieldErrors, StateField, StateFieldSet, flag, has_error_under,
        remove_errors_under,
    },
};

impl FormControl {
    fn resolve_options(&self, names: Option<&[PathBuf]>) -> ResolveOptions {
        let data = self.data();
        ResolveOptions {
            names: match names {
                Some(names) => names.to_vec(),
                None => data.names.mount.iter().cloned().collect(),
            },
            registered: data.registered(),
            criteria_mode: self.config().criteria_mode,
        }
    }

    /// Runs the form resolver over the current values.
    pub(crate) async fn run_resolver(
        &self,
        names: Option<&[PathBuf]>,
    ) -> Result<Option<ResolverOutcome>> {
        let Some(resolver) = self.options().resolver.clone() else {
            return Ok(None);
        };
        let options = self.resolve_options(names);
        let values = self.get_values();
        match resolver.resolve(&values, &options).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                tracing::warn!(error = %err, "resolver failed");
                Err(FormError::Resolver {
                    reason: err.to_string(),
                }
                .into())
            }
        }
    }

    fn set_validating(&self, names: &[PathBuf], validating: bool) {
        {
            let mut data = self.data();
            for name in names {
                if validating {
                    flag(&mut data.state.validating_fields, name);
                } else {
                    unset(&mut data.state.validating_fields, name);
                }
            }
            data.state.is_validating = validating || !data.state.validating_fields.is_empty();
        }
        self.publish(
            names.first().cloned(),
            StateFieldSet::from([StateField::ValidatingFields, StateField::IsValidating]),
        );
    }

    /// Handles a change or blur on a registered field.
    pub(crate) async fn handle_field_event(
        &self,
        name: &Path,
        input: Option<ChangeInput>,
        is_blur: bool,
    ) -> Result<()> {
        let Some(field) = self.data().fields.get(name).cloned() else {
            return Err(FormError::FieldNotRegistered {
                name: name.to_string(),
            }
            .into());
        };
        let value = field_event_value(&field, input.as_ref(), &self.get_value(name));
        let config = self.config();
        let has_resolver = self.options().resolver.is_some();

        let (skip, watched, changed) = {
            let mut data = self.data();
            set(&mut data.state.values, name, value.clone());
            let mut changed = data.update_touch_and_dirty(name, &value, is_blur, false);
            if !is_blur {
                changed.insert(StateField::Values);
            }
            let state = &data.state;
            let no_validation = !field.rules.has_validation()
                && field.rules.dependencies().is_empty()
                && !has_resolver
                && !has_error_under(&state.errors, name);
            let skip = no_validation
                || skip_validation(
                    is_blur,
                    state.field_state(name).is_touched,
                    state.is_submitted,
                    config.re_validate_mode,
                    config.mode,
                );
            (skip, data.is_watched(name), changed)
        };

        if !is_blur {
            self.publish_values(Some(name.to_path_buf()), Some(event::CHANGE));
        }

        if skip {
            if !changed.is_empty() || watched {
                self.publish(Some(name.to_path_buf()), changed);
            }
            self.schedule_valid_update();
            return Ok(());
        }

        let names = [name.to_path_buf()];
        self.set_validating(&names, true);

        let (error_name, error, is_valid) = if has_resolver {
            let outcome = match self.run_resolver(Some(&names)).await {
                Ok(outcome) => outcome.unwrap_or_default(),
                Err(err) => {
                    self.set_validating(&names, false);
                    return Err(err);
                }
            };
            let data = self.data();
            let is_registered = |path: &Path| data.fields.contains_key(path);
            let (previous, _) = schema_error_lookup(&data.state.errors, is_registered, name);
            let (error_name, error) = schema_error_lookup(&outcome.errors, is_registered, &previous);
            (error_name, error, Some(outcome.is_valid()))
        } else {
            let values = self.get_values();
            let validate_all = config.criteria_mode == CriteriaMode::All;
            let error = validate_field(&field.rules, &value, &values, validate_all).await;
            let is_valid = error.is_some().then_some(false);
            (name.to_path_buf(), error, is_valid)
        };

        self.set_validating(&names, false);

        let live = {
            let data = self.data();
            data.unregistered_since(&names).is_empty()
                && deep_equal(&get_or(&data.state.values, name, Value::Undefined), &value)
        };
        if !live {
            tracing::warn!(field = %name, "discarding stale validation result");
            return Ok(());
        }

        tracing::trace!(field = %error_name, failed = error.is_some(), "validated field");
        self.render_error(error_name, is_valid, error, changed);
        if is_valid.is_none() {
            self.schedule_valid_update();
        }

        let deps = field.rules.dependencies().to_vec();
        if !deps.is_empty() {
            self.trigger_fields(deps).await?;
        }
        Ok(())
    }

    /// Applies a validation result to the error map and publishes.
    ///
    /// With a configured error delay, a new error is shown only once the
    /// delay passes without another result for the form; `Errors` is
    /// published then, not now.
    fn render_error(
        &self,
        name: PathBuf,
        is_valid: Option<bool>,
        error: Option<FieldError>,
        mut changed: StateFieldSet,
    ) {
        match (self.config().delay_error(), error) {
            (Some(delay), Some(error)) => self.schedule_error(name.clone(), error, delay),
            (_, error) => {
                self.cancel_delayed_error();
                if self.apply_error(&name, error) {
                    changed.insert(StateField::Errors);
                }
            }
        }
        if let Some(is_valid) = is_valid {
            let mut data = self.data();
            if data.state.is_valid != is_valid {
                data.state.is_valid = is_valid;
                changed.insert(StateField::IsValid);
            }
        }
        self.publish(Some(name), changed);
    }

    /// Sets or clears the error at exactly `name`. Returns whether it changed.
    fn apply_error(&self, name: &Path, error: Option<FieldError>) -> bool {
        let mut data = self.data();
        let errors = &mut data.state.errors;
        match error {
            Some(error) => errors.insert(name.as_str().to_string(), error.clone()) != Some(error),
            None => errors.remove(name.as_str()).is_some(),
        }
    }

    fn timer(&self) -> std::sync::MutexGuard<'_, Option<tokio::task::JoinHandle<()>>> {
        self.inner
            .delay_timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cancel_delayed_error(&self) {
        if let Some(handle) = self.timer().take() {
            handle.abort();
        }
    }

    fn schedule_error(&self, name: PathBuf, error: FieldError, delay: Duration) {
        let Ok(handle) = Handle::try_current() else {
            self.apply_error(&name, Some(error));
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                let control = FormControl { inner };
                control.apply_error(&name, Some(error));
                control.publish(Some(name), StateFieldSet::from([StateField::Errors]));
            }
        });
        if let Some(previous) = self.timer().replace(task) {
            previous.abort();
        }
    }

    /// Validates every registered field. Returns true if the form is valid.
    pub async fn trigger(&self) -> Result<bool> {
        self.trigger_with(None, TriggerOptions::default()).await
    }

    /// Validates one field and everything registered below it.
    pub async fn trigger_field(&self, name: impl Into<PathBuf>) -> Result<bool> {
        self.trigger_with(Some(vec![name.into()]), TriggerOptions::default())
            .await
    }

    pub async fn trigger_fields<I>(&self, names: I) -> Result<bool>
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.trigger_with(Some(names), TriggerOptions::default())
            .await
    }

    /// Validates the given fields, or the whole form for `None`, and
    /// replaces their errors with the result.
    pub async fn trigger_with(
        &self,
        names: Option<Vec<PathBuf>>,
        options: TriggerOptions,
    ) -> Result<bool> {
        let names = names.filter(|names| !names.is_empty());
        let scope = names.clone().unwrap_or_default();
        let registered = self.data().registered();
        self.set_validating(&scope, true);

        let outcome = match self.run_resolver(names.as_deref()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.set_validating(&scope, false);
                return Err(err);
            }
        };

        let valid = match outcome {
            Some(mut outcome) => {
                let mut data = self.data();
                let dropped = data.unregistered_since(&registered);
                discard_results(&mut outcome.errors, &dropped);
                match &names {
                    Some(names) => {
                        for name in names {
                            remove_errors_under(&mut data.state.errors, name);
                            for (key, error) in &outcome.errors {
                                if PathBuf::from(key.as_str()).starts_with(name) {
                                    data.state.errors.insert(key.clone(), error.clone());
                                }
                            }
                        }
                        data.state.is_valid = outcome.is_valid();
                        names
                            .iter()
                            .all(|name| !has_error_under(&outcome.errors, name))
                    }
                    None => {
                        data.state.errors = outcome.errors;
                        data.state.is_valid = data.state.errors.is_empty();
                        data.state.is_valid
                    }
                }
            }
            None => {
                let valid = self.execute_builtin(names.as_deref(), false).await;
                if names.is_none() {
                    self.data().state.is_valid = valid;
                }
                valid
            }
        };

        self.set_validating(&scope, false);
        tracing::debug!(valid, fields = scope.len(), "triggered validation");
        self.publish(
            names.as_ref().and_then(|names| names.first().cloned()),
            StateFieldSet::from([StateField::Errors, StateField::IsValid]),
        );

        if options.should_focus && !valid {
            self.focus_first_error();
        }
        if names.is_some() {
            self.schedule_valid_update();
        }
        Ok(valid)
    }

    /// Runs the built-in rules of registered fields in `targets` (all fields
    /// for `None`). Errors are written unless `only_check_valid` is set.
    pub(crate) async fn execute_builtin(
        &self,
        targets: Option<&[PathBuf]>,
        only_check_valid: bool,
    ) -> bool {
        let (fields, values) = {
            let data = self.data();
            let fields: Vec<Field> = data
                .fields
                .values()
                .filter(|field| {
                    targets.is_none_or(|targets| {
                        targets.iter().any(|target| field.name.starts_with(target))
                    })
                })
                .cloned()
                .collect();
            (fields, data.state.values.clone())
        };

        let validate_all = self.config().criteria_mode == CriteriaMode::All;
        let mut results = Vec::with_capacity(fields.len());
        for field in fields {
            let value = get_or(&values, &field.name, Value::Undefined);
            let error = validate_field(&field.rules, &value, &values, validate_all).await;
            if only_check_valid && error.is_some() {
                return false;
            }
            results.push((field.name, error));
        }

        if only_check_valid {
            return true;
        }
        let mut data = self.data();
        let before: Vec<PathBuf> = results.iter().map(|(name, _)| name.clone()).collect();
        let dropped = data.unregistered_since(&before);
        if !dropped.is_empty() {
            tracing::warn!(fields = dropped.len(), "discarding results for unregistered fields");
            results.retain(|(name, _)| !dropped.contains(name));
        }
        let valid = results.iter().all(|(_, error)| error.is_none());
        for (name, error) in results {
            match error {
                Some(error) => {
                    data.state.errors.insert(name.as_str().to_string(), error);
                }
                None => {
                    data.state.errors.remove(name.as_str());
                }
            }
        }
        valid
    }

    /// Recomputes `is_valid` without touching the error map.
    pub(crate) async fn update_valid(&self) -> Result<()> {
        if !self.data().tracked.contains(StateField::IsValid) {
            return Ok(());
        }
        let valid = match self.run_resolver(None).await? {
            Some(outcome) => outcome.is_valid(),
            None => self.execute_builtin(None, true).await,
        };
        let changed = {
            let mut data = self.data();
            let changed = data.state.is_valid != valid;
            data.state.is_valid = valid;
            changed
        };
        if changed {
            self.publish(None, StateFieldSet::from([StateField::IsValid]));
        }
        Ok(())
    }

    /// Spawns a validity refresh when someone tracks `is_valid` and a tokio
    /// runtime is available.
    pub(crate) fn schedule_valid_update(&self) {
        if !self.data().tracked.contains(StateField::IsValid) {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let control = self.clone();
        handle.spawn(async move {
            if let Err(err) = control.update_valid().await {
                tracing::warn!(error = %err, "validity update failed");
            }
        });
    }

    /// Focuses the earliest-registered field with an error.
    pub(crate) fn focus_first_error(&self) -> bool {
        let field = {
            let data = self.data();
            data.fields
                .values()
                .filter(|field| has_error_under(&data.state.errors, &field.name))
                .min_by_key(|field| field.order)
                .cloned()
        };
        field.is_some_and(|field| field.focus())
    }
}

/// Removes the errors at and below fields unregistered while a resolver
/// was running.
fn discard_results(errors: &mut FieldErrors, dropped: &[PathBuf]) {
    if dropped.is_empty() {
        return;
    }
    tracing::warn!(fields = dropped.len(), "discarding results for unregistered fields");
    for name in dropped {
        remove_errors_under(errors, name);
    }
}

/// The value a field event carries.
///
/// A blur re-reads the attached elements. Events from checkbox and radio
/// groups read the whole group; other events are coerced by the field's
/// rules. Raw values are stored as given.
fn field_event_value(field: &Field, input: Option<&ChangeInput>, current: &Value) -> Value {
    match input {
        None => field
            .read_elements()
            .unwrap_or_else(|| current.clone()),
        Some(ChangeInput::Raw(value)) => value.clone(),
        Some(input) => {
            let grouped = field
                .elements
                .first()
                .is_some_and(|element| element.kind().is_checkable());
            match grouped.then(|| field.read_elements()).flatten() {
                Some(value) => value,
                None => field.rules.coerce(input.value()),
            }
        }
    }
}
