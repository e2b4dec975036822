//! Reactive form controller.
//!
//! [`FormControl`] owns a form's values, default values, field registrations
//! and the derived state (dirty, touched and validating trees, the error map,
//! submit flags). Every mutation goes through the controller, which publishes
//! a new [`FormState`] snapshot to subscribers afterwards.
//!
//! Three channels carry notifications:
//!
//! - values: every value change, for `watch_with` callbacks
//! - array: field-array restructuring
//! - state: [`StateUpdate`]s tagged with the [`StateField`]s they touch
//!
//! Fields are validated either by a [`Resolver`](crate::resolver::Resolver)
//! over the whole form or by each field's built-in [`Rules`].
//!
//! ```rust
//! # use formstate::form::{FormControl, FormOptions, Rules};
//! # use serde_json::json;
//! # tokio_test_block_on(async {
//! let form = FormControl::new(FormOptions::new().default_values(json!({"email": ""})));
//! let email = form.register("email", Rules::new().required().message("Email is required"));
//!
//! email.on_change("someone@example.com").await.unwrap();
//! assert!(form.form_state().is_dirty);
//!
//! assert!(form.trigger().await.unwrap());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     futures::executor::block_on(f)
//! # }
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::task::JoinHandle;

use crate::{
    path::{Path, PathBuf},
    subject::{Subject, Subscription},
    value::{Value, clone_object, deep_equal, get, get_or, set, unset},
};

mod array;
mod binding;
mod errors;
mod field;
mod options;
mod rules;
mod state;
mod submit;
mod validate;

pub use array::{FieldArray, FieldArrayItem};
pub use binding::{ChangeEvent, ChangeInput, EventKind, EventTarget, FieldBinding};
pub use errors::{CallbackError, FormError};
pub use field::{ElementKind, FieldElement};
pub use options::{
    DefaultValues, DefaultValuesLoader, FormConfig, FormOptions, Mode, ReValidateMode,
    ResetFieldOptions, ResetOptions, SetErrorOptions, SetValueOptions, TriggerOptions,
    UnregisterOptions,
};
pub use rules::{AsyncValidator, Constraint, Rules, SetValueAsFn, SyncValidator, Validator};
pub use state::{
    FieldError, FieldErrors, FieldState, FormState, StateField, StateFieldSet, StateUpdate,
    get_dirty_fields,
};
pub use submit::{OnInvalid, OnValid, SubmitFuture, SubmitHandler};

use field::Field;
use state::{flag, is_flagged, remove_errors_under};

/// A value change.
#[derive(Debug, Clone)]
pub struct ValuesEvent {
    /// The changed field; `None` for form-wide changes such as a reset
    pub name: Option<PathBuf>,
    /// `change` or `blur` for UI events, `None` for programmatic writes
    pub event: Option<&'static str>,
    pub values: Value,
}

/// A field-array change.
#[derive(Debug, Clone)]
pub struct ArrayEvent {
    pub name: Option<PathBuf>,
    pub values: Value,
}

#[derive(Debug, Default)]
struct Names {
    mount: BTreeSet<PathBuf>,
    array: BTreeSet<PathBuf>,
    watch: BTreeSet<PathBuf>,
    watch_all: bool,
    /// Field to focus once its element attaches
    focus: Option<PathBuf>,
}

#[derive(Debug)]
pub(crate) struct FormData {
    state: FormState,
    fields: BTreeMap<PathBuf, Field>,
    names: Names,
    array_ids: BTreeMap<PathBuf, Vec<String>>,
    next_order: u64,
    tracked: StateFieldSet,
}

impl FormData {
    fn is_disabled(&self, name: &Path) -> bool {
        self.state.disabled
            || self
                .fields
                .get(name)
                .is_some_and(|field| field.rules.is_disabled())
    }

    /// True when values differ from defaults, disabled fields excluded.
    fn compute_is_dirty(&self) -> bool {
        let disabled: Vec<&PathBuf> = self
            .fields
            .values()
            .filter(|field| field.rules.is_disabled())
            .map(|field| &field.name)
            .collect();
        if disabled.is_empty() {
            return !deep_equal(&self.state.values, &self.state.default_values);
        }
        let mut values = self.state.values.clone();
        let mut defaults = self.state.default_values.clone();
        for name in disabled {
            unset(&mut values, name);
            unset(&mut defaults, name);
        }
        !deep_equal(&values, &defaults)
    }

    /// Refreshes `is_dirty` and returns whether it changed.
    fn refresh_is_dirty(&mut self) -> bool {
        let previous = self.state.is_dirty;
        self.state.is_dirty = self.compute_is_dirty();
        previous != self.state.is_dirty
    }

    /// Updates the dirty and touched bookkeeping for `name` after its value
    /// became `value`. Returns the parts of the state that changed.
    fn update_touch_and_dirty(
        &mut self,
        name: &Path,
        value: &Value,
        is_blur: bool,
        should_dirty: bool,
    ) -> StateFieldSet {
        let mut changed = StateFieldSet::empty();
        if self.is_disabled(name) {
            return changed;
        }

        if !is_blur || should_dirty {
            if self.refresh_is_dirty() {
                changed.insert(StateField::IsDirty);
            }
            let default = get(&self.state.default_values, name).unwrap_or(&Value::Undefined);
            let pristine = deep_equal(default, value);
            let was_dirty = is_flagged(&self.state.dirty_fields, name);
            if pristine {
                unset(&mut self.state.dirty_fields, name);
            } else {
                flag(&mut self.state.dirty_fields, name);
            }
            if was_dirty == pristine {
                changed.insert(StateField::DirtyFields);
            }
        }

        if is_blur && !is_flagged(&self.state.touched_fields, name) {
            flag(&mut self.state.touched_fields, name);
            changed.insert(StateField::TouchedFields);
        }
        changed
    }

    fn is_watched(&self, name: &Path) -> bool {
        self.names.watch_all
            || self
                .names
                .watch
                .iter()
                .any(|watched| name.starts_with(watched) || watched.starts_with(name))
    }

    /// Registered fields at or below `name`.
    fn fields_under(&self, name: &Path) -> Vec<&Field> {
        self.fields
            .values()
            .filter(|field| field.name.starts_with(name))
            .collect()
    }

    fn registered(&self) -> Vec<PathBuf> {
        self.fields.keys().cloned().collect()
    }

    /// The names in `before` that have been unregistered since.
    ///
    /// Validation results for these fields arrived too late and are dropped.
    fn unregistered_since(&self, before: &[PathBuf]) -> Vec<PathBuf> {
        before
            .iter()
            .filter(|name| !self.fields.contains_key(*name))
            .cloned()
            .collect()
    }
}

struct FormInner {
    options: FormOptions,
    data: Mutex<FormData>,
    values_subject: Subject<ValuesEvent>,
    array_subject: Subject<ArrayEvent>,
    state_subject: Subject<StateUpdate>,
    /// Pending delayed error; a new one replaces it
    delay_timer: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for FormInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.lock().unwrap_or_else(|p| p.into_inner());
        f.debug_struct("FormInner")
            .field("options", &self.options)
            .field("fields", &data.fields.len())
            .field("state", &data.state)
            .field("state_subscribers", &self.state_subject.observer_count())
            .finish_non_exhaustive()
    }
}

/// A form controller.
///
/// `FormControl` is a cheap-to-clone handle; clones control the same form.
#[derive(Clone, Debug)]
pub struct FormControl {
    inner: Arc<FormInner>,
}

impl Default for FormControl {
    fn default() -> Self {
        Self::new(FormOptions::default())
    }
}

impl FormControl {
    /// Creates a form. Static default values become the initial values;
    /// async defaults leave the form loading until
    /// [`load_default_values`](FormControl::load_default_values) runs.
    pub fn new(options: impl Into<FormOptions>) -> Self {
        let options = options.into();
        let mut state = FormState::new();
        state.disabled = options.config.disabled;
        match &options.default_values {
            Some(DefaultValues::Static(values)) => {
                state.default_values = clone_object(values);
                if !options.config.should_unregister {
                    state.values = clone_object(values);
                }
            }
            Some(DefaultValues::Async(_)) => state.is_loading = true,
            None => {}
        }

        Self {
            inner: Arc::new(FormInner {
                options,
                data: Mutex::new(FormData {
                    state,
                    fields: BTreeMap::new(),
                    names: Names::default(),
                    array_ids: BTreeMap::new(),
                    next_order: 0,
                    tracked: StateFieldSet::empty(),
                }),
                values_subject: Subject::new(),
                array_subject: Subject::new(),
                state_subject: Subject::new(),
                delay_timer: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &FormOptions {
        &self.inner.options
    }

    pub fn config(&self) -> &FormConfig {
        &self.inner.options.config
    }

    pub(crate) fn data(&self) -> MutexGuard<'_, FormData> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes the current snapshot on the state channel.
    pub(crate) fn publish(&self, name: Option<PathBuf>, changed: StateFieldSet) {
        let state = self.data().state.clone();
        self.inner.state_subject.next(&StateUpdate {
            name,
            changed,
            state,
        });
    }

    pub(crate) fn publish_values(&self, name: Option<PathBuf>, event: Option<&'static str>) {
        let values = self.data().state.values.clone();
        self.inner
            .values_subject
            .next(&ValuesEvent { name, event, values });
    }

    pub(crate) fn publish_array(&self, name: Option<PathBuf>) {
        let values = {
            let data = self.data();
            match &name {
                Some(name) => get_or(&data.state.values, name, Value::array()),
                None => data.state.values.clone(),
            }
        };
        self.inner
            .array_subject
            .next(&ArrayEvent { name, values });
    }

    /// The current snapshot.
    pub fn form_state(&self) -> FormState {
        self.data().state.clone()
    }

    pub fn get_values(&self) -> Value {
        self.data().state.values.clone()
    }

    /// The value at `name`, or `Undefined`.
    pub fn get_value(&self, name: impl Into<PathBuf>) -> Value {
        let name = name.into();
        get_or(&self.data().state.values, &name, Value::Undefined)
    }

    pub fn get_values_of<I>(&self, names: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        let data = self.data();
        names
            .into_iter()
            .map(|name| get_or(&data.state.values, &name.into(), Value::Undefined))
            .collect()
    }

    /// Derives `{invalid, is_dirty, is_touched, is_validating, error}` for
    /// one field from the current snapshot.
    pub fn get_field_state(&self, name: impl Into<PathBuf>) -> FieldState {
        self.data().state.field_state(name)
    }

    pub fn is_registered(&self, name: impl Into<PathBuf>) -> bool {
        self.data().fields.contains_key(&name.into())
    }

    pub(crate) fn is_field_disabled(&self, name: &Path) -> bool {
        self.data().is_disabled(name)
    }

    /// Registers a field, or merges `rules` into an existing registration.
    ///
    /// The first registration seeds the field's value from the rule's
    /// initial value or the form's default values when the form has no
    /// value at the path yet.
    pub fn register(&self, name: impl Into<PathBuf>, rules: Rules) -> FieldBinding {
        let name = name.into();
        let first = {
            let mut data = self.data();
            let order = data.next_order;
            data.next_order += 1;
            let first = match data.fields.remove(&name) {
                Some(mut field) => {
                    field.rules = field.rules.merge(rules);
                    field.mounted = true;
                    data.fields.insert(name.clone(), field);
                    false
                }
                None => {
                    let seed = rules
                        .value
                        .clone()
                        .or_else(|| get(&data.state.default_values, &name).cloned());
                    if get(&data.state.values, &name).is_none()
                        && let Some(seed) = seed
                    {
                        set(&mut data.state.values, &name, clone_object(&seed));
                    }
                    data.fields
                        .insert(name.clone(), Field::new(name.clone(), rules, order));
                    true
                }
            };
            data.names.mount.insert(name.clone());
            first
        };

        tracing::debug!(field = %name, first, "registered field");
        if first {
            self.schedule_valid_update();
        }
        FieldBinding::new(self.clone(), name)
    }

    /// Unregisters one field, dropping its value and bookkeeping.
    pub fn unregister(&self, name: impl Into<PathBuf>) {
        self.unregister_with(Some(vec![name.into()]), UnregisterOptions::default());
    }

    /// Unregisters the given fields, or every mounted field for `None`.
    pub fn unregister_with(&self, names: Option<Vec<PathBuf>>, options: UnregisterOptions) {
        let should_unregister = self.config().should_unregister;
        {
            let mut data = self.data();
            let names = names.unwrap_or_else(|| data.names.mount.iter().cloned().collect());
            for name in &names {
                data.names.mount.remove(name);
                data.names.array.remove(name);
                data.array_ids.remove(name);
                data.fields.retain(|key, _| !key.starts_with(name));

                let state = &mut data.state;
                if !options.keep_value {
                    unset(&mut state.values, name);
                }
                if !options.keep_error {
                    remove_errors_under(&mut state.errors, name);
                }
                if !options.keep_dirty {
                    unset(&mut state.dirty_fields, name);
                }
                if !options.keep_touched {
                    unset(&mut state.touched_fields, name);
                }
                if !options.keep_is_validating {
                    unset(&mut state.validating_fields, name);
                }
                if !should_unregister && !options.keep_default_value {
                    unset(&mut state.default_values, name);
                }
                tracing::debug!(field = %name, "unregistered field");
            }
            data.state.is_validating = !data.state.validating_fields.is_empty();
            data.refresh_is_dirty();
        }

        self.publish_values(None, None);
        self.publish(None, StateFieldSet::all());
        if !options.keep_is_valid {
            self.schedule_valid_update();
        }
    }

    /// Writes `value` at `name`.
    ///
    /// Registered fields at or below `name` get the new value written into
    /// their elements. A field-array root publishes on the array channel.
    pub async fn set_value(
        &self,
        name: impl Into<PathBuf>,
        value: impl Into<Value>,
        options: SetValueOptions,
    ) -> crate::Result<()> {
        let name = name.into();
        let value = clone_object(&value.into());

        let (is_array, writes, changed) = {
            let mut data = self.data();
            set(&mut data.state.values, &name, value.clone());
            let is_array = data.names.array.contains(&name);
            let mut changed = StateFieldSet::from([StateField::Values]);
            let mut writes = Vec::new();

            if is_array {
                if options.should_dirty {
                    data.state.dirty_fields =
                        get_dirty_fields(&data.state.default_values, &data.state.values);
                    changed.insert(StateField::DirtyFields);
                }
            } else {
                let targets: Vec<Field> = data.fields_under(&name).into_iter().cloned().collect();
                let touch_or_dirty = options.should_dirty || options.should_touch;
                if targets.is_empty() && touch_or_dirty {
                    changed = changed.union(data.update_touch_and_dirty(
                        &name,
                        &value,
                        options.should_touch,
                        options.should_dirty,
                    ));
                }
                for field in targets {
                    let current = get_or(&data.state.values, &field.name, Value::Undefined);
                    if touch_or_dirty {
                        changed = changed.union(data.update_touch_and_dirty(
                            &field.name,
                            &current,
                            options.should_touch,
                            options.should_dirty,
                        ));
                    }
                    writes.push((field, current));
                }
            }
            if data.refresh_is_dirty() {
                changed.insert(StateField::IsDirty);
            }
            (is_array, writes, changed)
        };

        for (field, current) in &writes {
            field.write_elements(current);
        }
        if is_array {
            self.publish_array(Some(name.clone()));
        }
        self.publish_values(Some(name.clone()), None);
        self.publish(Some(name.clone()), changed);

        if options.should_validate {
            self.trigger_field(name).await?;
        }
        Ok(())
    }

    /// Reads `name` and records it as watched.
    pub fn watch(&self, name: impl Into<PathBuf>) -> Value {
        self.watch_or(name, Value::Undefined)
    }

    /// Reads `name`, falling back to its default value and then `default`.
    pub fn watch_or(&self, name: impl Into<PathBuf>, default: Value) -> Value {
        let name = name.into();
        let mut data = self.data();
        data.names.watch.insert(name.clone());
        get(&data.state.values, &name)
            .or_else(|| get(&data.state.default_values, &name))
            .cloned()
            .unwrap_or(default)
    }

    pub fn watch_fields<I>(&self, names: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        names.into_iter().map(|name| self.watch(name)).collect()
    }

    /// Reads all values and records the whole form as watched.
    pub fn watch_all(&self) -> Value {
        let mut data = self.data();
        data.names.watch_all = true;
        data.state.values.clone()
    }

    /// Calls `callback` on every value change.
    pub fn watch_with<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ValuesEvent) + Send + Sync + 'static,
    {
        self.inner.values_subject.subscribe(callback)
    }

    /// Calls `callback` on field-array changes.
    pub fn watch_arrays<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ArrayEvent) + Send + Sync + 'static,
    {
        self.inner.array_subject.subscribe(callback)
    }

    /// Calls `callback` with the new snapshot whenever an update touches one
    /// of `fields`.
    pub fn subscribe<F>(&self, fields: impl Into<StateFieldSet>, callback: F) -> Subscription
    where
        F: Fn(&FormState) + Send + Sync + 'static,
    {
        let fields = fields.into();
        self.track(fields);
        self.inner.state_subject.subscribe(move |update: &StateUpdate| {
            if update.changed.intersects(fields) {
                callback(&update.state);
            }
        })
    }

    /// Calls `callback` with every state update.
    pub fn subscribe_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StateUpdate) + Send + Sync + 'static,
    {
        self.track(StateFieldSet::all());
        self.inner.state_subject.subscribe(callback)
    }

    /// Declares interest in `fields` without a callback.
    ///
    /// Tracking [`StateField::IsValid`] keeps `is_valid` current after every
    /// change instead of only after explicit validation.
    pub fn track(&self, fields: impl Into<StateFieldSet>) {
        let mut data = self.data();
        data.tracked = data.tracked.union(fields.into());
    }

    /// Sets an error by hand, e.g. one reported by a server.
    pub fn set_error(
        &self,
        name: impl Into<PathBuf>,
        error: FieldError,
        options: SetErrorOptions,
    ) {
        let name = name.into();
        let focus = {
            let mut data = self.data();
            let mut error = error;
            if error.types.is_empty()
                && let Some(existing) = data.state.errors.get(name.as_str())
            {
                error.types = existing.types.clone();
            }
            data.state.errors.insert(name.as_str().to_string(), error);
            data.state.is_valid = false;
            options
                .should_focus
                .then(|| data.fields.get(&name).cloned())
                .flatten()
        };
        self.publish(
            Some(name),
            StateFieldSet::from([StateField::Errors, StateField::IsValid]),
        );
        if let Some(field) = focus {
            field.focus();
        }
    }

    /// Clears every error.
    pub fn clear_errors(&self) {
        self.data().state.errors.clear();
        self.publish(None, StateFieldSet::from([StateField::Errors]));
    }

    /// Clears the errors at and below each of `names`.
    pub fn clear_errors_for<I>(&self, names: I)
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        {
            let mut data = self.data();
            for name in names {
                remove_errors_under(&mut data.state.errors, &name.into());
            }
        }
        self.publish(None, StateFieldSet::from([StateField::Errors]));
    }

    /// Moves focus to the field's element. Returns false if nothing took it.
    pub fn set_focus(&self, name: impl Into<PathBuf>) -> bool {
        let field = self.data().fields.get(&name.into()).cloned();
        field.is_some_and(|field| field.focus())
    }

    pub(crate) fn attach_element(&self, name: &Path, element: Arc<dyn FieldElement>) {
        if !self.is_registered(name) {
            self.register(name.to_path_buf(), Rules::new());
        }
        let (field, write, focus) = {
            let mut data = self.data();
            let current = get(&data.state.values, name).cloned();
            let pending_focus = data
                .names
                .focus
                .as_ref()
                .is_some_and(|target| name.starts_with(target));
            let Some(field) = data.fields.get_mut(name) else {
                return;
            };
            field.mounted = true;
            if !field.attach(element) {
                return;
            }
            let field = field.clone();
            let write = match current {
                Some(value) => Some(value),
                None => {
                    if let Some(value) = field.read_elements() {
                        set(&mut data.state.values, name, value);
                    }
                    None
                }
            };
            if pending_focus {
                data.names.focus = None;
            }
            (field, write, pending_focus)
        };

        if let Some(value) = write {
            field.write_elements(&value);
        }
        if focus {
            field.focus();
        }
        self.schedule_valid_update();
    }

    pub(crate) fn detach_elements(&self, name: &Path) {
        let unregister = {
            let mut data = self.data();
            let policy = self.inner.options.config.should_unregister;
            let Some(field) = data.fields.get_mut(name) else {
                return;
            };
            field.mounted = false;
            field.elements.retain(|element| element.is_connected());
            let unregister = field.rules.should_unregister.unwrap_or(policy);
            let in_array = data
                .names
                .array
                .iter()
                .any(|array| name.is_descendant_of(array));
            unregister && !in_array
        };
        if unregister {
            self.unregister(name.to_path_buf());
        }
    }
}

impl Drop for FormInner {
    fn drop(&mut self) {
        let timer = self
            .delay_timer
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }
}
