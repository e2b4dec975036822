//! Field arrays: dynamic lists of fields under one path.
//!
//! Every item gets a stable id that follows it through reordering, so a UI
//! can key its rows on it. Restructuring an array moves the touched,
//! validating and error state of each item along with its value.

use std::fmt;

use crate::{
    path::{Path, PathBuf},
    value::{Value, clone_object, get, set, unset},
};

use super::{
    FormControl, FormData,
    state::{StateField, StateFieldSet, get_dirty_fields},
};

/// One item of a field array.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArrayItem {
    /// Stable across moves, regenerated when the item is replaced
    pub id: String,
    pub value: Value,
}

/// Where each slot of a restructured array comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Old(usize),
    New(usize),
}

#[derive(Debug, Clone)]
enum ArrayOp {
    Append,
    Prepend,
    Insert(usize),
    Remove(Option<Vec<usize>>),
    Swap(usize, usize),
    Move(usize, usize),
    Update(usize),
    Replace,
}

impl ArrayOp {
    /// Lays out the new array in terms of old indices and `added` new items.
    fn layout(&self, len: usize, added: usize) -> Vec<Slot> {
        let old = |range: std::ops::Range<usize>| range.map(Slot::Old);
        let new = || (0..added).map(Slot::New);
        match self {
            ArrayOp::Append => old(0..len).chain(new()).collect(),
            ArrayOp::Prepend => new().chain(old(0..len)).collect(),
            ArrayOp::Insert(at) => {
                let at = (*at).min(len);
                old(0..at).chain(new()).chain(old(at..len)).collect()
            }
            ArrayOp::Remove(None) => Vec::new(),
            ArrayOp::Remove(Some(indices)) => old(0..len)
                .filter(|slot| !matches!(slot, Slot::Old(i) if indices.contains(i)))
                .collect(),
            ArrayOp::Swap(a, b) => {
                let mut slots: Vec<Slot> = old(0..len).collect();
                if *a < len && *b < len {
                    slots.swap(*a, *b);
                }
                slots
            }
            ArrayOp::Move(from, to) => {
                let mut slots: Vec<Slot> = old(0..len).collect();
                if *from < len {
                    let slot = slots.remove(*from);
                    let to = (*to).min(slots.len());
                    slots.insert(to, slot);
                }
                slots
            }
            ArrayOp::Update(index) => {
                let mut slots: Vec<Slot> = old(0..len).collect();
                match slots.get_mut(*index) {
                    Some(slot) => *slot = Slot::New(0),
                    None => slots.push(Slot::New(0)),
                }
                slots
            }
            ArrayOp::Replace => new().collect(),
        }
    }

    /// Index the first inserted item lands at, for focusing.
    fn focus_index(&self, len: usize) -> Option<usize> {
        match self {
            ArrayOp::Append => Some(len),
            ArrayOp::Prepend => Some(0),
            ArrayOp::Insert(at) => Some((*at).min(len)),
            _ => None,
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Maps a path below an array item to the item's new position.
///
/// Returns `None` for paths that are not below an item, `Some(None)` for
/// paths under a removed item.
fn remap_path(path: &Path, array: &Path, moved: &[Option<usize>]) -> Option<Option<PathBuf>> {
    if !path.is_descendant_of(array) {
        return None;
    }
    let mut rest = path.components().skip(array.len());
    let index: usize = rest.next()?.parse().ok()?;
    let Some(target) = moved.get(index).copied().flatten() else {
        return Some(None);
    };
    let remapped = rest.fold(array.to_path_buf().push_index(target), |path, component| {
        path.push(component)
    });
    Some(Some(remapped))
}

/// Rebuilds the flag subtree at `array` in the new layout.
fn remap_tree(tree: &mut Value, array: &Path, slots: &[Slot]) {
    let Some(Value::Array(items)) = get(tree, array) else {
        return;
    };
    let mut next: Vec<Value> = slots
        .iter()
        .map(|slot| match slot {
            Slot::Old(i) => items.get(*i).cloned().unwrap_or(Value::Undefined),
            Slot::New(_) => Value::Undefined,
        })
        .collect();
    while next.last().is_some_and(Value::is_undefined) {
        next.pop();
    }
    if next.is_empty() {
        unset(tree, array);
    } else {
        set(tree, array, Value::Array(next));
    }
}

impl FormData {
    /// Item ids for `array`, grown or shrunk to `len`.
    fn item_ids(&mut self, array: &Path, len: usize) -> &mut Vec<String> {
        let ids = self.array_ids.entry(array.to_path_buf()).or_default();
        ids.truncate(len);
        while ids.len() < len {
            ids.push(new_id());
        }
        ids
    }

    fn array_items(&self, array: &Path) -> Vec<Value> {
        get(&self.state.values, array)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Handle to a field array, returned by [`FormControl::field_array`].
#[derive(Clone)]
pub struct FieldArray {
    control: FormControl,
    name: PathBuf,
}

impl fmt::Debug for FieldArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArray")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FormControl {
    /// Declares `name` as a field array.
    pub fn field_array(&self, name: impl Into<PathBuf>) -> FieldArray {
        let name = name.into();
        self.data().names.array.insert(name.clone());
        FieldArray {
            control: self.clone(),
            name,
        }
    }
}

impl FieldArray {
    pub fn name(&self) -> &PathBuf {
        &self.name
    }

    /// The items with their ids.
    pub fn fields(&self) -> Vec<FieldArrayItem> {
        let mut data = self.control.data();
        let items = data.array_items(&self.name);
        let ids = data.item_ids(&self.name, items.len()).clone();
        ids.into_iter()
            .zip(items)
            .map(|(id, value)| FieldArrayItem { id, value })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.control.data().array_items(&self.name).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&self, value: impl Into<Value>) {
        self.apply(ArrayOp::Append, vec![value.into()]);
    }

    pub fn append_all(&self, values: Vec<Value>) {
        self.apply(ArrayOp::Append, values);
    }

    pub fn prepend(&self, value: impl Into<Value>) {
        self.apply(ArrayOp::Prepend, vec![value.into()]);
    }

    /// Inserts before `index`; past the end appends.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        self.apply(ArrayOp::Insert(index), vec![value.into()]);
    }

    pub fn remove(&self, index: usize) {
        self.apply(ArrayOp::Remove(Some(vec![index])), Vec::new());
    }

    pub fn remove_many(&self, indices: Vec<usize>) {
        self.apply(ArrayOp::Remove(Some(indices)), Vec::new());
    }

    /// Removes every item.
    pub fn clear(&self) {
        self.apply(ArrayOp::Remove(None), Vec::new());
    }

    pub fn swap(&self, a: usize, b: usize) {
        self.apply(ArrayOp::Swap(a, b), Vec::new());
    }

    pub fn move_item(&self, from: usize, to: usize) {
        self.apply(ArrayOp::Move(from, to), Vec::new());
    }

    /// Replaces the item at `index`, giving it a new id.
    pub fn update(&self, index: usize, value: impl Into<Value>) {
        self.apply(ArrayOp::Update(index), vec![value.into()]);
    }

    /// Replaces every item.
    pub fn replace(&self, values: Vec<Value>) {
        self.apply(ArrayOp::Replace, values);
    }

    fn apply(&self, op: ArrayOp, added: Vec<Value>) {
        let name = &self.name;
        {
            let mut data = self.control.data();
            let current = data.array_items(name);
            let slots = op.layout(current.len(), added.len());

            let next: Vec<Value> = slots
                .iter()
                .map(|slot| match slot {
                    Slot::Old(i) => current[*i].clone(),
                    Slot::New(k) => clone_object(&added[*k]),
                })
                .collect();
            set(&mut data.state.values, name, Value::Array(next));

            let ids = data.item_ids(name, current.len()).clone();
            let next_ids = slots
                .iter()
                .map(|slot| match slot {
                    Slot::Old(i) => ids[*i].clone(),
                    Slot::New(_) => new_id(),
                })
                .collect();
            data.array_ids.insert(name.clone(), next_ids);

            let mut moved = vec![None; current.len()];
            for (position, slot) in slots.iter().enumerate() {
                if let Slot::Old(i) = slot {
                    moved[*i] = Some(position);
                }
            }

            remap_tree(&mut data.state.touched_fields, name, &slots);
            remap_tree(&mut data.state.validating_fields, name, &slots);

            let errors = std::mem::take(&mut data.state.errors);
            data.state.errors = errors
                .into_iter()
                .filter_map(|(key, error)| {
                    match remap_path(&PathBuf::from(key.as_str()), name, &moved) {
                        None => Some((key, error)),
                        Some(None) => None,
                        Some(Some(path)) => Some((path.as_str().to_string(), error)),
                    }
                })
                .collect();

            let fields = std::mem::take(&mut data.fields);
            data.fields = fields
                .into_iter()
                .filter_map(|(key, mut field)| match remap_path(&key, name, &moved) {
                    None => Some((key, field)),
                    Some(None) => None,
                    Some(Some(path)) => {
                        field.name = path.clone();
                        Some((path, field))
                    }
                })
                .collect();
            let mount = std::mem::take(&mut data.names.mount);
            data.names.mount = mount
                .into_iter()
                .filter_map(|key| match remap_path(&key, name, &moved) {
                    None => Some(key),
                    Some(remapped) => remapped,
                })
                .collect();

            data.state.dirty_fields =
                get_dirty_fields(&data.state.default_values, &data.state.values);
            data.refresh_is_dirty();
            if let Some(index) = op.focus_index(current.len()) {
                data.names.focus = Some(name.clone().push_index(index));
            }
            tracing::trace!(array = %name, ?op, len = slots.len(), "field array updated");
        }

        self.control.publish_array(Some(name.clone()));
        self.control.publish_values(Some(name.clone()), None);
        self.control.publish(
            Some(name.clone()),
            StateFieldSet::from([
                StateField::Values,
                StateField::DirtyFields,
                StateField::IsDirty,
                StateField::TouchedFields,
                StateField::Errors,
            ]),
        );
        self.control.schedule_valid_update();
    }
}
