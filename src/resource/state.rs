//! Per-resource attribute state with dirty tracking

use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;

/// Loaded attribute values plus the names changed since the last clean
///
/// Invariant: every dirty name is also a loaded name.
#[derive(Debug, Clone, Default)]
pub(crate) struct DirtyMap {
    values: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
}

impl DirtyMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Set a value and mark it dirty
    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
        self.dirty.insert(name.to_string());
    }

    /// Set a value as loaded from storage
    pub(crate) fn insert_clean(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
        self.dirty.remove(name);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Value> {
        self.dirty.remove(name);
        self.values.remove(name)
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
        self.dirty.clear();
    }

    pub(crate) fn clean_all(&mut self) {
        self.dirty.clear();
    }

    pub(crate) fn clean<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.dirty.remove(name);
        }
    }

    /// Mark loaded names dirty; unloaded names are ignored
    pub(crate) fn mark<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            if self.values.contains_key(name) {
                self.dirty.insert(name.to_string());
            }
        }
    }

    pub(crate) fn mark_all(&mut self) {
        self.dirty = self.values.keys().cloned().collect();
    }

    pub(crate) fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    pub(crate) fn dirty(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
