//! Resource handles
//!
//! A [`Resource`] is a shared handle to one record's state. Clones alias
//! the same state, which is what lets a relationship value cached on one
//! owner be the very object another part of the program mutates.
//!
//! State borrows are never held across store or resolver calls.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value as Json};

use super::state::DirtyMap;
use super::ResourceType;
use crate::error::{Error, Result};
use crate::query::Request;
use crate::resolver::Resolver;
use crate::schema::{FieldError, RecordErrors, ValidationError, ID_FIELD, REV_FIELD};
use crate::value::Value;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ResourceInner {
    pub(crate) rtype: ResourceType,
    pub(crate) serial: u64,
    pub(crate) state: DirtyMap,
}

/// One record of a resource type
#[derive(Clone)]
pub struct Resource {
    pub(crate) inner: Rc<RefCell<ResourceInner>>,
}

impl Resource {
    fn with_state(rtype: &ResourceType, state: DirtyMap) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ResourceInner {
                rtype: rtype.clone(),
                serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
                state,
            })),
        }
    }

    /// Uncreated resource with schema defaults applied (dirty)
    pub(crate) fn new(rtype: &ResourceType) -> Self {
        let mut state = DirtyMap::new();
        for field in rtype.schema().fields() {
            if let Some(default) = field.default_for() {
                state.insert(field.name(), Value::from_json(default));
            }
        }
        Self::with_state(rtype, state)
    }

    /// Resource wrapping a stored record (clean)
    pub(crate) fn from_record(rtype: &ResourceType, record: Map<String, Json>) -> Self {
        let mut state = DirtyMap::new();
        for (name, value) in record {
            state.insert_clean(&name, Value::from_json(value));
        }
        Self::with_state(rtype, state)
    }

    // ==================
    // Identity
    // ==================

    pub fn resource_type(&self) -> ResourceType {
        self.inner.borrow().rtype.clone()
    }

    pub fn type_name(&self) -> String {
        self.inner.borrow().rtype.name().to_string()
    }

    /// Process-unique handle serial
    pub fn serial(&self) -> u64 {
        self.inner.borrow().serial
    }

    /// Whether both handles alias the same state
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn id(&self) -> Option<String> {
        self.peek_json(ID_FIELD).as_str().map(str::to_string)
    }

    pub fn rev(&self) -> Option<String> {
        self.peek_json(REV_FIELD).as_str().map(str::to_string)
    }

    /// Created resources carry a clean, non-null `_id`
    pub fn is_created(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.state.is_dirty(ID_FIELD)
            && inner
                .state
                .get(ID_FIELD)
                .map_or(false, |v| !v.is_null())
    }

    pub(crate) fn created_id(&self) -> Option<String> {
        if self.is_created() {
            self.id()
        } else {
            None
        }
    }

    // ==================
    // Attribute access
    // ==================

    /// Resolve and return an attribute
    pub fn get(&self, name: &str) -> Result<Value> {
        let rtype = self.resource_type();
        let resolver = rtype.resolver(name)?;
        let value = resolver.execute(self, &Request::new(name))?;
        match &resolver.hooks.on_get {
            Some(hook) => hook(self, value),
            None => Ok(value),
        }
    }

    /// Resolve an attribute and render it as JSON
    pub fn get_json(&self, name: &str) -> Result<Json> {
        Ok(self.get(name)?.dump())
    }

    /// Set an attribute, marking it dirty
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let rtype = self.resource_type();
        let resolver = rtype.resolver(name)?;
        let mut value = value.into();
        if let Some(hook) = &resolver.hooks.on_set {
            value = hook(self, value)?;
        }
        check_assignable(&rtype, resolver, &value)?;
        self.inner.borrow_mut().state.insert(name, value);
        Ok(())
    }

    /// Remove an attribute from state
    pub fn unset(&self, name: &str) -> Result<()> {
        let rtype = self.resource_type();
        let resolver = rtype.resolver(name)?;
        if let Some(hook) = &resolver.hooks.on_del {
            hook(self)?;
        }
        self.inner.borrow_mut().state.remove(name);
        Ok(())
    }

    /// Set several attributes from a JSON object
    pub fn merge(&self, values: Map<String, Json>) -> Result<()> {
        for (name, value) in values {
            self.set(&name, Value::from_json(value))?;
        }
        Ok(())
    }

    /// Resolve several attributes
    pub fn resolve<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.get(name.as_ref())?;
        }
        Ok(())
    }

    /// Resolve the named attributes and fail if any of them is null
    pub fn require<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut errors = RecordErrors::new(self.id());
        for name in names {
            let name = name.as_ref();
            if self.get(name)?.is_null() {
                errors.insert(name, FieldError::null());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.type_name(), vec![errors]).into())
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.inner.borrow().state.contains(name)
    }

    /// Names with a value in state
    pub fn loaded(&self) -> Vec<String> {
        self.inner.borrow().state.names().map(str::to_string).collect()
    }

    /// Drop cached values so the next read resolves again; `_id` stays
    pub fn unload<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = self.inner.borrow_mut();
        for name in names {
            if name.as_ref() != ID_FIELD {
                inner.state.remove(name.as_ref());
            }
        }
    }

    /// Drop every cached value except `_id`
    pub fn unload_all(&self) {
        let names = self.loaded();
        self.unload(names);
    }

    /// Discard local state and load every field again
    pub fn reload(&self) -> Result<()> {
        let Some(id) = self.created_id() else {
            return Err(Error::unsupported(format!(
                "reload of uncreated {}",
                self.type_name()
            )));
        };
        let rtype = self.resource_type();
        let record = rtype
            .store()
            .fetch(&id, None)?
            .ok_or_else(|| crate::store::StoreError::not_found(id.as_str()))?;
        let mut inner = self.inner.borrow_mut();
        inner.state.clear();
        for (name, value) in record {
            inner.state.insert_clean(&name, Value::from_json(value));
        }
        Ok(())
    }

    // ==================
    // Dirty tracking
    // ==================

    pub fn dirty(&self) -> BTreeSet<String> {
        self.inner.borrow().state.dirty().clone()
    }

    pub fn is_dirty(&self) -> bool {
        !self.inner.borrow().state.dirty().is_empty()
    }

    /// Mark every loaded attribute clean
    pub fn clean(&self) {
        self.inner.borrow_mut().state.clean_all();
    }

    /// Mark the named attributes clean
    pub fn clean_only<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        self.inner
            .borrow_mut()
            .state
            .clean(names.iter().map(|n| n.as_ref()));
    }

    /// Mark loaded attributes dirty
    pub fn mark<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        self.inner
            .borrow_mut()
            .state
            .mark(names.iter().map(|n| n.as_ref()));
    }

    /// Uncreated copy of this resource's field values under a new `_id`
    pub fn copy(&self) -> Resource {
        let rtype = self.resource_type();
        let copy = Resource::new(&rtype);
        {
            let inner = self.inner.borrow();
            let mut target = copy.inner.borrow_mut();
            for (name, value) in inner.state.iter() {
                if name != ID_FIELD && name != REV_FIELD && rtype.schema().contains(name) {
                    target.state.insert(name, value.clone());
                }
            }
        }
        copy
    }

    // ==================
    // Engine internals
    // ==================

    /// Cached value, without resolving
    pub(crate) fn cached(&self, name: &str) -> Option<Value> {
        self.inner.borrow().state.get(name).cloned()
    }

    /// Scalar value in state; null when absent or not a scalar
    pub fn peek_json(&self, name: &str) -> Json {
        self.inner
            .borrow()
            .state
            .get(name)
            .map(Value::to_json)
            .unwrap_or(Json::Null)
    }

    pub(crate) fn insert_clean(&self, name: &str, value: Value) {
        self.inner.borrow_mut().state.insert_clean(name, value);
    }

    /// Merge a stored record back into state and clean everything
    pub(crate) fn absorb(&self, record: Map<String, Json>) {
        let mut inner = self.inner.borrow_mut();
        for (name, value) in record {
            inner.state.insert_clean(&name, Value::from_json(value));
        }
        inner.state.clean_all();
    }

    /// Schema fields with no value in state
    pub(crate) fn missing_fields(&self) -> BTreeSet<String> {
        let inner = self.inner.borrow();
        inner
            .rtype
            .schema()
            .names()
            .filter(|name| !inner.state.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Loaded values of schema fields
    pub(crate) fn field_values(&self) -> Map<String, Json> {
        let inner = self.inner.borrow();
        let schema = inner.rtype.schema();
        inner
            .state
            .iter()
            .filter(|(name, _)| schema.contains(name))
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }

    /// Forget identity after deletion; remaining values become dirty
    pub(crate) fn forget_identity(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.state.remove(ID_FIELD);
        inner.state.remove(REV_FIELD);
        inner.state.mark_all();
    }

    pub(crate) fn loaded_values(&self) -> Vec<(String, Value)> {
        self.inner
            .borrow()
            .state
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }
}

/// Fields take scalars; relationships take resources of their target type
fn check_assignable(rtype: &ResourceType, resolver: &Resolver, value: &Value) -> Result<()> {
    let mismatch = |expected: &str, actual: String| Error::TypeMismatch {
        expected: format!("{} for {}.{}", expected, rtype.name(), resolver.name()),
        actual,
    };
    if resolver.is_field() {
        return match value {
            Value::Null | Value::Scalar(_) => Ok(()),
            Value::Resource(r) => Err(mismatch("scalar", r.type_name())),
            Value::Batch(b) => Err(mismatch("scalar", format!("batch of {}", b.resource_type()))),
        };
    }
    if !resolver.is_relationship() {
        return Ok(());
    }
    let target = rtype.registry().type_by_id(resolver.target_id()?);
    match value {
        Value::Null => Ok(()),
        Value::Resource(r) if !resolver.is_many() && r.resource_type().is_subtype_of(&target) => Ok(()),
        Value::Batch(b) if resolver.is_many() && b.resource_type().is_subtype_of(&target) => Ok(()),
        Value::Resource(r) => Err(mismatch(target.name(), r.type_name())),
        Value::Batch(b) => Err(mismatch(target.name(), format!("batch of {}", b.resource_type()))),
        Value::Scalar(json) => Err(mismatch(target.name(), json.to_string())),
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => write!(
                f,
                "{}({})",
                inner.rtype.name(),
                inner
                    .state
                    .get(ID_FIELD)
                    .and_then(Value::as_str)
                    .unwrap_or("-")
            ),
            Err(_) => f.write_str("Resource(<borrowed>)"),
        }
    }
}
