//! Ordered resource collections
//!
//! A [`Batch`] holds members of exactly one type in order. When indexed,
//! every indexable schema field has an [`IndexTree`] from value to member
//! serials, maintained by every insertion and removal and rebuilt for the
//! fields the batch itself loads or sets (`resolve`, `values`, `merge`).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};
use crate::index::{IndexKey, IndexTree, MemberId};
use crate::query::{compare_values, OrderBy, Request};
use crate::resource::{Resource, ResourceType};
use crate::value::Value;

pub(crate) struct BatchInner {
    pub(crate) rtype: ResourceType,
    pub(crate) members: VecDeque<Resource>,
    pub(crate) indexes: Option<BTreeMap<String, IndexTree>>,
}

impl BatchInner {
    fn index_member(&mut self, member: &Resource) {
        if let Some(indexes) = &mut self.indexes {
            let serial = member.serial();
            for (field, tree) in indexes.iter_mut() {
                if let Some(key) = IndexKey::from_json(&member.peek_json(field)) {
                    tree.insert(key, serial);
                }
            }
        }
    }

    fn unindex_member(&mut self, member: &Resource) {
        let serial = member.serial();
        // the same handle may appear twice; keep entries while any copy remains
        if self.members.iter().any(|m| m.serial() == serial) {
            return;
        }
        if let Some(indexes) = &mut self.indexes {
            for (field, tree) in indexes.iter_mut() {
                if let Some(key) = IndexKey::from_json(&member.peek_json(field)) {
                    tree.remove(&key, serial);
                }
            }
        }
    }

    /// Rebuild one field's tree from the members' current values
    fn rebuild_field(&mut self, field: &str) {
        let BatchInner {
            members, indexes, ..
        } = self;
        let Some(tree) = indexes.as_mut().and_then(|i| i.get_mut(field)) else {
            return;
        };
        tree.clear();
        for member in members.iter() {
            if let Some(key) = IndexKey::from_json(&member.peek_json(field)) {
                tree.insert(key, member.serial());
            }
        }
    }

    fn rebuild(&mut self) {
        if let Some(indexes) = &mut self.indexes {
            for tree in indexes.values_mut() {
                tree.clear();
            }
        }
        let members: Vec<Resource> = self.members.iter().cloned().collect();
        for member in &members {
            self.index_member(member);
        }
    }
}

/// Ordered collection of resources of one type
#[derive(Clone)]
pub struct Batch {
    pub(crate) inner: Rc<RefCell<BatchInner>>,
}

fn empty_indexes(rtype: &ResourceType) -> BTreeMap<String, IndexTree> {
    rtype
        .schema()
        .fields()
        .iter()
        .filter(|f| f.field_type().is_indexable())
        .map(|f| (f.name().to_string(), IndexTree::new()))
        .collect()
}

impl Batch {
    /// Empty batch, indexed when the registry config asks for it
    pub fn new(rtype: &ResourceType) -> Self {
        Self::with_indexing(rtype, rtype.config().index_batches)
    }

    /// Empty batch with explicit indexing
    pub fn with_indexing(rtype: &ResourceType, indexed: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BatchInner {
                rtype: rtype.clone(),
                members: VecDeque::new(),
                indexes: indexed.then(|| empty_indexes(rtype)),
            })),
        }
    }

    /// Batch of `members`, which must all be of type `rtype`
    pub fn with_members(rtype: &ResourceType, members: Vec<Resource>) -> Result<Self> {
        let batch = Self::new(rtype);
        batch.extend(members)?;
        Ok(batch)
    }

    fn derive(&self, members: impl IntoIterator<Item = Resource>) -> Batch {
        let inner = self.inner.borrow();
        let batch = Self::with_indexing(&inner.rtype, inner.indexes.is_some());
        {
            let mut out = batch.inner.borrow_mut();
            for member in members {
                out.index_member(&member);
                out.members.push_back(member);
            }
        }
        batch
    }

    fn check(&self, member: &Resource) -> Result<()> {
        let inner = self.inner.borrow();
        if member.resource_type() != inner.rtype {
            return Err(Error::TypeMismatch {
                expected: inner.rtype.name().to_string(),
                actual: member.type_name(),
            });
        }
        Ok(())
    }

    // ==================
    // Accessors
    // ==================

    pub fn resource_type(&self) -> ResourceType {
        self.inner.borrow().rtype.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().members.is_empty()
    }

    pub fn is_indexed(&self) -> bool {
        self.inner.borrow().indexes.is_some()
    }

    pub fn get(&self, index: usize) -> Option<Resource> {
        self.inner.borrow().members.get(index).cloned()
    }

    pub fn first(&self) -> Option<Resource> {
        self.inner.borrow().members.front().cloned()
    }

    pub fn last(&self) -> Option<Resource> {
        self.inner.borrow().members.back().cloned()
    }

    /// Member handles in order
    pub fn members(&self) -> Vec<Resource> {
        self.inner.borrow().members.iter().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &Batch) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Ids of created members, in order
    pub fn ids(&self) -> Vec<String> {
        self.members().iter().filter_map(Resource::id).collect()
    }

    /// Column of values, resolved across the batch first
    pub fn values(&self, name: &str) -> Result<Vec<Value>> {
        self.resolve([name])?;
        self.members().iter().map(|m| m.get(name)).collect()
    }

    // ==================
    // Mutation
    // ==================

    pub fn push(&self, member: Resource) -> Result<()> {
        self.check(&member)?;
        let mut inner = self.inner.borrow_mut();
        inner.index_member(&member);
        inner.members.push_back(member);
        Ok(())
    }

    pub fn push_front(&self, member: Resource) -> Result<()> {
        self.check(&member)?;
        let mut inner = self.inner.borrow_mut();
        inner.index_member(&member);
        inner.members.push_front(member);
        Ok(())
    }

    /// Insert at `index`, clamped to the end
    pub fn insert(&self, index: usize, member: Resource) -> Result<()> {
        self.check(&member)?;
        let mut inner = self.inner.borrow_mut();
        let index = index.min(inner.members.len());
        inner.index_member(&member);
        inner.members.insert(index, member);
        Ok(())
    }

    /// Append members; nothing is added if any has the wrong type
    pub fn extend(&self, members: impl IntoIterator<Item = Resource>) -> Result<()> {
        let members: Vec<Resource> = members.into_iter().collect();
        for member in &members {
            self.check(member)?;
        }
        let mut inner = self.inner.borrow_mut();
        for member in members {
            inner.index_member(&member);
            inner.members.push_back(member);
        }
        Ok(())
    }

    /// Remove the first occurrence of `member`
    pub fn remove(&self, member: &Resource) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(position) = inner.members.iter().position(|m| m.ptr_eq(member)) else {
            return false;
        };
        if let Some(removed) = inner.members.remove(position) {
            inner.unindex_member(&removed);
        }
        true
    }

    pub fn pop(&self) -> Option<Resource> {
        let mut inner = self.inner.borrow_mut();
        let member = inner.members.pop_back()?;
        inner.unindex_member(&member);
        Some(member)
    }

    pub fn pop_front(&self) -> Option<Resource> {
        let mut inner = self.inner.borrow_mut();
        let member = inner.members.pop_front()?;
        inner.unindex_member(&member);
        Some(member)
    }

    /// Rebuild indexes after members changed indexed values
    pub fn reindex(&self) {
        self.inner.borrow_mut().rebuild();
    }

    /// Rebuild the trees of `fields` after the engine loaded or set them
    pub(crate) fn refresh_indexes<I, S>(&self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = self.inner.borrow_mut();
        if inner.indexes.is_none() {
            return;
        }
        for field in fields {
            inner.rebuild_field(field.as_ref());
        }
    }

    /// Stable in-place sort by loaded values
    pub fn sort(&self, order_by: &[OrderBy]) {
        let mut inner = self.inner.borrow_mut();
        let mut members: Vec<(Vec<Json>, Resource)> = inner
            .members
            .drain(..)
            .map(|m| (order_by.iter().map(|o| m.peek_json(&o.key)).collect(), m))
            .collect();
        members.sort_by(|(a, _), (b, _)| {
            for (i, order) in order_by.iter().enumerate() {
                let ordering = compare_values(Some(&a[i]), Some(&b[i]));
                let ordering = if order.desc { ordering.reverse() } else { ordering };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        inner.members = members.into_iter().map(|(_, m)| m).collect();
    }

    /// New batch over a range of members
    pub fn slice(&self, range: Range<usize>) -> Batch {
        let members = self.members();
        let end = range.end.min(members.len());
        let start = range.start.min(end);
        self.derive(members[start..end].iter().cloned())
    }

    /// New batch with the members of both
    pub fn concat(&self, other: &Batch) -> Result<Batch> {
        let out = self.derive(self.members());
        out.extend(other.members())?;
        Ok(out)
    }

    /// Members satisfying `predicate`, in batch order
    pub fn where_(&self, predicate: &crate::predicate::Predicate) -> Result<Batch> {
        predicate.validate(&self.resource_type())?;
        let matched = super::filter::evaluate(self, predicate);
        let members = self.members();
        Ok(self.derive(members.into_iter().filter(|m| matched.contains(&m.serial()))))
    }

    pub(crate) fn serials(&self) -> BTreeSet<MemberId> {
        self.inner
            .borrow()
            .members
            .iter()
            .map(Resource::serial)
            .collect()
    }

    // ==================
    // Bulk member operations
    // ==================

    /// Set the same values on every member
    pub fn merge(&self, values: Map<String, Json>) -> Result<()> {
        let fields: Vec<String> = values.keys().cloned().collect();
        let result = self
            .members()
            .iter()
            .try_for_each(|member| member.merge(values.clone()));
        self.refresh_indexes(&fields);
        result
    }

    pub fn clean(&self) {
        for member in self.members() {
            member.clean();
        }
    }

    pub fn mark<S: AsRef<str>>(&self, names: &[S]) {
        for member in self.members() {
            member.mark(names.iter().map(|n| n.as_ref()));
        }
    }

    pub fn unload<S: AsRef<str>>(&self, names: &[S]) {
        for member in self.members() {
            member.unload(names.iter().map(|n| n.as_ref()));
        }
    }

    /// Resolve attributes for every member, amortized per resolver
    pub fn resolve<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rtype = self.resource_type();
        let members = self.members();
        let mut loaded = Vec::new();
        let result = names.into_iter().try_for_each(|name| {
            let name = name.as_ref();
            loaded.push(name.to_string());
            rtype.resolver(name)?.execute_batch(&members, &Request::new(name))
        });
        self.refresh_indexes(&loaded);
        result
    }

    pub fn create(&self) -> Result<()> {
        self.resource_type().create_many(&self.members())
    }

    pub fn update(&self) -> Result<()> {
        self.resource_type().update_many(&self.members())
    }

    pub fn save(&self) -> Result<()> {
        self.save_depth(0)
    }

    pub fn save_depth(&self, depth: usize) -> Result<()> {
        self.resource_type().save_many(&self.members(), depth)
    }

    pub fn delete(&self) -> Result<()> {
        self.resource_type().delete_many(&self.members())
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => write!(f, "{}[{}]", inner.rtype.name(), inner.members.len()),
            Err(_) => f.write_str("Batch(<borrowed>)"),
        }
    }
}
