//! Per-type resolver registry
//!
//! Keeps resolvers by name plus secondary indexes by tag, required and
//! private flags. Registering a name twice replaces the earlier resolver
//! and its index entries.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::resolver::Resolver;
use crate::error::Result;
use crate::registry::TypeId;

#[derive(Debug, Clone, Default)]
pub struct ResolverManager {
    resolvers: BTreeMap<String, Resolver>,
    tags: BTreeMap<&'static str, BTreeSet<String>>,
    required: BTreeSet<String>,
    private: BTreeSet<String>,
}

impl ResolverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resolver
    pub fn register(&mut self, resolver: Resolver) {
        let name = resolver.name().to_string();
        self.unregister(&name);

        self.tags.entry(resolver.tag()).or_default().insert(name.clone());
        if resolver.is_required() {
            self.required.insert(name.clone());
        }
        if resolver.is_private() {
            self.private.insert(name.clone());
        }
        self.resolvers.insert(name, resolver);
    }

    /// Remove a resolver and its index entries
    pub fn unregister(&mut self, name: &str) -> Option<Resolver> {
        let old = self.resolvers.remove(name)?;
        if let Some(names) = self.tags.get_mut(old.tag()) {
            names.remove(name);
        }
        self.required.remove(name);
        self.private.remove(name);
        Some(old)
    }

    pub fn get(&self, name: &str) -> Option<&Resolver> {
        self.resolvers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolver> {
        self.resolvers.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    /// Resolvers carrying `tag`, or every other resolver when `invert`
    pub fn by_tag(&self, tag: &str, invert: bool) -> Vec<&Resolver> {
        let tagged = self.tags.get(tag);
        self.resolvers
            .values()
            .filter(|r| tagged.map_or(false, |t| t.contains(r.name())) != invert)
            .collect()
    }

    pub fn fields(&self) -> Vec<&Resolver> {
        self.by_tag("fields", false)
    }

    pub fn relationships(&self) -> Vec<&Resolver> {
        self.by_tag("relationships", false)
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn private(&self) -> &BTreeSet<String> {
        &self.private
    }

    /// Copy every resolver for a subtype
    pub(crate) fn copy_for(&self, owner: TypeId) -> Self {
        let mut copy = Self::new();
        for resolver in self.resolvers.values() {
            copy.register(resolver.copy_for(owner));
        }
        copy
    }

    pub(crate) fn bind_all(&mut self, names: &HashMap<String, TypeId>) -> Result<()> {
        for resolver in self.resolvers.values_mut() {
            resolver.bind(names)?;
        }
        Ok(())
    }
}
