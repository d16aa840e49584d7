//! Resource type handles

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use super::Resource;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::predicate::{parse_for, Predicate};
use crate::query::{Query, Selector};
use crate::registry::{Registry, TypeEntry, TypeId};
use crate::resolver::{Resolver, ResolverManager};
use crate::schema::Schema;
use crate::store::Store;

/// Cheap, cloneable handle to one registered type
#[derive(Clone)]
pub struct ResourceType {
    registry: Arc<Registry>,
    id: TypeId,
}

impl ResourceType {
    pub(crate) fn new(registry: Arc<Registry>, id: TypeId) -> Self {
        Self { registry, id }
    }

    fn entry(&self) -> &TypeEntry {
        self.registry.entry(self.id)
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.entry().name
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        self.registry.config()
    }

    pub fn schema(&self) -> &Schema {
        &self.entry().schema
    }

    pub fn resolvers(&self) -> &ResolverManager {
        &self.entry().resolvers
    }

    /// Store bound to this type (observed)
    pub fn store(&self) -> &dyn Store {
        self.entry().store.as_ref()
    }

    pub fn parent(&self) -> Option<ResourceType> {
        self.entry().parent.map(|id| self.registry.type_by_id(id))
    }

    /// Whether this type is `other` or inherits from it
    pub fn is_subtype_of(&self, other: &ResourceType) -> bool {
        let mut current = Some(self.clone());
        while let Some(t) = current {
            if t == *other {
                return true;
            }
            current = t.parent();
        }
        false
    }

    pub fn resolver(&self, name: &str) -> Result<&Resolver> {
        self.resolvers()
            .get(name)
            .ok_or_else(|| Error::unknown_resolver(self.name(), name))
    }

    /// A resolver that must be backed by a schema field
    pub fn field_resolver(&self, name: &str) -> Result<&Resolver> {
        let resolver = self.resolver(name)?;
        if !resolver.is_field() {
            return Err(Error::not_a_field(self.name(), name));
        }
        Ok(resolver)
    }

    /// Target type of a relationship or computed resolver
    pub fn resolver_target(&self, name: &str) -> Result<ResourceType> {
        let id = self.resolver(name)?.target_id()?;
        Ok(self.registry.type_by_id(id))
    }

    /// New, uncreated resource from a JSON object; defaults are applied
    pub fn new_resource(&self, values: Json) -> Result<Resource> {
        let values = match values {
            Json::Null => Map::new(),
            Json::Object(map) => map,
            other => {
                return Err(Error::TypeMismatch {
                    expected: "object".into(),
                    actual: other.to_string(),
                })
            }
        };
        let resource = Resource::new(self);
        resource.merge(values)?;
        Ok(resource)
    }

    // ==================
    // Queries
    // ==================

    /// Query over this type with default selection
    pub fn query(&self) -> Query {
        Query::new(self)
    }

    pub fn select<I, S>(&self, selectors: I) -> Result<Query>
    where
        I: IntoIterator<Item = S>,
        S: Into<Selector>,
    {
        Query::new(self).select(selectors)
    }

    pub fn where_(&self, predicate: Predicate) -> Result<Query> {
        Query::new(self).where_(predicate)
    }

    pub fn where_eq(&self, field: &str, value: impl Into<Json>) -> Result<Query> {
        Query::new(self).where_eq(field, value)
    }

    /// Query filtered by a textual predicate
    pub fn filter(&self, text: &str) -> Result<Query> {
        Query::new(self).where_(parse_for(self, text)?)
    }

    /// Query over a relationship's target, aliased to the relationship so it
    /// can be passed to [`Query::select`] as a nested selection
    pub fn subquery(&self, relationship: &str) -> Result<Query> {
        let resolver = self.resolver(relationship)?;
        if !resolver.is_relationship() {
            return Err(Error::unsupported(format!(
                "'{}' on {} is not a relationship",
                relationship,
                self.name()
            )));
        }
        Ok(Query::new(&self.resolver_target(relationship)?).alias(relationship))
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry) && self.id == other.id
    }
}

impl Eq for ResourceType {}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceType({})", self.name())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
