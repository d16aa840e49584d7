//! The type registry
//!
//! Owns every resource type of one engine instance together with the
//! configuration, the metrics and the fixture RNG. Types are addressed by
//! [`TypeId`], an index into the registry's type table.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::observability::{MetricsRegistry, MetricsSnapshot};
use crate::resolver::ResolverManager;
use crate::resource::ResourceType;
use crate::schema::Schema;
use crate::store::Store;

/// Index of a resource type in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    /// Owner of a resolver not yet registered on a type
    pub(crate) const UNASSIGNED: TypeId = TypeId(usize::MAX);

    pub fn index(&self) -> usize {
        self.0
    }
}

pub(crate) struct TypeEntry {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) resolvers: ResolverManager,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) parent: Option<TypeId>,
}

/// Registry of resource types
pub struct Registry {
    pub(crate) types: Vec<TypeEntry>,
    pub(crate) by_name: HashMap<String, TypeId>,
    pub(crate) config: Config,
    pub(crate) metrics: Arc<MetricsRegistry>,
    pub(crate) rng: Mutex<StdRng>,
}

impl Registry {
    pub fn builder() -> super::RegistryBuilder {
        super::RegistryBuilder::new()
    }

    /// Look up a type by name
    pub fn resource_type(self: &Arc<Self>, name: &str) -> Result<ResourceType> {
        let id = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;
        Ok(ResourceType::new(self.clone(), id))
    }

    pub(crate) fn type_by_id(self: &Arc<Self>, id: TypeId) -> ResourceType {
        ResourceType::new(self.clone(), id)
    }

    pub(crate) fn entry(&self, id: TypeId) -> &TypeEntry {
        &self.types[id.0]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Type names in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Point-in-time counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn metrics_registry(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Run `f` with the shared fixture RNG
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_names().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}
