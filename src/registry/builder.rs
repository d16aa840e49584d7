//! Registry assembly
//!
//! `build` processes definitions parents-first so subtypes inherit a
//! finished schema and resolver set, then binds every deferred type name
//! once all types have ids.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::def::ResourceDef;
use super::registry::{Registry, TypeEntry, TypeId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::resolver::{Resolver, ResolverManager};
use crate::schema::Schema;
use crate::store::{Instrumented, MemoryStore, Store};

/// Collects definitions and store bindings, then builds a [`Registry`]
#[derive(Default)]
pub struct RegistryBuilder {
    defs: Vec<ResourceDef>,
    stores: HashMap<String, Arc<dyn Store>>,
    config: Config,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn define(mut self, def: ResourceDef) -> Self {
        self.defs.push(def);
        self
    }

    /// Add definitions from a JSON array
    pub fn define_json(mut self, source: &str) -> Result<Self> {
        let defs: Vec<ResourceDef> = serde_json::from_str(source)?;
        self.defs.extend(defs);
        Ok(self)
    }

    /// Add definitions from a JSON file holding an array of definitions
    pub fn define_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        self.define_json(&source)
    }

    /// Bind a store to a type; unbound types get a fresh [`MemoryStore`]
    pub fn bind(mut self, type_name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        self.stores.insert(type_name.into(), store);
        self
    }

    pub fn build(self) -> Result<Arc<Registry>> {
        self.config.validate()?;

        let mut by_name: HashMap<String, TypeId> = HashMap::new();
        for (i, def) in self.defs.iter().enumerate() {
            if by_name.insert(def.name().to_string(), TypeId(i)).is_some() {
                return Err(Error::invalid_definition(format!(
                    "type '{}' defined twice",
                    def.name()
                )));
            }
        }
        for name in self.stores.keys() {
            if !by_name.contains_key(name) {
                return Err(Error::UnknownType(name.clone()));
            }
        }

        let order = parents_first(&self.defs, &by_name)?;
        let mut built: Vec<Option<(Schema, ResolverManager, Option<TypeId>)>> =
            (0..self.defs.len()).map(|_| None).collect();

        for index in order {
            let def = &self.defs[index];
            let id = TypeId(index);
            let parent = def.parent().and_then(|p| by_name.get(p)).copied();

            let (mut schema, mut resolvers) = match parent.and_then(|p| built[p.0].as_ref()) {
                Some((schema, resolvers, _)) => (schema.clone(), resolvers.copy_for(id)),
                None => (Schema::new(), ResolverManager::new()),
            };

            for field in def.fields() {
                field.check().map_err(|reason| {
                    Error::invalid_definition(format!("{}.{}: {}", def.name(), field.name(), reason))
                })?;
                if let Some(target) = field.foreign_target() {
                    if !by_name.contains_key(target) {
                        return Err(Error::UnknownType(target.to_string()));
                    }
                }
                schema.add(field.clone());
            }

            let own: BTreeSet<&str> = def.fields().iter().map(|f| f.name()).collect();
            for field in schema.fields() {
                if parent.is_none() || own.contains(field.name()) || !resolvers.contains(field.name()) {
                    let mut resolver = Resolver::field(field);
                    resolver.set_owner(id);
                    resolvers.register(resolver);
                }
            }

            for mut resolver in def.custom_resolvers()? {
                if schema.contains(resolver.name()) {
                    return Err(Error::invalid_definition(format!(
                        "resolver '{}' on {} shadows a field",
                        resolver.name(),
                        def.name()
                    )));
                }
                resolver.set_owner(id);
                resolvers.register(resolver);
            }

            built[index] = Some((schema, resolvers, parent));
        }

        let metrics = Arc::new(MetricsRegistry::new());
        let mut types = Vec::with_capacity(self.defs.len());
        let mut stores = self.stores;
        for (def, entry) in self.defs.iter().zip(built) {
            let (schema, mut resolvers, parent) = entry.ok_or_else(|| {
                Error::invalid_definition(format!("type '{}' was not processed", def.name()))
            })?;
            resolvers.bind_all(&by_name)?;

            let inner = stores
                .remove(def.name())
                .unwrap_or_else(|| Arc::new(MemoryStore::new()));
            let store: Arc<dyn Store> = Arc::new(Instrumented::new(inner, def.name(), metrics.clone()));

            types.push(TypeEntry {
                name: def.name().to_string(),
                schema,
                resolvers,
                store,
                parent,
            });
        }

        for entry in &types {
            for resolver in entry.resolvers.iter() {
                check_joins(entry, resolver, &types)?;
                log_event_with_fields(
                    Event::ResolverBound,
                    &[("type", entry.name.as_str()), ("resolver", resolver.name())],
                );
            }
        }

        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let registry = Registry {
            types,
            by_name,
            config: self.config,
            metrics,
            rng: Mutex::new(rng),
        };
        log_event_with_fields(
            Event::RegistryBuilt,
            &[("types", registry.len().to_string().as_str())],
        );
        Ok(Arc::new(registry))
    }
}

/// Topological order over `extends`
fn parents_first(defs: &[ResourceDef], by_name: &HashMap<String, TypeId>) -> Result<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Visiting,
        Done,
    }

    fn visit(
        index: usize,
        defs: &[ResourceDef],
        by_name: &HashMap<String, TypeId>,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[index] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                return Err(Error::invalid_definition(format!(
                    "inheritance cycle through '{}'",
                    defs[index].name()
                )))
            }
            Mark::New => {}
        }
        marks[index] = Mark::Visiting;
        if let Some(parent) = defs[index].parent() {
            let parent_id = by_name
                .get(parent)
                .ok_or_else(|| Error::UnknownType(parent.to_string()))?;
            visit(parent_id.0, defs, by_name, marks, order)?;
        }
        marks[index] = Mark::Done;
        order.push(index);
        Ok(())
    }

    let mut marks = vec![Mark::New; defs.len()];
    let mut order = Vec::with_capacity(defs.len());
    for index in 0..defs.len() {
        visit(index, defs, by_name, &mut marks, &mut order)?;
    }
    Ok(order)
}

/// Every join must connect schema fields
fn check_joins(owner: &TypeEntry, resolver: &Resolver, types: &[TypeEntry]) -> Result<()> {
    let mut current = owner;
    for join in resolver.joins() {
        let target = &types[join.target_id()?.0];
        if !current.schema.contains(join.source()) {
            return Err(Error::not_a_field(current.name.as_str(), join.source()));
        }
        if !target.schema.contains(join.target_field()) {
            return Err(Error::not_a_field(target.name.as_str(), join.target_field()));
        }
        if let Some(filter) = &join.predicate {
            for name in filter.fields() {
                if !target.schema.contains(&name) {
                    return Err(Error::not_a_field(target.name.as_str(), name));
                }
            }
        }
        current = target;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Join;
    use crate::schema::Field;

    #[test]
    fn test_build_registers_fields_and_ids() {
        let registry = RegistryBuilder::new()
            .define(ResourceDef::new("Dog").field(Field::string("color")).field(Field::int("age")))
            .build()
            .unwrap();

        let dog = registry.resource_type("Dog").unwrap();
        let mut names: Vec<_> = dog.resolvers().names().collect();
        names.sort();
        assert_eq!(names, vec!["_id", "_rev", "age", "color"]);
        assert_eq!(registry.resource_type("Cat").unwrap_err().code(), "BINDERY_UNKNOWN_TYPE");
    }

    #[test]
    fn test_inheritance_copies_parent() {
        let registry = RegistryBuilder::new()
            .define(ResourceDef::new("Puppy").extends("Dog").field(Field::bool("trained")))
            .define(
                ResourceDef::new("Dog")
                    .field(Field::string("color"))
                    .join("owner", "owner_id", "Person._id", false)
                    .field(Field::id("owner_id")),
            )
            .define(ResourceDef::new("Person").field(Field::string("name")))
            .build()
            .unwrap();

        let puppy = registry.resource_type("Puppy").unwrap();
        assert!(puppy.schema().contains("color"));
        assert!(puppy.schema().contains("trained"));

        let owner = puppy.resolver("owner").unwrap();
        assert_eq!(owner.owner(), puppy.id());
        assert!(owner.is_bound());
        assert_eq!(puppy.parent().map(|p| p.name().to_string()), Some("Dog".to_string()));
    }

    #[test]
    fn test_inheritance_cycle() {
        let err = RegistryBuilder::new()
            .define(ResourceDef::new("A").extends("B"))
            .define(ResourceDef::new("B").extends("A"))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "BINDERY_INVALID_DEFINITION");
    }

    #[test]
    fn test_unknown_join_type() {
        let err = RegistryBuilder::new()
            .define(ResourceDef::new("Ship").join("crew", "_id", "Officer.ship_id", true))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "BINDERY_UNKNOWN_TYPE");
    }

    #[test]
    fn test_join_on_non_field() {
        let err = RegistryBuilder::new()
            .define(ResourceDef::new("Ship").join("crew", "_id", "Officer.ship", true))
            .define(ResourceDef::new("Officer").field(Field::id("ship_id")))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "BINDERY_NOT_A_FIELD");
    }

    #[test]
    fn test_resolver_cannot_shadow_field() {
        let err = RegistryBuilder::new()
            .define(
                ResourceDef::new("Ship")
                    .field(Field::string("name"))
                    .resolver(Resolver::relationship("name", vec![Join::new("_id", "Ship._id")])),
            )
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "BINDERY_INVALID_DEFINITION");
    }

    #[test]
    fn test_duplicate_type() {
        let err = RegistryBuilder::new()
            .define(ResourceDef::new("Dog"))
            .define(ResourceDef::new("Dog"))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "BINDERY_INVALID_DEFINITION");
    }

    #[test]
    fn test_define_json() {
        let registry = RegistryBuilder::new()
            .define_json(
                r#"[
                    {"name": "Ship", "fields": [{"name": "name", "type": "string"}],
                     "relationships": [{"name": "crew", "many": true,
                                        "joins": [{"source": "_id", "target": "Officer.ship_id"}]}]},
                    {"name": "Officer", "fields": [{"name": "ship_id", "type": "id", "target": "Ship"}]}
                ]"#,
            )
            .unwrap()
            .build()
            .unwrap();
        let ship = registry.resource_type("Ship").unwrap();
        assert!(ship.resolver("crew").unwrap().is_many());
    }
}
