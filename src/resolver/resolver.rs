//! Resolver definitions and execution
//!
//! A resolver produces the value of one named attribute on a resource.
//! Results are cached in the owner's state, so repeated reads are free
//! until the attribute is unloaded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde_json::Value as Json;

use super::{field, relationship};
use crate::error::{Error, Result};
use crate::observability::{log_event_with_fields, Event};
use crate::predicate::{Constraint, Constraints, Predicate};
use crate::query::Request;
use crate::registry::TypeId;
use crate::resource::Resource;
use crate::schema::Field;
use crate::value::Value;

/// Produce a value for one owner
pub type ExecuteFn = Arc<dyn Fn(&Resource, &Request) -> Result<Value> + Send + Sync>;
/// Produce values for many owners at once, aligned with the input
pub type BatchExecuteFn = Arc<dyn Fn(&[Resource], &Request) -> Result<Vec<Value>> + Send + Sync>;
/// Transform a value on its way in or out
pub type TransformFn = Arc<dyn Fn(&Resource, Value) -> Result<Value> + Send + Sync>;
/// Called when an attribute is unset
pub type DeleteFn = Arc<dyn Fn(&Resource) -> Result<()> + Send + Sync>;
/// Called for each loaded value when the owner is saved with cascade
pub type SaveFn = Arc<dyn Fn(&Resource, &Value) -> Result<()> + Send + Sync>;

/// Execution priority of field resolvers
pub const FIELD_PRIORITY: u32 = 1;
/// Execution priority of relationship resolvers
pub const RELATIONSHIP_PRIORITY: u32 = 10;
/// Execution priority of computed resolvers
pub const COMPUTED_PRIORITY: u32 = 20;

/// Reference to a resource type, by name until bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    Bound(TypeId),
}

impl TypeRef {
    fn bind(&mut self, names: &HashMap<String, TypeId>) -> Result<()> {
        if let TypeRef::Named(name) = self {
            let id = names
                .get(name.as_str())
                .copied()
                .ok_or_else(|| Error::UnknownType(name.clone()))?;
            *self = TypeRef::Bound(id);
        }
        Ok(())
    }

    fn id(&self) -> Result<TypeId> {
        match self {
            TypeRef::Bound(id) => Ok(*id),
            TypeRef::Named(name) => Err(Error::invalid_definition(format!(
                "type reference '{}' is not bound",
                name
            ))),
        }
    }
}

/// One hop of a relationship: `source` on the current type equals
/// `target_field` on `target_type`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub(crate) source: String,
    pub(crate) target_type: TypeRef,
    pub(crate) target_field: String,
    pub(crate) predicate: Option<Predicate>,
}

impl Join {
    /// `target` is written `Type.field`
    pub fn new(source: impl Into<String>, target: &str) -> Self {
        let (target_type, target_field) = match target.rsplit_once('.') {
            Some((t, f)) => (t.to_string(), f.to_string()),
            None => (String::new(), target.to_string()),
        };
        Self {
            source: source.into(),
            target_type: TypeRef::Named(target_type),
            target_field,
            predicate: None,
        }
    }

    /// Extra filter applied to the target side of this hop
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    pub(crate) fn target_id(&self) -> Result<TypeId> {
        self.target_type.id()
    }
}

/// What a resolver reads from
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverKind {
    /// Backed by a schema field and the type's store
    Field,
    /// Follows one or more joins to another type
    Relationship(Vec<Join>),
    /// Produced by an `on_execute` hook
    Computed,
}

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) on_execute: Option<ExecuteFn>,
    pub(crate) on_execute_batch: Option<BatchExecuteFn>,
    pub(crate) post_execute: Option<TransformFn>,
    pub(crate) on_get: Option<TransformFn>,
    pub(crate) on_set: Option<TransformFn>,
    pub(crate) on_del: Option<DeleteFn>,
    pub(crate) on_save: Option<SaveFn>,
    pub(crate) on_backfill: Option<ExecuteFn>,
}

/// Production rule for one resource attribute
#[derive(Clone)]
pub struct Resolver {
    name: String,
    owner: TypeId,
    /// `None` means the owner itself
    target: Option<TypeRef>,
    kind: ResolverKind,
    many: bool,
    lazy: bool,
    private: bool,
    required: bool,
    nullable: bool,
    pub(crate) hooks: Hooks,
    bound: bool,
}

impl Resolver {
    fn with_kind(name: impl Into<String>, kind: ResolverKind, target: Option<TypeRef>) -> Self {
        Self {
            name: name.into(),
            owner: TypeId::UNASSIGNED,
            target,
            kind,
            many: false,
            lazy: true,
            private: false,
            required: false,
            nullable: true,
            hooks: Hooks::default(),
            bound: false,
        }
    }

    /// Resolver for a schema field
    pub fn field(field: &Field) -> Self {
        let mut resolver = Self::with_kind(field.name(), ResolverKind::Field, None);
        resolver.lazy = field.is_lazy();
        resolver.private = field.is_private();
        resolver.required = field.is_required();
        resolver.nullable = field.is_nullable();
        resolver
    }

    /// Resolver following `joins`; the last hop names the target type
    pub fn relationship(name: impl Into<String>, joins: Vec<Join>) -> Self {
        let target = joins.last().map(|j| j.target_type.clone());
        Self::with_kind(name, ResolverKind::Relationship(joins), target)
    }

    /// Resolver whose value comes from `on_execute`
    pub fn computed<F>(name: impl Into<String>, on_execute: F) -> Self
    where
        F: Fn(&Resource, &Request) -> Result<Value> + Send + Sync + 'static,
    {
        let mut resolver = Self::with_kind(name, ResolverKind::Computed, None);
        resolver.hooks.on_execute = Some(Arc::new(on_execute));
        resolver
    }

    // ==================
    // Builder
    // ==================

    /// Produce a collection rather than a single value
    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Override the target type of a computed resolver
    pub fn target(mut self, type_name: impl Into<String>) -> Self {
        self.target = Some(TypeRef::Named(type_name.into()));
        self
    }

    pub fn on_execute<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource, &Request) -> Result<Value> + Send + Sync + 'static,
    {
        self.hooks.on_execute = Some(Arc::new(f));
        self
    }

    pub fn on_execute_batch<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Resource], &Request) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.hooks.on_execute_batch = Some(Arc::new(f));
        self
    }

    /// Transform applied once when the value is resolved. The transformed
    /// value is the one cached, so later reads return it unchanged.
    pub fn post_execute<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.hooks.post_execute = Some(Arc::new(f));
        self
    }

    pub fn on_get<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.hooks.on_get = Some(Arc::new(f));
        self
    }

    pub fn on_set<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.hooks.on_set = Some(Arc::new(f));
        self
    }

    pub fn on_del<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.on_del = Some(Arc::new(f));
        self
    }

    pub fn on_save<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.on_save = Some(Arc::new(f));
        self
    }

    pub fn on_backfill<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource, &Request) -> Result<Value> + Send + Sync + 'static,
    {
        self.hooks.on_backfill = Some(Arc::new(f));
        self
    }

    // ==================
    // Accessors
    // ==================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> TypeId {
        self.owner
    }

    /// The type this resolver produces
    pub fn target_id(&self) -> Result<TypeId> {
        match &self.target {
            None => Ok(self.owner),
            Some(target) => target.id(),
        }
    }

    pub fn kind(&self) -> &ResolverKind {
        &self.kind
    }

    pub fn joins(&self) -> &[Join] {
        match &self.kind {
            ResolverKind::Relationship(joins) => joins,
            _ => &[],
        }
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, ResolverKind::Field)
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, ResolverKind::Relationship(_))
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.kind, ResolverKind::Computed)
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Fields load first, then relationships (which may need join keys),
    /// then computed values
    pub fn priority(&self) -> u32 {
        match self.kind {
            ResolverKind::Field => FIELD_PRIORITY,
            ResolverKind::Relationship(_) => RELATIONSHIP_PRIORITY,
            ResolverKind::Computed => COMPUTED_PRIORITY,
        }
    }

    /// Tag used by the resolver manager's index
    pub fn tag(&self) -> &'static str {
        match self.kind {
            ResolverKind::Field => "fields",
            ResolverKind::Relationship(_) => "relationships",
            ResolverKind::Computed => "computed",
        }
    }

    /// Order resolvers by ascending priority (stable)
    pub fn sort<'a>(resolvers: impl IntoIterator<Item = &'a Resolver>) -> Vec<&'a Resolver> {
        let mut sorted: Vec<&Resolver> = resolvers.into_iter().collect();
        sorted.sort_by_key(|r| r.priority());
        sorted
    }

    // ==================
    // Lifecycle
    // ==================

    pub(crate) fn set_owner(&mut self, owner: TypeId) {
        self.owner = owner;
    }

    /// Copy for another owner; the copy must be bound again
    pub(crate) fn copy_for(&self, owner: TypeId) -> Resolver {
        let mut copy = self.clone();
        copy.owner = owner;
        copy.bound = false;
        copy
    }

    /// Resolve deferred type names to registry ids. Idempotent.
    pub(crate) fn bind(&mut self, names: &HashMap<String, TypeId>) -> Result<()> {
        if self.bound {
            return Ok(());
        }
        if let Some(target) = &mut self.target {
            target.bind(names)?;
        }
        if let ResolverKind::Relationship(joins) = &mut self.kind {
            for join in joins.iter_mut() {
                join.target_type.bind(names)?;
            }
        }
        self.bound = true;
        Ok(())
    }

    // ==================
    // Execution
    // ==================

    /// Value for one owner; cached in the owner's state until unloaded
    pub fn execute(&self, owner: &Resource, request: &Request) -> Result<Value> {
        let registry = owner.resource_type().registry().clone();
        if let Some(value) = owner.cached(&self.name) {
            registry.metrics_registry().increment_resolver_cache_hits();
            log_event_with_fields(
                Event::ResolverCacheHit,
                &[("type", owner.type_name().as_str()), ("resolver", self.name.as_str())],
            );
            return Ok(value);
        }

        let (value, cache) = match (&self.hooks.on_execute, &self.kind) {
            (Some(hook), _) => (hook(owner, request)?, true),
            (None, ResolverKind::Field) => {
                // uncreated owners have nothing to load and cache nothing
                field::load_one(owner)?;
                match owner.cached(&self.name) {
                    Some(value) => (value, true),
                    None => (Value::Null, false),
                }
            }
            (None, ResolverKind::Relationship(joins)) => {
                let value = relationship::resolve(self, joins, std::slice::from_ref(owner), request)?
                    .pop()
                    .unwrap_or_default();
                (value, true)
            }
            (None, ResolverKind::Computed) => (Value::Null, true),
        };

        let value = match &self.hooks.post_execute {
            Some(hook) => hook(owner, value)?,
            None => value,
        };
        if cache {
            owner.insert_clean(&self.name, value.clone());
        }

        registry.metrics_registry().increment_resolver_executions();
        log_event_with_fields(
            Event::ResolverExecuted,
            &[("type", owner.type_name().as_str()), ("resolver", self.name.as_str())],
        );
        Ok(value)
    }

    /// Load this resolver for every owner that lacks it, amortizing
    /// storage calls across the whole set
    pub fn execute_batch(&self, owners: &[Resource], request: &Request) -> Result<()> {
        let pending: Vec<Resource> = owners
            .iter()
            .filter(|o| !o.is_loaded(&self.name))
            .cloned()
            .collect();
        let Some(first) = pending.first() else {
            return Ok(());
        };
        let rtype = first.resource_type();

        match (&self.hooks.on_execute_batch, &self.hooks.on_execute, &self.kind) {
            (Some(hook), _, _) => {
                let values = hook(&pending, request)?;
                if values.len() != pending.len() {
                    return Err(Error::invalid_definition(format!(
                        "batch hook for '{}' returned {} values for {} owners",
                        self.name,
                        values.len(),
                        pending.len()
                    )));
                }
                for (owner, value) in pending.iter().zip(values) {
                    owner.insert_clean(&self.name, value);
                }
            }
            (None, None, ResolverKind::Field) => field::load_many(&rtype, &pending)?,
            (None, None, ResolverKind::Relationship(joins)) => {
                let values = relationship::resolve(self, joins, &pending, request)?;
                for (owner, value) in pending.iter().zip(values) {
                    owner.insert_clean(&self.name, value);
                }
            }
            _ => {
                for owner in &pending {
                    self.execute(owner, request)?;
                }
                return Ok(());
            }
        }

        if let Some(hook) = &self.hooks.post_execute {
            for owner in &pending {
                if let Some(value) = owner.cached(&self.name) {
                    owner.insert_clean(&self.name, hook(owner, value)?);
                }
            }
        }

        rtype.registry().metrics_registry().increment_resolver_executions();
        log_event_with_fields(
            Event::ResolverExecuted,
            &[
                ("type", rtype.name()),
                ("resolver", self.name.as_str()),
                ("owners", pending.len().to_string().as_str()),
            ],
        );
        Ok(())
    }

    /// Synthesize a value for `owner` (fixtures)
    pub fn generate(&self, owner: &Resource) -> Result<Value> {
        let rtype = owner.resource_type();
        match &self.kind {
            ResolverKind::Field => {
                let field = rtype
                    .schema()
                    .get(&self.name)
                    .ok_or_else(|| Error::not_a_field(rtype.name(), &self.name))?;
                let json = rtype.registry().with_rng(|rng| field.generate(rng, None));
                Ok(Value::from_json(json))
            }
            ResolverKind::Relationship(joins) => {
                let [join] = joins.as_slice() else {
                    return Err(Error::unsupported(format!(
                        "generating multi-hop relationship '{}'",
                        self.name
                    )));
                };
                let target = rtype.registry().type_by_id(join.target_id()?);
                let key: Json = owner.peek_json(&join.source);
                let mut constraints = Constraints::new();
                constraints.insert(
                    join.target_field.clone(),
                    Constraint {
                        equals: Some(key),
                        ..Constraint::default()
                    },
                );
                if let Some(extra) = &join.predicate {
                    for (name, constraint) in extra.constraints() {
                        constraints.entry(name).or_insert(constraint);
                    }
                }
                if self.many {
                    let max = rtype.registry().config().backfill_max.max(1);
                    let count = rtype.registry().with_rng(|rng| rng.gen_range(1..=max));
                    let members = (0..count)
                        .map(|_| target.generate_with(&constraints))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Value::Batch(crate::batch::Batch::with_members(&target, members)?))
                } else {
                    Ok(Value::Resource(target.generate_with(&constraints)?))
                }
            }
            ResolverKind::Computed => match &self.hooks.on_backfill {
                Some(hook) => hook(owner, &Request::new(self.name.clone())),
                None => Err(Error::unsupported(format!(
                    "computed resolver '{}' has no backfill hook",
                    self.name
                ))),
            },
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .field("many", &self.many)
            .field("lazy", &self.lazy)
            .field("bound", &self.bound)
            .finish()
    }
}
