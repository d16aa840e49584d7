//! Writes and type-level reads
//!
//! Every bulk write validates all records first and raises one
//! [`ValidationError`](crate::schema::ValidationError) for the whole set
//! before the store sees anything.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::Rng;
use serde_json::{Map, Value as Json};

use super::{Resource, ResourceType};
use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::observability::{log_event_with_fields, Event};
use crate::predicate::{Constraints, Predicate};
use crate::query::OrderBy;
use crate::registry::TypeId;
use crate::schema::{ErrorCollector, FieldError, RecordErrors, ID_FIELD, REV_FIELD};
use crate::value::Value;

#[derive(Clone, Copy, PartialEq)]
enum WriteKind {
    Create,
    Update,
}

/// Processed record for a write, or the field errors that block it
fn prepare(resource: &Resource, kind: WriteKind) -> (Map<String, Json>, RecordErrors) {
    let rtype = resource.resource_type();
    let values = resource.field_values();
    let dirty = resource.dirty();
    let mut record = Map::new();
    let mut errors = RecordErrors::new(resource.id());

    for field in rtype.schema().fields() {
        let name = field.name();
        if name == REV_FIELD || (kind == WriteKind::Update && name == ID_FIELD) {
            continue;
        }
        if kind == WriteKind::Update && !dirty.contains(name) {
            continue;
        }
        let value = match values.get(name) {
            Some(value) => value.clone(),
            None if kind == WriteKind::Create => match field.default_for() {
                Some(default) => default,
                None if field.is_required() => {
                    errors.insert(name, FieldError::missing());
                    continue;
                }
                None => continue,
            },
            None => continue,
        };

        if value.is_null() && !field.is_nullable() {
            if field.is_required() || name == ID_FIELD {
                errors.insert(name, FieldError::null());
            } else {
                log_event_with_fields(
                    Event::NullValueDropped,
                    &[("type", rtype.name()), ("field", name)],
                );
            }
            continue;
        }
        if value.is_null() && field.is_required() {
            errors.insert(name, FieldError::null());
            continue;
        }

        match field.process(&value) {
            Ok(processed) => {
                record.insert(name.to_string(), processed);
            }
            Err(error) => errors.insert(name, error),
        }
    }
    (record, errors)
}

fn check_type(rtype: &ResourceType, resources: &[Resource]) -> Result<()> {
    for resource in resources {
        if resource.resource_type() != *rtype {
            return Err(Error::TypeMismatch {
                expected: rtype.name().to_string(),
                actual: resource.type_name(),
            });
        }
    }
    Ok(())
}

fn finish(rtype: &ResourceType, collector: ErrorCollector) -> Result<()> {
    collector.finish(rtype.name()).map_err(|error| {
        rtype.registry().metrics_registry().increment_validation_failures();
        log_event_with_fields(
            Event::ValidationFailed,
            &[("type", rtype.name()), ("records", error.records.len().to_string().as_str())],
        );
        error.into()
    })
}

impl Resource {
    /// Insert into the store
    pub fn create(&self) -> Result<()> {
        self.resource_type().create_many(std::slice::from_ref(self))
    }

    /// Write dirty fields to the store
    pub fn update(&self) -> Result<()> {
        self.resource_type().update_many(std::slice::from_ref(self))
    }

    /// Create or update, without cascading
    pub fn save(&self) -> Result<()> {
        self.save_depth(0)
    }

    /// Create or update, then save loaded related values `depth` levels down
    pub fn save_depth(&self, depth: usize) -> Result<()> {
        self.resource_type()
            .save_many(std::slice::from_ref(self), depth)
    }

    /// Remove from the store; the resource becomes uncreated
    pub fn delete(&self) -> Result<()> {
        self.resource_type().delete_many(std::slice::from_ref(self))
    }

    /// Check every loaded field (and required fields) without writing
    pub fn validate(&self) -> Result<()> {
        let rtype = self.resource_type();
        let kind = if self.is_created() {
            WriteKind::Update
        } else {
            WriteKind::Create
        };
        let (_, errors) = prepare(self, kind);
        let mut collector = ErrorCollector::default();
        collector.push(errors);
        finish(&rtype, collector)
    }
}

impl ResourceType {
    // ==================
    // Reads
    // ==================

    /// Fetch one resource by id
    pub fn get(&self, id: &str) -> Result<Option<Resource>> {
        Ok(self
            .store()
            .fetch(id, None)?
            .map(|record| Resource::from_record(self, record)))
    }

    /// Fetch resources by id, in the order given; missing ids are skipped
    pub fn get_many(&self, ids: &[String]) -> Result<Batch> {
        let mut records = self.store().fetch_many(ids, None)?;
        let members = ids
            .iter()
            .filter_map(|id| records.remove(id))
            .map(|record| Resource::from_record(self, record))
            .collect();
        Batch::with_members(self, members)
    }

    /// Fetch resources by id with ordering and paging, through a query
    pub fn get_many_paged(
        &self,
        ids: &[String],
        order_by: &[OrderBy],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Batch> {
        if order_by.is_empty() && limit.is_none() && offset.is_none() {
            return self.get_many(ids);
        }
        let mut query = self
            .query()
            .where_(Predicate::including(ID_FIELD, ids.iter().cloned()))?
            .order_by(order_by.iter().cloned())?;
        if let Some(limit) = limit {
            query = query.limit(limit as i64);
        }
        if let Some(offset) = offset {
            query = query.offset(offset as i64);
        }
        query.execute()
    }

    /// Every stored resource, in store order
    pub fn get_all(&self) -> Result<Batch> {
        let members = self
            .store()
            .fetch_all(None)?
            .into_iter()
            .map(|record| Resource::from_record(self, record))
            .collect();
        Batch::with_members(self, members)
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.store().exists(id)?)
    }

    pub fn exists_many(&self, ids: &[String]) -> Result<HashMap<String, bool>> {
        Ok(self.store().exists_many(ids)?)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.store().count()?)
    }

    // ==================
    // Writes
    // ==================

    /// Validate and insert `resources` with one store call
    pub fn create_many(&self, resources: &[Resource]) -> Result<()> {
        if resources.is_empty() {
            return Ok(());
        }
        check_type(self, resources)?;

        let mut collector = ErrorCollector::default();
        let mut records = Vec::with_capacity(resources.len());
        for resource in resources {
            let (record, errors) = prepare(resource, WriteKind::Create);
            collector.push(errors);
            records.push(record);
        }
        finish(self, collector)?;

        let created = self.store().create_many(records)?;
        for (resource, record) in resources.iter().zip(created) {
            resource.absorb(record);
        }

        self.registry()
            .metrics_registry()
            .add_resources_created(resources.len() as u64);
        log_event_with_fields(
            Event::ResourcesCreated,
            &[("type", self.name()), ("count", resources.len().to_string().as_str())],
        );
        Ok(())
    }

    /// Write dirty fields, one `update_many` per distinct dirty-field set
    pub fn update_many(&self, resources: &[Resource]) -> Result<()> {
        if resources.is_empty() {
            return Ok(());
        }
        check_type(self, resources)?;

        let mut collector = ErrorCollector::default();
        let mut partitions: BTreeMap<Vec<String>, Vec<(String, Map<String, Json>)>> = BTreeMap::new();
        for resource in resources {
            let id = resource.created_id().ok_or_else(|| {
                Error::unsupported(format!("update of uncreated {}", self.name()))
            })?;
            let (record, errors) = prepare(resource, WriteKind::Update);
            collector.push(errors);
            if record.is_empty() {
                continue;
            }
            let signature: Vec<String> = record.keys().cloned().collect();
            partitions.entry(signature).or_default().push((id, record));
        }
        finish(self, collector)?;

        let mut updated: HashMap<String, Map<String, Json>> = HashMap::new();
        for rows in partitions.into_values() {
            let (ids, records): (Vec<String>, Vec<Map<String, Json>>) = rows.into_iter().unzip();
            updated.extend(self.store().update_many(&ids, records)?);
        }

        for resource in resources {
            match resource.id().and_then(|id| updated.remove(&id)) {
                Some(record) => resource.absorb(record),
                None => resource.clean(),
            }
        }

        self.registry()
            .metrics_registry()
            .add_resources_updated(resources.len() as u64);
        log_event_with_fields(
            Event::ResourcesUpdated,
            &[("type", self.name()), ("count", resources.len().to_string().as_str())],
        );
        Ok(())
    }

    /// Create the uncreated, update the rest, then cascade `depth` levels
    pub fn save_many(&self, resources: &[Resource], depth: usize) -> Result<()> {
        let (created, fresh): (Vec<Resource>, Vec<Resource>) =
            resources.iter().cloned().partition(Resource::is_created);
        self.create_many(&fresh)?;
        self.update_many(&created)?;

        if depth == 0 {
            return Ok(());
        }

        let mut related: BTreeMap<TypeId, (ResourceType, Vec<Resource>)> = BTreeMap::new();
        let mut seen: BTreeSet<u64> = BTreeSet::new();
        let mut collect = |target: &Resource| {
            if seen.insert(target.serial()) {
                let rtype = target.resource_type();
                related
                    .entry(rtype.id())
                    .or_insert_with(|| (rtype, Vec::new()))
                    .1
                    .push(target.clone());
            }
        };

        for resolver in self.resolvers().by_tag("fields", true) {
            for resource in resources {
                let Some(value) = resource.cached(resolver.name()) else {
                    continue;
                };
                if let Some(hook) = &resolver.hooks.on_save {
                    hook(resource, &value)?;
                    continue;
                }
                match &value {
                    Value::Resource(target) => collect(target),
                    Value::Batch(batch) => batch.members().iter().for_each(&mut collect),
                    _ => {}
                }
            }
        }

        for (rtype, members) in related.into_values() {
            rtype.save_many(&members, depth - 1)?;
        }
        Ok(())
    }

    /// Delete created resources with one store call
    pub fn delete_many(&self, resources: &[Resource]) -> Result<()> {
        check_type(self, resources)?;
        let ids: Vec<String> = resources.iter().filter_map(Resource::created_id).collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.store().delete_many(&ids)?;
        for resource in resources {
            if resource.is_created() {
                resource.forget_identity();
            }
        }

        self.registry()
            .metrics_registry()
            .add_resources_deleted(ids.len() as u64);
        log_event_with_fields(
            Event::ResourcesDeleted,
            &[("type", self.name()), ("count", ids.len().to_string().as_str())],
        );
        Ok(())
    }

    /// Remove every stored resource of this type
    pub fn delete_all(&self) -> Result<()> {
        Ok(self.store().delete_all()?)
    }

    // ==================
    // Fixtures
    // ==================

    /// Uncreated resource with every field generated
    pub fn generate(&self) -> Result<Resource> {
        self.generate_with(&Constraints::new())
    }

    /// Uncreated resource whose fields satisfy `constraints`
    pub fn generate_with(&self, constraints: &Constraints) -> Result<Resource> {
        let resource = Resource::new(self);
        for field in self.schema().fields() {
            if field.name() == REV_FIELD {
                continue;
            }
            let constraint = constraints.get(field.name());
            if field.name() == ID_FIELD && constraint.is_none() {
                let id = self.registry().with_rng(crate::schema::random_hex);
                resource.set(ID_FIELD, Json::String(id))?;
                continue;
            }
            let value = self
                .registry()
                .with_rng(|rng| field.generate(rng, constraint));
            resource.set(field.name(), value)?;
        }
        Ok(resource)
    }

    /// `count` generated resources
    pub fn generate_many(&self, count: usize, constraints: &Constraints) -> Result<Vec<Resource>> {
        (0..count).map(|_| self.generate_with(constraints)).collect()
    }

    /// Random fixture count in `1..=backfill_max`
    pub(crate) fn fixture_count(&self) -> usize {
        let max = self.config().backfill_max.max(1) as usize;
        self.registry().with_rng(|rng| rng.gen_range(1..=max))
    }
}
