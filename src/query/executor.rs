//! Query execution
//!
//! # Execution Flow (strict order)
//!
//! 1. Default the filter to `_id != null`
//! 2. Collect the eager field projection (always `_id` and `_rev`)
//! 3. One `Store::query` call, or generated fixtures in simulation mode
//! 4. Wrap records as clean resources in a new batch
//! 5. Backfill, if requested
//! 6. Run requested resolvers across the whole batch, in priority order
//! 7. Rebuild the batch indexes of the fields those resolvers loaded
//!
//! A relationship request therefore costs one store query per hop no matter
//! how many resources the batch holds.

use std::collections::BTreeSet;

use super::backfill::backfill;
use super::query::Query;
use crate::batch::Batch;
use crate::error::Result;
use crate::observability::{log_event_with_fields, Event};
use crate::predicate::{Constraints, Predicate};
use crate::resolver::Resolver;
use crate::resource::{Resource, ResourceType};
use crate::schema::{ID_FIELD, REV_FIELD};
use serde_json::Value as Json;

/// Fields the store should return
fn projection(query: &Query) -> BTreeSet<String> {
    let target = query.target();
    let mut fields = query.fields().clone();
    fields.insert(ID_FIELD.to_string());
    fields.insert(REV_FIELD.to_string());
    if query.is_eager() {
        fields.extend(
            target
                .schema()
                .fields()
                .iter()
                .filter(|f| !f.is_lazy())
                .map(|f| f.name().to_string()),
        );
    }
    fields
}

fn simulate(query: &Query, predicate: &Predicate) -> Result<Vec<Resource>> {
    let target = query.target();
    let count = query.get_limit().unwrap_or_else(|| target.fixture_count());
    let constraints = match query.predicate() {
        Some(_) => predicate.constraints(),
        None => Constraints::new(),
    };
    let members = target.generate_many(count, &constraints)?;
    for member in &members {
        member.clean();
    }
    log_event_with_fields(
        Event::QuerySimulated,
        &[("type", target.name()), ("count", count.to_string().as_str())],
    );
    Ok(members)
}

fn fetch(query: &Query, target: &ResourceType, predicate: &Predicate) -> Result<Vec<Resource>> {
    let fields = projection(query);
    let records = target.store().query(
        predicate,
        Some(&fields),
        query.ordering(),
        query.get_limit(),
        query.get_offset(),
    )?;
    Ok(records
        .into_iter()
        .map(|record| Resource::from_record(target, record))
        .collect())
}

pub(crate) fn execute(query: &Query) -> Result<Batch> {
    let target = query.target();
    let predicate = query
        .predicate()
        .cloned()
        .unwrap_or_else(|| Predicate::neq(ID_FIELD, Json::Null));

    let batch = if target.config().is_simulation() {
        let batch = Batch::with_members(target, simulate(query, &predicate)?)?;
        batch.sort(query.ordering());
        batch
    } else {
        Batch::with_members(target, fetch(query, target, &predicate)?)?
    };

    if let Some(mode) = query.backfill_mode() {
        backfill(query, mode, &batch)?;
    }

    let members = batch.members();
    if !members.is_empty() {
        let resolvers: Vec<&Resolver> = query
            .requests()
            .keys()
            .map(|name| target.resolver(name))
            .collect::<Result<_>>()?;
        for resolver in Resolver::sort(resolvers) {
            if let Some(request) = query.requests().get(resolver.name()) {
                resolver.execute_batch(&members, request)?;
            }
        }
        batch.refresh_indexes(query.requests().keys());
    }

    target.registry().metrics_registry().increment_queries_executed();
    log_event_with_fields(
        Event::QueryExecuted,
        &[("type", target.name()), ("rows", batch.len().to_string().as_str())],
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, ResourceDef};
    use crate::schema::Field;

    fn dog_type() -> ResourceType {
        let registry = Registry::builder()
            .define(
                ResourceDef::new("Dog")
                    .field(Field::string("name"))
                    .field(Field::string("bio").lazy()),
            )
            .build()
            .unwrap();
        registry.resource_type("Dog").unwrap()
    }

    #[test]
    fn test_projection_skips_lazy_fields() {
        let dog = dog_type();
        let fields = projection(&dog.query());
        assert!(fields.contains("_id"));
        assert!(fields.contains("_rev"));
        assert!(fields.contains("name"));
        assert!(!fields.contains("bio"));
    }

    #[test]
    fn test_projection_without_eager_loading() {
        let dog = dog_type();
        let query = dog.query().eager(false).select(["bio"]).unwrap();
        let fields = projection(&query);
        assert_eq!(
            fields.into_iter().collect::<Vec<_>>(),
            vec!["_id".to_string(), "_rev".to_string(), "bio".to_string()]
        );
    }
}
