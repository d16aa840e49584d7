//! Relationship resolution
//!
//! A relationship is resolved for a whole set of owners at once: each hop
//! issues one query covering every distinct join key, and results are
//! grouped back onto the owners they are reachable from. Paging applies
//! per owner after grouping.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde_json::Value as Json;

use super::resolver::{Join, Resolver};
use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::index::IndexKey;
use crate::observability::{log_event_with_fields, Event};
use crate::predicate::Predicate;
use crate::query::{Query, Request};
use crate::resource::{Resource, ResourceType};
use crate::value::Value;

/// Join keys never match null
fn key_of(value: &Json) -> Option<IndexKey> {
    match IndexKey::from_json(value)? {
        IndexKey::Null => None,
        key => Some(key),
    }
}

fn group_by(members: &[Resource], field: &str) -> BTreeMap<IndexKey, Vec<Resource>> {
    let mut grouped: BTreeMap<IndexKey, Vec<Resource>> = BTreeMap::new();
    for member in members {
        if let Some(key) = key_of(&member.peek_json(field)) {
            grouped.entry(key).or_default().push(member.clone());
        }
    }
    grouped
}

fn empty(resolver: &Resolver, target: &ResourceType) -> Value {
    if resolver.is_many() {
        Value::Batch(Batch::new(target))
    } else {
        Value::Null
    }
}

fn hop_predicate(join: &Join, values: Vec<Json>) -> Predicate {
    let predicate = match <[Json; 1]>::try_from(values) {
        Ok([single]) => Predicate::eq(join.target_field.clone(), single),
        Err(values) => Predicate::including(join.target_field.clone(), values),
    };
    match &join.predicate {
        Some(extra) => predicate & extra.clone(),
        None => predicate,
    }
}

/// Resolve `joins` for every owner; the result is aligned with `owners`
pub(crate) fn resolve(
    resolver: &Resolver,
    joins: &[Join],
    owners: &[Resource],
    request: &Request,
) -> Result<Vec<Value>> {
    let (Some(first), Some(last_join)) = (owners.first(), joins.last()) else {
        return Ok(Vec::new());
    };
    let rtype = first.resource_type();
    let registry = rtype.registry().clone();
    let target = registry.type_by_id(last_join.target_id()?);

    let source = joins[0].source.as_str();
    let unloaded: Vec<Resource> = owners
        .iter()
        .filter(|o| !o.is_loaded(source))
        .cloned()
        .collect();
    if !unloaded.is_empty() {
        super::field::load_many(&rtype, &unloaded)?;
    }

    let mut key_values: BTreeMap<IndexKey, Json> = BTreeMap::new();
    let mut frontiers: Vec<BTreeSet<IndexKey>> = owners
        .iter()
        .map(|owner| {
            let value = owner.peek_json(source);
            let key = key_of(&value);
            if let Some(key) = &key {
                key_values.entry(key.clone()).or_insert(value);
            }
            key.into_iter().collect()
        })
        .collect();

    let last = joins.len() - 1;
    for (hop, join) in joins.iter().enumerate() {
        if key_values.is_empty() {
            return Ok(owners.iter().map(|_| empty(resolver, &target)).collect());
        }
        let hop_type = registry.type_by_id(join.target_id()?);
        let predicate = hop_predicate(join, key_values.values().cloned().collect());

        if hop < last {
            let next_source = joins[hop + 1].source.as_str();
            let batch = Query::unbounded(&hop_type)
                .eager(false)
                .select([join.target_field.as_str(), next_source])?
                .where_(predicate)?
                .execute()?;
            let grouped = group_by(&batch.members(), &join.target_field);

            key_values.clear();
            frontiers = frontiers
                .iter()
                .map(|frontier| {
                    let mut next = BTreeSet::new();
                    for member in frontier.iter().filter_map(|k| grouped.get(k)).flatten() {
                        let value = member.peek_json(next_source);
                        if let Some(key) = key_of(&value) {
                            key_values.entry(key.clone()).or_insert(value);
                            next.insert(key);
                        }
                    }
                    next
                })
                .collect();
            continue;
        }

        let base = match request.query() {
            Some(query) if query.target().id() != hop_type.id() => {
                return Err(Error::TypeMismatch {
                    expected: hop_type.name().to_string(),
                    actual: query.target().name().to_string(),
                });
            }
            Some(query) => query.clone(),
            None => Query::unbounded(&hop_type),
        };
        let (query, limit, offset) = base.without_paging();
        let batch = query
            .select([join.target_field.as_str()])?
            .where_(predicate)?
            .execute()?;
        let members = batch.members();
        let grouped = group_by(&members, &join.target_field);

        log_event_with_fields(
            Event::RelationshipBatchResolved,
            &[
                ("type", rtype.name()),
                ("resolver", resolver.name()),
                ("owners", owners.len().to_string().as_str()),
                ("targets", members.len().to_string().as_str()),
            ],
        );

        let mut values = Vec::with_capacity(owners.len());
        for frontier in &frontiers {
            let reachable: HashSet<u64> = frontier
                .iter()
                .filter_map(|k| grouped.get(k))
                .flatten()
                .map(Resource::serial)
                .collect();
            let mine: Vec<Resource> = members
                .iter()
                .filter(|m| reachable.contains(&m.serial()))
                .skip(offset.unwrap_or(0))
                .take(limit.unwrap_or(usize::MAX))
                .cloned()
                .collect();
            values.push(if resolver.is_many() {
                Value::Batch(Batch::with_members(&target, mine)?)
            } else {
                mine.into_iter().next().map(Value::Resource).unwrap_or_default()
            });
        }
        return Ok(values);
    }

    Ok(owners.iter().map(|_| empty(resolver, &target)).collect())
}
