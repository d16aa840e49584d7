//! Field loading
//!
//! Reading one unloaded field fetches every unloaded schema field of the
//! owner in the same call. Batch loading issues one `fetch_many` for all
//! created owners.

use std::collections::BTreeSet;

use serde_json::Value as Json;

use crate::error::Result;
use crate::resource::{Resource, ResourceType};
use crate::value::Value;

/// Load all missing schema fields of one owner with a single fetch
pub(crate) fn load_one(owner: &Resource) -> Result<()> {
    let Some(id) = owner.created_id() else {
        return Ok(());
    };
    let missing = owner.missing_fields();
    if missing.is_empty() {
        return Ok(());
    }
    let rtype = owner.resource_type();
    let record = rtype.store().fetch(&id, Some(&missing))?;
    fill(owner, &missing, record.as_ref());
    Ok(())
}

/// Load missing schema fields for many owners with a single fetch
pub(crate) fn load_many(rtype: &ResourceType, owners: &[Resource]) -> Result<()> {
    let mut wanted: BTreeSet<String> = BTreeSet::new();
    let mut pending: Vec<(String, &Resource, BTreeSet<String>)> = Vec::new();
    for owner in owners {
        let Some(id) = owner.created_id() else {
            continue;
        };
        let missing = owner.missing_fields();
        if missing.is_empty() {
            continue;
        }
        wanted.extend(missing.iter().cloned());
        pending.push((id, owner, missing));
    }
    if pending.is_empty() {
        return Ok(());
    }

    let ids: Vec<String> = pending.iter().map(|(id, _, _)| id.clone()).collect();
    let records = rtype.store().fetch_many(&ids, Some(&wanted))?;
    for (id, owner, missing) in &pending {
        fill(owner, missing, records.get(id));
    }
    Ok(())
}

/// Merge fetched values clean; fields the store lacks are cached as null
fn fill(owner: &Resource, missing: &BTreeSet<String>, record: Option<&serde_json::Map<String, Json>>) {
    for name in missing {
        let value = record
            .and_then(|r| r.get(name))
            .cloned()
            .map(Value::from_json)
            .unwrap_or_default();
        owner.insert_clean(name, value);
    }
}
