//! In-memory store
//!
//! Records live in a `BTreeMap` behind an `RwLock`. Query results come
//! back in insertion order unless an ordering is requested. Revisions are
//! a per-store monotonic counter.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value as Json;

use super::errors::{StoreError, StoreResult};
use super::store::{record_id, Fields, Record, Store};
use crate::predicate::{Predicate, PredicateFilter};
use crate::query::{sort_records, OrderBy};
use crate::schema::{ID_FIELD, REV_FIELD};

#[derive(Debug)]
struct Entry {
    seq: u64,
    record: Record,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, Entry>,
    next_seq: u64,
    next_rev: u64,
}

impl MemoryState {
    fn bump_rev(&mut self) -> Json {
        self.next_rev += 1;
        Json::String(self.next_rev.to_string())
    }

    fn insert(&mut self, mut record: Record) -> StoreResult<Record> {
        let id = match record_id(&record) {
            Some(id) => id.to_string(),
            None if record.get(ID_FIELD).map_or(true, Json::is_null) => {
                uuid::Uuid::new_v4().simple().to_string()
            }
            None => return Err(StoreError::invalid_record("_id must be a string")),
        };
        if self.records.contains_key(&id) {
            return Err(StoreError::already_exists(id));
        }
        record.insert(ID_FIELD.to_string(), Json::String(id.clone()));
        record.insert(REV_FIELD.to_string(), self.bump_rev());

        self.next_seq += 1;
        let entry = Entry {
            seq: self.next_seq,
            record: record.clone(),
        };
        self.records.insert(id, entry);
        Ok(record)
    }

    fn merge(&mut self, id: &str, data: Record) -> StoreResult<Record> {
        let rev = self.bump_rev();
        let entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(id))?;
        for (key, value) in data {
            if key != ID_FIELD && key != REV_FIELD {
                entry.record.insert(key, value);
            }
        }
        entry.record.insert(REV_FIELD.to_string(), rev);
        Ok(entry.record.clone())
    }
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

/// Keep only requested fields (plus `_id` and `_rev`)
fn project(record: &Record, fields: Fields<'_>) -> Record {
    match fields {
        None => record.clone(),
        Some(fields) => record
            .iter()
            .filter(|(k, _)| fields.contains(*k) || *k == ID_FIELD || *k == REV_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

impl Store for MemoryStore {
    fn exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.read()?.records.contains_key(id))
    }

    fn exists_many(&self, ids: &[String]) -> StoreResult<HashMap<String, bool>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .map(|id| (id.clone(), state.records.contains_key(id)))
            .collect())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.read()?.records.len())
    }

    fn query(
        &self,
        predicate: &Predicate,
        fields: Fields<'_>,
        order_by: &[OrderBy],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        let state = self.read()?;
        let mut matched: Vec<&Entry> = state
            .records
            .values()
            .filter(|e| PredicateFilter::matches(&e.record, predicate))
            .collect();
        matched.sort_by_key(|e| e.seq);

        let mut records: Vec<Record> = matched.into_iter().map(|e| e.record.clone()).collect();
        sort_records(&mut records, order_by);

        Ok(records
            .iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .map(|r| project(r, fields))
            .collect())
    }

    fn fetch(&self, id: &str, fields: Fields<'_>) -> StoreResult<Option<Record>> {
        Ok(self
            .read()?
            .records
            .get(id)
            .map(|e| project(&e.record, fields)))
    }

    fn fetch_many(&self, ids: &[String], fields: Fields<'_>) -> StoreResult<HashMap<String, Record>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                state
                    .records
                    .get(id)
                    .map(|e| (id.clone(), project(&e.record, fields)))
            })
            .collect())
    }

    fn fetch_all(&self, fields: Fields<'_>) -> StoreResult<Vec<Record>> {
        let state = self.read()?;
        let mut entries: Vec<&Entry> = state.records.values().collect();
        entries.sort_by_key(|e| e.seq);
        Ok(entries.iter().map(|e| project(&e.record, fields)).collect())
    }

    fn create(&self, record: Record) -> StoreResult<Record> {
        self.write()?.insert(record)
    }

    fn create_many(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        let mut state = self.write()?;
        // reject the whole batch before writing anything
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            if let Some(id) = record_id(record) {
                if state.records.contains_key(id) || !seen.insert(id.to_string()) {
                    return Err(StoreError::already_exists(id));
                }
            }
        }
        records.into_iter().map(|r| state.insert(r)).collect()
    }

    fn update(&self, id: &str, data: Record) -> StoreResult<Record> {
        self.write()?.merge(id, data)
    }

    fn update_many(&self, ids: &[String], data: Vec<Record>) -> StoreResult<HashMap<String, Record>> {
        if ids.len() != data.len() {
            return Err(StoreError::invalid_record(format!(
                "{} ids for {} records",
                ids.len(),
                data.len()
            )));
        }
        let mut state = self.write()?;
        if let Some(missing) = ids.iter().find(|id| !state.records.contains_key(*id)) {
            return Err(StoreError::not_found(missing.as_str()));
        }
        ids.iter()
            .zip(data)
            .map(|(id, record)| Ok((id.clone(), state.merge(id, record)?)))
            .collect()
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        self.write()?
            .records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(id))
    }

    fn delete_many(&self, ids: &[String]) -> StoreResult<()> {
        let mut state = self.write()?;
        for id in ids {
            state.records.remove(id);
        }
        Ok(())
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.write()?.records.clear();
        Ok(())
    }
}
