//! Storage contract
//!
//! Every backend offers the same CRUD surface over string-keyed records.
//! `_id` and `_rev` are fixed field names across all stores; `_rev` is
//! assigned by the store on every write.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value as Json};

use super::errors::{StoreError, StoreResult};
use crate::predicate::Predicate;
use crate::query::OrderBy;
use crate::schema::ID_FIELD;

/// One stored record
pub type Record = Map<String, Json>;

/// Field projection; `None` means every field
pub type Fields<'a> = Option<&'a BTreeSet<String>>;

/// Storage backend
///
/// Stores are shared across threads and guard their own data. The `*_many`
/// defaults fall back to single-record calls; backends should override
/// them when they can do better.
pub trait Store: Send + Sync {
    fn exists(&self, id: &str) -> StoreResult<bool>;

    fn exists_many(&self, ids: &[String]) -> StoreResult<HashMap<String, bool>> {
        ids.iter()
            .map(|id| Ok((id.clone(), self.exists(id)?)))
            .collect()
    }

    fn count(&self) -> StoreResult<usize>;

    /// Records matching `predicate`, ordered, then paged
    fn query(
        &self,
        predicate: &Predicate,
        fields: Fields<'_>,
        order_by: &[OrderBy],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> StoreResult<Vec<Record>>;

    fn fetch(&self, id: &str, fields: Fields<'_>) -> StoreResult<Option<Record>>;

    /// Records by id; missing ids are absent from the map
    fn fetch_many(&self, ids: &[String], fields: Fields<'_>) -> StoreResult<HashMap<String, Record>> {
        let mut out = HashMap::new();
        for id in ids {
            if let Some(record) = self.fetch(id, fields)? {
                out.insert(id.clone(), record);
            }
        }
        Ok(out)
    }

    fn fetch_all(&self, fields: Fields<'_>) -> StoreResult<Vec<Record>>;

    /// Insert a record, returning it as stored (with `_rev`)
    fn create(&self, record: Record) -> StoreResult<Record>;

    fn create_many(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        records.into_iter().map(|r| self.create(r)).collect()
    }

    /// Merge `data` into an existing record, returning the full record
    fn update(&self, id: &str, data: Record) -> StoreResult<Record>;

    /// `data[i]` is merged into record `ids[i]`
    fn update_many(&self, ids: &[String], data: Vec<Record>) -> StoreResult<HashMap<String, Record>> {
        if ids.len() != data.len() {
            return Err(StoreError::invalid_record(format!(
                "{} ids for {} records",
                ids.len(),
                data.len()
            )));
        }
        ids.iter()
            .zip(data)
            .map(|(id, record)| Ok((id.clone(), self.update(id, record)?)))
            .collect()
    }

    fn delete(&self, id: &str) -> StoreResult<()>;

    fn delete_many(&self, ids: &[String]) -> StoreResult<()> {
        for id in ids {
            match self.delete(id) {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn delete_all(&self) -> StoreResult<()>;
}

/// The `_id` of a record, if it has a string one
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Json::as_str)
}
