//! Store call history
//!
//! `RecordingStore` wraps any store and records every call it forwards.
//! Tests use it to count storage round trips; the recorded writes can be
//! replayed into another store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use super::errors::{StoreError, StoreResult};
use super::store::{record_id, Fields, Record, Store};
use crate::predicate::Predicate;
use crate::query::OrderBy;

/// Store trait methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreMethod {
    Exists,
    ExistsMany,
    Count,
    Query,
    Fetch,
    FetchMany,
    FetchAll,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Delete,
    DeleteMany,
    DeleteAll,
}

impl StoreMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMethod::Exists => "exists",
            StoreMethod::ExistsMany => "exists_many",
            StoreMethod::Count => "count",
            StoreMethod::Query => "query",
            StoreMethod::Fetch => "fetch",
            StoreMethod::FetchMany => "fetch_many",
            StoreMethod::FetchAll => "fetch_all",
            StoreMethod::Create => "create",
            StoreMethod::CreateMany => "create_many",
            StoreMethod::Update => "update",
            StoreMethod::UpdateMany => "update_many",
            StoreMethod::Delete => "delete",
            StoreMethod::DeleteMany => "delete_many",
            StoreMethod::DeleteAll => "delete_all",
        }
    }

    /// Whether the method mutates the store
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreMethod::Create
                | StoreMethod::CreateMany
                | StoreMethod::Update
                | StoreMethod::UpdateMany
                | StoreMethod::Delete
                | StoreMethod::DeleteMany
                | StoreMethod::DeleteAll
        )
    }
}

impl fmt::Display for StoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One forwarded call
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub method: StoreMethod,
    /// Ids the call addressed (or produced, for creates)
    pub ids: Vec<String>,
    /// Payloads for writes, as stored
    pub records: Vec<Record>,
}

impl StoreEvent {
    fn new(method: StoreMethod) -> Self {
        Self {
            method,
            ids: Vec::new(),
            records: Vec::new(),
        }
    }

    fn with_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }

    fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }
}

/// Ordered log of store calls
#[derive(Debug, Clone, Default)]
pub struct StoreHistory {
    events: Vec<StoreEvent>,
}

impl StoreHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: StoreEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[StoreEvent] {
        &self.events
    }

    /// Number of calls to `method`
    pub fn count(&self, method: StoreMethod) -> usize {
        self.events.iter().filter(|e| e.method == method).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Write events only, in call order
    pub fn writes(&self) -> impl Iterator<Item = &StoreEvent> {
        self.events.iter().filter(|e| e.method.is_write())
    }

    /// Re-apply recorded writes to `target`
    pub fn replay(&self, target: &dyn Store) -> StoreResult<()> {
        for event in self.writes() {
            match event.method {
                StoreMethod::Create | StoreMethod::CreateMany => {
                    target.create_many(event.records.clone())?;
                }
                StoreMethod::Update | StoreMethod::UpdateMany => {
                    target.update_many(&event.ids, event.records.clone())?;
                }
                StoreMethod::Delete | StoreMethod::DeleteMany => {
                    target.delete_many(&event.ids)?;
                }
                StoreMethod::DeleteAll => target.delete_all()?,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Store wrapper that records every call
pub struct RecordingStore<S> {
    inner: S,
    history: Mutex<StoreHistory>,
}

impl<S: Store> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            history: Mutex::new(StoreHistory::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Snapshot of the history so far
    pub fn history(&self) -> StoreHistory {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Number of calls to `method` so far
    pub fn calls(&self, method: StoreMethod) -> usize {
        self.history.lock().map_or(0, |h| h.count(method))
    }

    pub fn clear(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }

    fn record(&self, event: StoreEvent) -> StoreResult<()> {
        self.history
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push(event);
        Ok(())
    }
}

impl<S> fmt::Debug for RecordingStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.history.lock().map_or(0, |h| h.len());
        f.debug_struct("RecordingStore").field("events", &len).finish()
    }
}

impl<S: Store> Store for RecordingStore<S> {
    fn exists(&self, id: &str) -> StoreResult<bool> {
        self.record(StoreEvent::new(StoreMethod::Exists).with_ids([id.to_string()]))?;
        self.inner.exists(id)
    }

    fn exists_many(&self, ids: &[String]) -> StoreResult<HashMap<String, bool>> {
        self.record(StoreEvent::new(StoreMethod::ExistsMany).with_ids(ids.iter().cloned()))?;
        self.inner.exists_many(ids)
    }

    fn count(&self) -> StoreResult<usize> {
        self.record(StoreEvent::new(StoreMethod::Count))?;
        self.inner.count()
    }

    fn query(
        &self,
        predicate: &Predicate,
        fields: Fields<'_>,
        order_by: &[OrderBy],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> StoreResult<Vec<Record>> {
        let records = self.inner.query(predicate, fields, order_by, limit, offset)?;
        let ids = records.iter().filter_map(record_id).map(str::to_string);
        self.record(StoreEvent::new(StoreMethod::Query).with_ids(ids))?;
        Ok(records)
    }

    fn fetch(&self, id: &str, fields: Fields<'_>) -> StoreResult<Option<Record>> {
        self.record(StoreEvent::new(StoreMethod::Fetch).with_ids([id.to_string()]))?;
        self.inner.fetch(id, fields)
    }

    fn fetch_many(&self, ids: &[String], fields: Fields<'_>) -> StoreResult<HashMap<String, Record>> {
        self.record(StoreEvent::new(StoreMethod::FetchMany).with_ids(ids.iter().cloned()))?;
        self.inner.fetch_many(ids, fields)
    }

    fn fetch_all(&self, fields: Fields<'_>) -> StoreResult<Vec<Record>> {
        self.record(StoreEvent::new(StoreMethod::FetchAll))?;
        self.inner.fetch_all(fields)
    }

    fn create(&self, record: Record) -> StoreResult<Record> {
        let created = self.inner.create(record)?;
        let ids = record_id(&created).map(str::to_string);
        self.record(
            StoreEvent::new(StoreMethod::Create)
                .with_ids(ids)
                .with_records(vec![created.clone()]),
        )?;
        Ok(created)
    }

    fn create_many(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        let created = self.inner.create_many(records)?;
        let ids: Vec<String> = created.iter().filter_map(record_id).map(str::to_string).collect();
        self.record(
            StoreEvent::new(StoreMethod::CreateMany)
                .with_ids(ids)
                .with_records(created.clone()),
        )?;
        Ok(created)
    }

    fn update(&self, id: &str, data: Record) -> StoreResult<Record> {
        let updated = self.inner.update(id, data.clone())?;
        self.record(
            StoreEvent::new(StoreMethod::Update)
                .with_ids([id.to_string()])
                .with_records(vec![data]),
        )?;
        Ok(updated)
    }

    fn update_many(&self, ids: &[String], data: Vec<Record>) -> StoreResult<HashMap<String, Record>> {
        let updated = self.inner.update_many(ids, data.clone())?;
        self.record(
            StoreEvent::new(StoreMethod::UpdateMany)
                .with_ids(ids.iter().cloned())
                .with_records(data),
        )?;
        Ok(updated)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        self.inner.delete(id)?;
        self.record(StoreEvent::new(StoreMethod::Delete).with_ids([id.to_string()]))
    }

    fn delete_many(&self, ids: &[String]) -> StoreResult<()> {
        self.inner.delete_many(ids)?;
        self.record(StoreEvent::new(StoreMethod::DeleteMany).with_ids(ids.iter().cloned()))
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.inner.delete_all()?;
        self.record(StoreEvent::new(StoreMethod::DeleteAll))
    }
}
