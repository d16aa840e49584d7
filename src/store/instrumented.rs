//! Observed store
//!
//! The registry wraps every bound store so each call is counted and
//! traced without the backend knowing.

use std::collections::HashMap;
use std::sync::Arc;

use super::errors::StoreResult;
use super::history::StoreMethod;
use super::store::{Fields, Record, Store};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::predicate::Predicate;
use crate::query::OrderBy;

pub(crate) struct Instrumented {
    inner: Arc<dyn Store>,
    type_name: String,
    metrics: Arc<MetricsRegistry>,
}

impl Instrumented {
    pub(crate) fn new(inner: Arc<dyn Store>, type_name: impl Into<String>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            inner,
            type_name: type_name.into(),
            metrics,
        }
    }

    fn observe(&self, method: StoreMethod) {
        self.metrics.increment_store_calls();
        log_event_with_fields(
            Event::StoreCall,
            &[("type", self.type_name.as_str()), ("method", method.as_str())],
        );
    }
}

impl Store for Instrumented {
    fn exists(&self, id: &str) -> StoreResult<bool> {
        self.observe(StoreMethod::Exists);
        self.inner.exists(id)
    }

    fn exists_many(&self, ids: &[String]) -> StoreResult<HashMap<String, bool>> {
        self.observe(StoreMethod::ExistsMany);
        self.inner.exists_many(ids)
    }

    fn count(&self) -> StoreResult<usize> {
        self.observe(StoreMethod::Count);
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
        self.observe(StoreMethod::Query);
        self.inner.query(predicate, fields, order_by, limit, offset)
    }

    fn fetch(&self, id: &str, fields: Fields<'_>) -> StoreResult<Option<Record>> {
        self.observe(StoreMethod::Fetch);
        self.inner.fetch(id, fields)
    }

    fn fetch_many(&self, ids: &[String], fields: Fields<'_>) -> StoreResult<HashMap<String, Record>> {
        self.observe(StoreMethod::FetchMany);
        self.inner.fetch_many(ids, fields)
    }

    fn fetch_all(&self, fields: Fields<'_>) -> StoreResult<Vec<Record>> {
        self.observe(StoreMethod::FetchAll);
        self.inner.fetch_all(fields)
    }

    fn create(&self, record: Record) -> StoreResult<Record> {
        self.observe(StoreMethod::Create);
        self.inner.create(record)
    }

    fn create_many(&self, records: Vec<Record>) -> StoreResult<Vec<Record>> {
        self.observe(StoreMethod::CreateMany);
        self.inner.create_many(records)
    }

    fn update(&self, id: &str, data: Record) -> StoreResult<Record> {
        self.observe(StoreMethod::Update);
        self.inner.update(id, data)
    }

    fn update_many(&self, ids: &[String], data: Vec<Record>) -> StoreResult<HashMap<String, Record>> {
        self.observe(StoreMethod::UpdateMany);
        self.inner.update_many(ids, data)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        self.observe(StoreMethod::Delete);
        self.inner.delete(id)
    }

    fn delete_many(&self, ids: &[String]) -> StoreResult<()> {
        self.observe(StoreMethod::DeleteMany);
        self.inner.delete_many(ids)
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.observe(StoreMethod::DeleteAll);
        self.inner.delete_all()
    }
}
