//! Query builder
//!
//! A [`Query`] is bound to one target type. Field selections go to an
//! eager bucket loaded by the single store query; everything else becomes
//! a [`Request`] executed across the result batch afterwards. Names are
//! checked as they are added, so a bad selector fails at build time rather
//! than during execution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value as Json;

use super::backfill::Backfill;
use super::executor;
use super::order_by::OrderBy;
use super::request::{Params, Request};
use crate::batch::Batch;
use crate::error::{Error, Result};
use crate::predicate::{parse_for, Predicate};
use crate::resource::{Resource, ResourceType};

/// Anything `select` accepts
#[derive(Debug, Clone)]
pub enum Selector {
    Name(String),
    Request(Request),
    /// Nested query; its alias names the relationship it shapes
    Query(Query),
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<&String> for Selector {
    fn from(name: &String) -> Self {
        Selector::Name(name.clone())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl From<Request> for Selector {
    fn from(request: Request) -> Self {
        Selector::Request(request)
    }
}

impl From<Query> for Selector {
    fn from(query: Query) -> Self {
        Selector::Query(query)
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) target: ResourceType,
    pub(crate) alias: Option<String>,
    pub(crate) fields: BTreeSet<String>,
    pub(crate) requests: BTreeMap<String, Request>,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: Option<usize>,
    pub(crate) params: Params,
    pub(crate) eager: bool,
    pub(crate) backfill: Option<Backfill>,
}

impl Query {
    /// Query over `target`, with the configured default limit
    pub fn new(target: &ResourceType) -> Self {
        let mut query = Self::unbounded(target);
        query.limit = target.config().default_limit.map(|l| l as usize);
        query
    }

    /// Query without any default limit, for internal lookups
    pub(crate) fn unbounded(target: &ResourceType) -> Self {
        Self {
            target: target.clone(),
            alias: None,
            fields: BTreeSet::new(),
            requests: BTreeMap::new(),
            predicate: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            params: Params::new(),
            eager: true,
            backfill: None,
        }
    }

    // ==================
    // Builder
    // ==================

    /// Add selections; field names load eagerly, other resolvers afterwards
    pub fn select<I, S>(mut self, selectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Selector>,
    {
        for selector in selectors {
            match selector.into() {
                Selector::Name(name) if name == "*" => {
                    let names: Vec<String> = self.target.schema().names().map(str::to_string).collect();
                    self.fields.extend(names);
                }
                Selector::Name(name) => self.add_request(Request::new(name))?,
                Selector::Request(request) => self.add_request(request)?,
                Selector::Query(query) => {
                    let alias = query.alias.clone().ok_or_else(|| {
                        Error::unsupported(format!(
                            "nested query on {} needs an alias naming a relationship of {}",
                            query.target.name(),
                            self.target.name()
                        ))
                    })?;
                    self.add_request(Request::new(alias).with_query(query))?;
                }
            }
        }
        Ok(self)
    }

    fn add_request(&mut self, request: Request) -> Result<()> {
        let resolver = self.target.resolver(request.name())?;
        if resolver.is_field() {
            self.fields.insert(request.name().to_string());
            return Ok(());
        }
        if let Some(query) = request.query() {
            let expected = self.target.resolver_target(request.name())?;
            if query.target != expected {
                return Err(Error::TypeMismatch {
                    expected: expected.name().to_string(),
                    actual: query.target.name().to_string(),
                });
            }
        }
        self.requests.insert(request.name().to_string(), request);
        Ok(())
    }

    /// Drop selections; `_id` and `_rev` always load
    pub fn deselect<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.fields.remove(name.as_ref());
            self.requests.remove(name.as_ref());
        }
        self
    }

    /// AND `predicate` into the filter
    pub fn where_(mut self, predicate: Predicate) -> Result<Self> {
        predicate.validate(&self.target)?;
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing & predicate,
            None => predicate,
        });
        Ok(self)
    }

    /// AND several predicates into the filter
    pub fn where_all<I>(self, predicates: I) -> Result<Self>
    where
        I: IntoIterator<Item = Predicate>,
    {
        match Predicate::reduce_and(predicates) {
            Some(predicate) => self.where_(predicate),
            None => Ok(self),
        }
    }

    /// Equality shorthand
    pub fn where_eq(self, field: &str, value: impl Into<Json>) -> Result<Self> {
        self.where_(Predicate::eq(field, value))
    }

    /// AND a textual predicate into the filter
    pub fn where_str(self, text: &str) -> Result<Self> {
        let predicate = parse_for(&self.target, text)?;
        self.where_(predicate)
    }

    /// Append sort keys; each must be a field
    pub fn order_by<I>(mut self, orders: I) -> Result<Self>
    where
        I: IntoIterator<Item = OrderBy>,
    {
        for order in orders {
            self.target.field_resolver(&order.key)?;
            self.order_by.push(order);
        }
        Ok(self)
    }

    /// Append sort keys written as `"age desc, name"`
    pub fn order_by_str(self, spec: &str) -> Result<Self> {
        let orders = OrderBy::parse_list(spec)?;
        self.order_by(orders)
    }

    /// At most `limit` results; values below 1 become 1
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(1) as usize);
        self
    }

    /// Skip `offset` results; negative values become 0
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset.max(0) as usize);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Json>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Whether non-lazy fields load without being selected (default true)
    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Pad short results with generated resources
    pub fn backfill(mut self, mode: Backfill) -> Self {
        self.backfill = Some(mode);
        self
    }

    /// Fold a request into this query: its parameters, and its nested
    /// query's selections, filter, ordering and paging
    pub fn merge(mut self, request: Request) -> Result<Self> {
        self.params
            .extend(request.params().iter().map(|(k, v)| (k.clone(), v.clone())));
        let Some(other) = request.query() else {
            return Ok(self);
        };
        if other.target != self.target {
            return Err(Error::TypeMismatch {
                expected: self.target.name().to_string(),
                actual: other.target.name().to_string(),
            });
        }
        self.fields.extend(other.fields.iter().cloned());
        for (name, nested) in &other.requests {
            self.requests.insert(name.clone(), nested.clone());
        }
        if let Some(predicate) = &other.predicate {
            self = self.where_(predicate.clone())?;
        }
        self.order_by.extend(other.order_by.iter().cloned());
        self.limit = other.limit.or(self.limit);
        self.offset = other.offset.or(self.offset);
        self.params
            .extend(other.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.backfill = other.backfill.or(self.backfill);
        Ok(self)
    }

    /// Query selecting dotted key paths such as `crew.name`; `*` selects
    /// every field at its level
    pub fn from_keys<I, S>(target: &ResourceType, keys: I) -> Result<Query>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut query = Query::new(target);
        let mut nested: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in keys {
            match key.as_ref().split_once('.') {
                Some((head, rest)) => nested
                    .entry(head.to_string())
                    .or_default()
                    .push(rest.to_string()),
                None => query = query.select([key.as_ref()])?,
            }
        }
        for (head, rests) in nested {
            let sub = Query::from_keys(&target.resolver_target(&head)?, rests)?.alias(head);
            query = query.select([sub])?;
        }
        Ok(query)
    }

    /// Take out limit and offset
    pub(crate) fn without_paging(mut self) -> (Query, Option<usize>, Option<usize>) {
        let limit = self.limit.take();
        let offset = self.offset.take();
        (self, limit, offset)
    }

    // ==================
    // Accessors
    // ==================

    pub fn target(&self) -> &ResourceType {
        &self.target
    }

    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Explicitly selected fields
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    pub fn requests(&self) -> &BTreeMap<String, Request> {
        &self.requests
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn get_offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn get_param(&self, name: &str) -> Option<&Json> {
        self.params.get(name)
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub fn backfill_mode(&self) -> Option<Backfill> {
        self.backfill
    }

    // ==================
    // Execution
    // ==================

    pub fn execute(&self) -> Result<Batch> {
        executor::execute(self)
    }

    /// First result, fetching at most one record
    pub fn execute_first(&self) -> Result<Option<Resource>> {
        let mut query = self.clone();
        query.limit = Some(1);
        Ok(query.execute()?.first())
    }

    /// Whether any record matches
    pub fn exists(&self) -> Result<bool> {
        let mut query = self.clone();
        query.limit = Some(1);
        query.eager = false;
        query.requests.clear();
        query.backfill = None;
        Ok(!query.execute()?.is_empty())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selected: Vec<&str> = self
            .fields
            .iter()
            .chain(self.requests.keys())
            .map(String::as_str)
            .collect();
        if selected.is_empty() {
            write!(f, "SELECT * FROM {}", self.target.name())?;
        } else {
            write!(f, "SELECT {} FROM {}", selected.join(", "), self.target.name())?;
        }
        if let Some(predicate) = &self.predicate {
            write!(f, " WHERE {}", predicate)?;
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self.order_by.iter().map(ToString::to_string).collect();
            write!(f, " ORDER BY {}", keys.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}
