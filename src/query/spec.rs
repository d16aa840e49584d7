//! Serializable query shape
//!
//! ```json
//! {
//!   "alias": null, "limit": 10, "offset": null,
//!   "order_by": [{"key": "age", "desc": true}],
//!   "where": [{"code": 2, "op": "gt", "field": "age", "value": 3}],
//!   "target": {
//!     "type": "Dog",
//!     "fields": {"name": null},
//!     "attributes": {"owner": null, "toys": { ... }}
//!   },
//!   "params": {}, "eager": true
//! }
//! ```
//!
//! Attributes without a nested query dump as `null`; their request
//! parameters are not carried.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::backfill::Backfill;
use super::order_by::OrderBy;
use super::query::Query;
use super::request::Params;
use crate::error::Result;
use crate::predicate::Predicate;
use crate::registry::Registry;

fn default_eager() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Json>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<QuerySpec>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default, rename = "where")]
    pub filters: Vec<Json>,
    pub target: TargetSpec,
    #[serde(default)]
    pub params: Params,
    #[serde(default = "default_eager")]
    pub eager: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill: Option<Backfill>,
}

impl QuerySpec {
    pub fn from_query(query: &Query) -> Self {
        let attributes = query
            .requests()
            .iter()
            .map(|(name, request)| (name.clone(), request.query().map(QuerySpec::from_query)))
            .collect();
        Self {
            alias: query.alias_name().map(str::to_string),
            limit: query.get_limit(),
            offset: query.get_offset(),
            order_by: query.ordering().to_vec(),
            filters: query.predicate().map(Predicate::dump).into_iter().collect(),
            target: TargetSpec {
                type_name: query.target().name().to_string(),
                fields: query.fields().iter().map(|f| (f.clone(), Json::Null)).collect(),
                attributes,
            },
            params: query.params().clone(),
            eager: query.is_eager(),
            backfill: query.backfill_mode(),
        }
    }

    /// Build the query against `registry`, checking every name
    pub fn to_query(&self, registry: &Arc<Registry>) -> Result<Query> {
        let target = registry.resource_type(&self.target.type_name)?;
        let mut query = Query::unbounded(&target)
            .eager(self.eager)
            .select(self.target.fields.keys())?;

        for (name, nested) in &self.target.attributes {
            query = match nested {
                Some(spec) => {
                    let sub = spec.to_query(registry)?.alias(name.clone());
                    query.select([sub])?
                }
                None => query.select([name])?,
            };
        }
        for dump in &self.filters {
            query = query.where_(Predicate::load(&target, dump)?)?;
        }
        query = query.order_by(self.order_by.iter().cloned())?;

        query.alias = self.alias.clone();
        query.limit = self.limit;
        query.offset = self.offset;
        query.params = self.params.clone();
        query.backfill = self.backfill;
        Ok(query)
    }
}

impl Query {
    /// JSON form of this query
    pub fn dump(&self) -> Json {
        serde_json::to_value(QuerySpec::from_query(self)).unwrap_or(Json::Null)
    }

    /// Rebuild a dumped query against `registry`
    pub fn load(registry: &Arc<Registry>, dump: &Json) -> Result<Query> {
        let spec: QuerySpec = serde_json::from_value(dump.clone())?;
        spec.to_query(registry)
    }
}
