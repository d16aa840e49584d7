//! JSON rendering of resources
//!
//! Only loaded values are rendered; nothing is resolved. Private resolvers
//! are hidden. Two styles:
//!
//! - `Nested`: related objects are rendered inline. A resource reached a
//!   second time along the current path is rendered as `{"_id": ...}` so
//!   cyclic relationships terminate.
//! - `SideLoaded`: related objects are rendered as ids and their records
//!   are collected once each under `links`, keyed by id. Records of
//!   different handles with the same id are merged.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::Resource;
use crate::batch::Batch;
use crate::schema::ID_FIELD;
use crate::value::Value;

/// Rendering style for [`Resource::dump_with`] and [`Batch::dump_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpStyle {
    #[default]
    Nested,
    SideLoaded,
}

// ==================
// Nested
// ==================

fn dump_value(value: &Value, path: &mut BTreeSet<u64>) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Scalar(json) => json.clone(),
        Value::Resource(resource) => dump_resource(resource, path),
        Value::Batch(batch) => dump_batch(batch, path),
    }
}

fn dump_batch(batch: &Batch, path: &mut BTreeSet<u64>) -> Json {
    Json::Array(
        batch
            .members()
            .iter()
            .map(|member| dump_resource(member, path))
            .collect(),
    )
}

fn dump_resource(resource: &Resource, path: &mut BTreeSet<u64>) -> Json {
    let serial = resource.serial();
    if !path.insert(serial) {
        let mut stub = Map::new();
        stub.insert(ID_FIELD.to_string(), resource.peek_json(ID_FIELD));
        return Json::Object(stub);
    }

    let rtype = resource.resource_type();
    let private = rtype.resolvers().private();
    let mut out = Map::new();
    for (name, value) in resource.loaded_values() {
        if !private.contains(&name) {
            out.insert(name, dump_value(&value, path));
        }
    }

    path.remove(&serial);
    Json::Object(out)
}

// ==================
// Side-loaded
// ==================

/// Key of a resource in `links`; uncreated resources without an id use
/// their serial
fn link_key(resource: &Resource) -> String {
    resource
        .id()
        .unwrap_or_else(|| format!("#{}", resource.serial()))
}

struct SideLoader {
    links: Map<String, Json>,
    visited: BTreeSet<u64>,
}

impl SideLoader {
    fn new() -> Self {
        Self {
            links: Map::new(),
            visited: BTreeSet::new(),
        }
    }

    fn value(&mut self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Scalar(json) => json.clone(),
            Value::Resource(resource) => Json::String(self.resource(resource)),
            Value::Batch(batch) => Json::Array(
                batch
                    .members()
                    .iter()
                    .map(|member| Json::String(self.resource(member)))
                    .collect(),
            ),
        }
    }

    /// Record `resource` and everything it links to; returns its key
    fn resource(&mut self, resource: &Resource) -> String {
        let key = link_key(resource);
        if !self.visited.insert(resource.serial()) {
            return key;
        }

        let rtype = resource.resource_type();
        let private = rtype.resolvers().private();
        let mut record = Map::new();
        for (name, value) in resource.loaded_values() {
            if !private.contains(&name) {
                let dumped = self.value(&value);
                record.insert(name, dumped);
            }
        }

        match self.links.get_mut(&key) {
            Some(Json::Object(existing)) => existing.extend(record),
            _ => {
                self.links.insert(key.clone(), Json::Object(record));
            }
        }
        key
    }
}

impl Resource {
    /// Loaded state as JSON, recursing into related objects
    pub fn dump(&self) -> Json {
        dump_resource(self, &mut BTreeSet::new())
    }

    /// Loaded state in the given style. Side-loaded output is
    /// `{"target": record, "links": {id: record}}`.
    pub fn dump_with(&self, style: DumpStyle) -> Json {
        match style {
            DumpStyle::Nested => self.dump(),
            DumpStyle::SideLoaded => {
                let mut loader = SideLoader::new();
                let key = loader.resource(self);
                let target = loader.links.remove(&key).unwrap_or(Json::Null);
                serde_json::json!({ "target": target, "links": loader.links })
            }
        }
    }
}

impl Batch {
    /// Members' loaded state as a JSON array
    pub fn dump(&self) -> Json {
        dump_batch(self, &mut BTreeSet::new())
    }

    /// Members in the given style. Side-loaded output is
    /// `{"target": [record, ...], "links": {id: record}}`; members are not
    /// repeated under `links`.
    pub fn dump_with(&self, style: DumpStyle) -> Json {
        match style {
            DumpStyle::Nested => self.dump(),
            DumpStyle::SideLoaded => {
                let mut loader = SideLoader::new();
                let keys: Vec<String> = self
                    .members()
                    .iter()
                    .map(|member| loader.resource(member))
                    .collect();
                let targets: Vec<Json> = keys
                    .iter()
                    .map(|key| loader.links.get(key).cloned().unwrap_or(Json::Null))
                    .collect();
                for key in &keys {
                    loader.links.remove(key);
                }
                serde_json::json!({ "target": targets, "links": loader.links })
            }
        }
    }
}
