//! Resolver requests
//!
//! A [`Request`] asks for one resolver by name, optionally with parameters
//! and a nested query that shapes the resolver's result.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use super::Query;

/// Named query or request parameters
pub type Params = BTreeMap<String, Json>;

#[derive(Debug, Clone)]
pub struct Request {
    name: String,
    params: Params,
    query: Option<Box<Query>>,
}

impl Request {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
            query: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Json>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Shape a relationship's result with `query`
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(Box::new(query));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn get_param(&self, name: &str) -> Option<&Json> {
        self.params.get(name)
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_params() {
        let request = Request::new("score").param("weight", 2).param("mode", "fast");
        assert_eq!(request.name(), "score");
        assert_eq!(request.get_param("weight"), Some(&json!(2)));
        assert_eq!(request.params().len(), 2);
        assert!(request.query().is_none());
    }
}
