//! Resource type definitions
//!
//! A [`ResourceDef`] is the declarative input to the registry: fields,
//! relationships, an optional parent type and any custom resolvers.
//! Definitions without custom resolvers round-trip through JSON:
//!
//! ```json
//! {
//!   "name": "Ship",
//!   "fields": [{"name": "name", "type": "string", "required": true}],
//!   "relationships": [
//!     {"name": "crew", "many": true, "joins": [{"source": "_id", "target": "Officer.ship_id"}]}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::predicate::{parse, Predicate};
use crate::resolver::{Join, Resolver};
use crate::schema::Field;

fn default_true() -> bool {
    true
}

/// One hop of a declared relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinDef {
    /// Field on the current side
    pub source: String,
    /// `Type.field` on the far side
    pub target: String,
    /// Extra filter on the far side, in predicate syntax
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl JoinDef {
    fn to_join(&self) -> Result<Join> {
        let join = Join::new(self.source.clone(), &self.target);
        Ok(match &self.filter {
            Some(text) => join.filter(parse(text)?),
            None => join,
        })
    }
}

/// Declared relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    pub joins: Vec<JoinDef>,
    #[serde(default)]
    pub many: bool,
    #[serde(default = "default_true")]
    pub lazy: bool,
    #[serde(default)]
    pub private: bool,
}

impl RelationshipDef {
    pub(crate) fn to_resolver(&self) -> Result<Resolver> {
        let joins = self
            .joins
            .iter()
            .map(JoinDef::to_join)
            .collect::<Result<Vec<_>>>()?;
        let mut resolver = Resolver::relationship(self.name.clone(), joins).lazy(self.lazy);
        if self.many {
            resolver = resolver.many();
        }
        if self.private {
            resolver = resolver.private();
        }
        Ok(resolver)
    }
}

/// Declarative resource type
#[derive(Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extends: Option<String>,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default)]
    relationships: Vec<RelationshipDef>,
    #[serde(skip)]
    resolvers: Vec<Resolver>,
}

impl ResourceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            fields: Vec::new(),
            relationships: Vec::new(),
            resolvers: Vec::new(),
        }
    }

    /// Inherit the parent's fields and resolvers
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Custom relationship or computed resolver
    pub fn resolver(mut self, resolver: Resolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Shorthand for a single-hop relationship
    pub fn join(self, name: impl Into<String>, source: &str, target: &str, many: bool) -> Self {
        let resolver = Resolver::relationship(name, vec![Join::new(source, target)]);
        self.resolver(if many { resolver.many() } else { resolver })
    }

    /// Shorthand for a single-hop relationship with a filter on the far side
    pub fn join_where(
        self,
        name: impl Into<String>,
        source: &str,
        target: &str,
        many: bool,
        filter: Predicate,
    ) -> Self {
        let resolver = Resolver::relationship(name, vec![Join::new(source, target).filter(filter)]);
        self.resolver(if many { resolver.many() } else { resolver })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.extends.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Declared relationships and custom resolvers, in declaration order
    pub(crate) fn custom_resolvers(&self) -> Result<Vec<Resolver>> {
        let mut out = self
            .relationships
            .iter()
            .map(RelationshipDef::to_resolver)
            .collect::<Result<Vec<_>>>()?;
        out.extend(self.resolvers.iter().cloned());
        Ok(out)
    }
}

impl std::fmt::Debug for ResourceDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDef")
            .field("name", &self.name)
            .field("extends", &self.extends)
            .field("fields", &self.fields.len())
            .field("relationships", &self.relationships.len())
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}
