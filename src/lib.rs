//! bindery - a resolver-driven object/store binding engine
//!
//! Resource types are declared once, registered in a [`Registry`], and
//! queried through a predicate algebra. Every attribute of a resource is
//! produced by a resolver: schema fields, relationships to other types, or
//! computed values. Queries load fields with one store call and resolve
//! relationships once per result batch.
//!
//! ```ignore
//! use bindery::{Field, Predicate, Registry, ResourceDef};
//!
//! let registry = Registry::builder()
//!     .define(ResourceDef::new("Dog").field(Field::string("name")).field(Field::int("age")))
//!     .build()?;
//! let dog = registry.resource_type("Dog")?;
//! let old = dog.where_(Predicate::gt("age", 10))?.execute()?;
//! ```

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod observability;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod schema;
pub mod store;
pub mod value;

pub use batch::Batch;
pub use config::{Config, Mode};
pub use error::{Error, Result};
pub use predicate::Predicate;
pub use query::{Backfill, OrderBy, Query, Request};
pub use registry::{JoinDef, Registry, RegistryBuilder, RelationshipDef, ResourceDef, TypeId};
pub use resolver::{Join, Resolver, ResolverKind};
pub use resource::{DumpStyle, Resource, ResourceType};
pub use schema::{Field, FieldType, Schema, ValidationError};
pub use store::{MemoryStore, RecordingStore, Store, StoreError};
pub use value::Value;
