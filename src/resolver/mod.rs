//! Resolvers
//!
//! Every attribute of a resource is produced by a resolver: schema fields
//! load from the type's store, relationships follow joins into other
//! types, computed resolvers run user hooks. Resolvers execute singly on
//! one resource or amortized across a batch.

mod field;
mod manager;
mod relationship;
#[allow(clippy::module_inception)]
mod resolver;

pub use manager::ResolverManager;
pub use resolver::{
    BatchExecuteFn, DeleteFn, ExecuteFn, Join, Resolver, ResolverKind, SaveFn, TransformFn, TypeRef,
    COMPUTED_PRIORITY, FIELD_PRIORITY, RELATIONSHIP_PRIORITY,
};
