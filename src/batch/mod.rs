//! Batches
//!
//! Ordered, optionally indexed collections of one resource type. Queries
//! return batches; resolvers run across a whole batch at once.

#[allow(clippy::module_inception)]
mod batch;
mod filter;

pub use batch::Batch;
