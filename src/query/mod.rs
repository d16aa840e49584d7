//! Query subsystem
//!
//! Builds queries against a resource type and executes them: one store
//! query for eager fields, then every requested resolver across the whole
//! result batch.

mod backfill;
mod executor;
mod order_by;
mod query;
mod request;
mod spec;

pub use backfill::Backfill;
pub use order_by::{compare_records, compare_values, sort_records, OrderBy};
pub use query::{Query, Selector};
pub use request::{Params, Request};
pub use spec::{QuerySpec, TargetSpec};
