//! Resources and resource types
//!
//! [`ResourceType`] is a handle to a registered type and carries the
//! type-level reads, bulk writes and fixture generation. [`Resource`] is a
//! handle to one record with dirty-tracked attribute state.

mod crud;
mod dump;
#[allow(clippy::module_inception)]
mod resource;
mod resource_type;
mod state;

pub use dump::DumpStyle;
pub use resource::Resource;
pub use resource_type::ResourceType;
