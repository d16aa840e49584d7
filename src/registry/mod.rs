//! Resource type registry
//!
//! Definitions go in through [`RegistryBuilder`]; the built [`Registry`]
//! is immutable and shared behind an `Arc`. Every relationship target is
//! bound to a registered type at build time, so unknown names fail early.

mod builder;
mod def;
#[allow(clippy::module_inception)]
mod registry;

pub use builder::RegistryBuilder;
pub use def::{JoinDef, RelationshipDef, ResourceDef};
pub(crate) use registry::TypeEntry;
pub use registry::{Registry, TypeId};
