//! Storage layer
//!
//! The engine talks to storage only through the [`Store`] trait. One
//! in-memory backend ships with the crate; `RecordingStore` wraps any
//! backend to log its calls.
//!
//! # Invariants
//!
//! - `_id` and `_rev` are fixed field names across backends
//! - `_rev` changes on every successful write
//! - Store errors propagate to callers unchanged

mod errors;
mod history;
mod instrumented;
mod memory;
#[allow(clippy::module_inception)]
mod store;

pub use errors::{StoreError, StoreResult};
pub use history::{RecordingStore, StoreEvent, StoreHistory, StoreMethod};
pub(crate) use instrumented::Instrumented;
pub use memory::MemoryStore;
pub use store::{record_id, Fields, Record, Store};
