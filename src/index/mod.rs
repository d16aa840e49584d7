//! In-memory field indexes
//!
//! Indexes are derived state owned by a batch: they mirror member field
//! values and are never a source of truth.
//!
//! # Design Principles
//!
//! - Derived state: rebuilt from members on demand
//! - Deterministic: BTreeMap iteration order
//! - Range scans never cross value kinds

mod btree;

pub use btree::{IndexKey, IndexTree, MemberId, NumberKey};
