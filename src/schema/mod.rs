//! Resource schemas
//!
//! A schema is the ordered field set of one resource type. Fields know how
//! to coerce incoming values (`process`) and how to synthesize fixture
//! values (`generate`).
//!
//! # Design Principles
//!
//! - Every schema carries `_id` and `_rev`
//! - Coercion is lossless or rejected
//! - Validation failures are collected per record, raised once per batch

mod errors;
mod generate;
mod process;
mod types;

pub use errors::{FieldError, RecordErrors, ValidationError};
pub(crate) use errors::ErrorCollector;
pub(crate) use generate::random_hex;
pub use types::{DefaultFn, Field, FieldType, GeneratorFn, Schema, ID_FIELD, REV_FIELD};
