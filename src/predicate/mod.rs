//! Predicate algebra
//!
//! # Design Principles
//!
//! - Predicates are immutable values
//! - Field names are checked against the target type when loaded or parsed
//! - One evaluation semantic shared by the memory store and batch scans:
//!   `and` stops on a false left side, `or` evaluates both sides

mod ast;
mod constraints;
mod eval;
mod parser;

pub use ast::{BooleanOp, ConditionalOp, Predicate, BOOLEAN_CODE, CONDITIONAL_CODE};
pub use constraints::{Constraint, Constraints, Limit};
pub use eval::{compare, values_equal, PredicateFilter};
pub use parser::{parse, parse_for};
