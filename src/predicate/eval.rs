//! In-memory predicate evaluation
//!
//! Used by the memory store for queries and by batches for fields that
//! have no index. Missing fields read as null. Numbers compare by value
//! regardless of integer/float representation; ordering is defined for
//! numbers, strings and booleans of the same kind only. Numbers compare
//! through [`NumberKey`], the same order batch indexes use.

use std::cmp::Ordering;

use serde_json::{Map, Value as Json};

use super::ast::{BooleanOp, ConditionalOp, Predicate};
use crate::index::NumberKey;

/// Evaluates predicates against records
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a record matches the predicate
    pub fn matches(record: &Map<String, Json>, predicate: &Predicate) -> bool {
        Self::matches_by(predicate, &|name| {
            record.get(name).cloned().unwrap_or(Json::Null)
        })
    }

    /// Evaluate with an arbitrary field lookup
    pub fn matches_by(predicate: &Predicate, lookup: &dyn Fn(&str) -> Json) -> bool {
        match predicate {
            Predicate::Conditional { op, field, value } => {
                Self::compare_op(*op, &lookup(field), value)
            }
            Predicate::Boolean { op, lhs, rhs } => match op {
                BooleanOp::And => {
                    Self::matches_by(lhs, lookup)
                        && rhs.as_ref().map_or(true, |r| Self::matches_by(r, lookup))
                }
                BooleanOp::Or => {
                    let left = Self::matches_by(lhs, lookup);
                    let right = rhs.as_ref().map_or(false, |r| Self::matches_by(r, lookup));
                    left || right
                }
                BooleanOp::Not => !Self::matches_by(lhs, lookup),
            },
        }
    }

    /// Apply one comparison
    pub fn compare_op(op: ConditionalOp, actual: &Json, expected: &Json) -> bool {
        match op {
            ConditionalOp::Eq => values_equal(actual, expected),
            ConditionalOp::Neq => !values_equal(actual, expected),
            ConditionalOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
            ConditionalOp::Geq => matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ConditionalOp::Lt => compare(actual, expected) == Some(Ordering::Less),
            ConditionalOp::Leq => matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            ConditionalOp::In => contains(expected, actual),
            ConditionalOp::Ex => !contains(expected, actual),
        }
    }
}

fn contains(list: &Json, actual: &Json) -> bool {
    list.as_array()
        .map_or(false, |items| items.iter().any(|v| values_equal(actual, v)))
}

/// Equality with numeric normalization (1 == 1.0)
pub fn values_equal(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => {
            match (NumberKey::from_number(x), NumberKey::from_number(y)) {
                (Some(xk), Some(yk)) => xk == yk,
                _ => false,
            }
        }
        _ => a == b,
    }
}

/// Ordering between two values of the same kind; `None` across kinds or with null
pub fn compare(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => {
            Some(NumberKey::from_number(x)?.cmp(&NumberKey::from_number(y)?))
        }
        (Json::String(x), Json::String(y)) => Some(x.cmp(y)),
        (Json::Bool(x), Json::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
