//! Predicate evaluation over a batch
//!
//! Indexed fields are answered from their [`IndexTree`]; other fields
//! fall back to a scan of loaded values. Results are member serials.

use std::collections::BTreeSet;

use serde_json::Value as Json;

use super::Batch;
use crate::index::{IndexKey, IndexTree, MemberId};
use crate::predicate::{BooleanOp, ConditionalOp, Predicate, PredicateFilter};

fn lookup(tree: &IndexTree, op: ConditionalOp, value: &Json, all: &BTreeSet<MemberId>) -> BTreeSet<MemberId> {
    let eq = |value: &Json| {
        IndexKey::from_json(value)
            .map(|key| tree.lookup_eq(&key))
            .unwrap_or_default()
    };
    let any_of = |value: &Json| -> BTreeSet<MemberId> {
        value
            .as_array()
            .map(|items| items.iter().flat_map(|v| eq(v)).collect())
            .unwrap_or_default()
    };
    let range = |above: bool, inclusive: bool| match IndexKey::from_json(value) {
        Some(key) if above => tree.lookup_above(&key, inclusive),
        Some(key) => tree.lookup_below(&key, inclusive),
        None => BTreeSet::new(),
    };

    match op {
        ConditionalOp::Eq => eq(value),
        ConditionalOp::Neq => all.difference(&eq(value)).copied().collect(),
        ConditionalOp::Gt => range(true, false),
        ConditionalOp::Geq => range(true, true),
        ConditionalOp::Lt => range(false, false),
        ConditionalOp::Leq => range(false, true),
        ConditionalOp::In => any_of(value),
        ConditionalOp::Ex => all.difference(&any_of(value)).copied().collect(),
    }
}

fn eval(batch: &Batch, predicate: &Predicate, all: &BTreeSet<MemberId>) -> BTreeSet<MemberId> {
    match predicate {
        Predicate::Conditional { op, field, value } => {
            {
                let inner = batch.inner.borrow();
                if let Some(tree) = inner.indexes.as_ref().and_then(|i| i.get(field)) {
                    return lookup(tree, *op, value, all);
                }
            }
            batch
                .members()
                .iter()
                .filter(|m| PredicateFilter::compare_op(*op, &m.peek_json(field), value))
                .map(|m| m.serial())
                .collect()
        }
        Predicate::Boolean { op, lhs, rhs } => {
            let left = eval(batch, lhs, all);
            match (op, rhs) {
                (BooleanOp::And, Some(rhs)) => {
                    if left.is_empty() {
                        return left;
                    }
                    let right = eval(batch, rhs, all);
                    left.intersection(&right).copied().collect()
                }
                (BooleanOp::Or, Some(rhs)) => {
                    let right = eval(batch, rhs, all);
                    left.union(&right).copied().collect()
                }
                (BooleanOp::Not, _) => all.difference(&left).copied().collect(),
                (_, None) => left,
            }
        }
    }
}

/// Serials of members matching `predicate`
pub(crate) fn evaluate(batch: &Batch, predicate: &Predicate) -> BTreeSet<MemberId> {
    let all = batch.serials();
    eval(batch, predicate, &all)
}
