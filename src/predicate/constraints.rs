//! Field constraints derived from predicates
//!
//! Fixture generation needs values that satisfy a query's filter. Each
//! predicate is reduced to a per-field [`Constraint`]: `and` merges both
//! sides, `or` keeps the left branch, `not` is pushed down to the leaves.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value as Json;

use super::ast::{BooleanOp, ConditionalOp, Predicate};
use super::eval::{compare, values_equal, PredicateFilter};

/// One side of a range
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub value: Json,
    pub inclusive: bool,
}

/// Value requirements for one field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Constraint {
    pub equals: Option<Json>,
    pub one_of: Option<Vec<Json>>,
    pub exclude: Vec<Json>,
    pub lower: Option<Limit>,
    pub upper: Option<Limit>,
}

/// Field name → constraint
pub type Constraints = BTreeMap<String, Constraint>;

impl Constraint {
    fn apply(&mut self, op: ConditionalOp, value: &Json) {
        match op {
            ConditionalOp::Eq => {
                if self.equals.is_none() {
                    self.equals = Some(value.clone());
                }
            }
            ConditionalOp::Neq => self.exclude.push(value.clone()),
            ConditionalOp::Gt | ConditionalOp::Geq => {
                let limit = Limit {
                    value: value.clone(),
                    inclusive: op == ConditionalOp::Geq,
                };
                self.lower = Some(tighter(self.lower.take(), limit, Ordering::Greater));
            }
            ConditionalOp::Lt | ConditionalOp::Leq => {
                let limit = Limit {
                    value: value.clone(),
                    inclusive: op == ConditionalOp::Leq,
                };
                self.upper = Some(tighter(self.upper.take(), limit, Ordering::Less));
            }
            ConditionalOp::In => {
                let values = value.as_array().cloned().unwrap_or_default();
                self.one_of = Some(match self.one_of.take() {
                    Some(existing) => existing
                        .into_iter()
                        .filter(|v| values.iter().any(|w| values_equal(v, w)))
                        .collect(),
                    None => values,
                });
            }
            ConditionalOp::Ex => {
                if let Some(values) = value.as_array() {
                    self.exclude.extend(values.iter().cloned());
                }
            }
        }
    }

    fn merge(&mut self, other: Constraint) {
        if let Some(value) = other.equals {
            self.apply(ConditionalOp::Eq, &value);
        }
        if let Some(values) = other.one_of {
            self.apply(ConditionalOp::In, &Json::Array(values));
        }
        self.exclude.extend(other.exclude);
        if let Some(lower) = other.lower {
            self.lower = Some(tighter(self.lower.take(), lower, Ordering::Greater));
        }
        if let Some(upper) = other.upper {
            self.upper = Some(tighter(self.upper.take(), upper, Ordering::Less));
        }
    }

    /// Whether `value` satisfies every requirement
    pub fn admits(&self, value: &Json) -> bool {
        if let Some(expected) = &self.equals {
            if !values_equal(value, expected) {
                return false;
            }
        }
        if let Some(choices) = &self.one_of {
            if !choices.iter().any(|c| values_equal(value, c)) {
                return false;
            }
        }
        if self.exclude.iter().any(|e| values_equal(value, e)) {
            return false;
        }
        if let Some(lower) = &self.lower {
            let op = if lower.inclusive {
                ConditionalOp::Geq
            } else {
                ConditionalOp::Gt
            };
            if !PredicateFilter::compare_op(op, value, &lower.value) {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let op = if upper.inclusive {
                ConditionalOp::Leq
            } else {
                ConditionalOp::Lt
            };
            if !PredicateFilter::compare_op(op, value, &upper.value) {
                return false;
            }
        }
        true
    }
}

/// Keep whichever limit is stricter in direction `dir`
fn tighter(current: Option<Limit>, candidate: Limit, dir: Ordering) -> Limit {
    match current {
        None => candidate,
        Some(current) => match compare(&candidate.value, &current.value) {
            Some(ord) if ord == dir => candidate,
            Some(Ordering::Equal) => Limit {
                inclusive: current.inclusive && candidate.inclusive,
                value: current.value,
            },
            _ => current,
        },
    }
}

impl Predicate {
    /// Derive per-field constraints satisfying this predicate
    pub fn constraints(&self) -> Constraints {
        let mut out = Constraints::new();
        derive(self, &mut out);
        out
    }
}

fn derive(predicate: &Predicate, out: &mut Constraints) {
    match predicate {
        Predicate::Conditional { op, field, value } => {
            out.entry(field.clone()).or_default().apply(*op, value);
        }
        Predicate::Boolean { op, lhs, rhs } => match op {
            BooleanOp::And => {
                derive(lhs, out);
                if let Some(rhs) = rhs {
                    let mut right = Constraints::new();
                    derive(rhs, &mut right);
                    for (field, constraint) in right {
                        out.entry(field).or_default().merge(constraint);
                    }
                }
            }
            BooleanOp::Or => derive(lhs, out),
            BooleanOp::Not => derive(&push_not(lhs), out),
        },
    }
}

/// Negate a predicate, pushing `not` to the leaves
fn push_not(predicate: &Predicate) -> Predicate {
    match predicate {
        Predicate::Conditional { op, field, value } => {
            Predicate::conditional(op.negate(), field.clone(), value.clone())
        }
        Predicate::Boolean { op, lhs, rhs } => match (op, rhs) {
            (BooleanOp::Not, _) => (**lhs).clone(),
            (BooleanOp::And, Some(rhs)) => Predicate::or(push_not(lhs), push_not(rhs)),
            (BooleanOp::Or, Some(rhs)) => Predicate::and(push_not(lhs), push_not(rhs)),
            (_, None) => push_not(lhs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_and_range() {
        let p = Predicate::eq("color", "red") & Predicate::gt("age", 3) & Predicate::leq("age", 9);
        let c = p.constraints();

        assert_eq!(c["color"].equals, Some(json!("red")));
        let age = &c["age"];
        assert_eq!(age.lower, Some(Limit { value: json!(3), inclusive: false }));
        assert_eq!(age.upper, Some(Limit { value: json!(9), inclusive: true }));
        assert!(age.admits(&json!(4)));
        assert!(!age.admits(&json!(3)));
    }

    #[test]
    fn test_tightest_bound_wins() {
        let p = Predicate::gt("n", 1) & Predicate::gt("n", 5) & Predicate::geq("n", 2);
        assert_eq!(p.constraints()["n"].lower.as_ref().unwrap().value, json!(5));
    }

    #[test]
    fn test_or_keeps_left_branch() {
        let p = Predicate::eq("a", 1) | Predicate::eq("b", 2);
        let c = p.constraints();
        assert!(c.contains_key("a"));
        assert!(!c.contains_key("b"));
    }

    #[test]
    fn test_not_pushed_down() {
        let p = !(Predicate::eq("color", "red") | Predicate::lt("age", 2));
        let c = p.constraints();
        assert_eq!(c["color"].exclude, vec![json!("red")]);
        assert_eq!(c["age"].lower, Some(Limit { value: json!(2), inclusive: true }));
    }

    #[test]
    fn test_membership_intersects() {
        let p = Predicate::including("c", ["a", "b", "c"]) & Predicate::including("c", ["b", "c", "d"]);
        let c = p.constraints();
        assert_eq!(c["c"].one_of, Some(vec![json!("b"), json!("c")]));
        assert!(!c["c"].admits(&json!("a")));
    }
}
