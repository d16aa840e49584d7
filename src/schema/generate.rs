//! Fixture value generation
//!
//! Values honour an optional [`Constraint`] derived from a query filter.
//! Generation is best effort: unsatisfiable constraints yield a value of
//! the right type that may not match.

use chrono::{Duration, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value as Json};

use super::types::{Field, FieldType};
use crate::predicate::{values_equal, Constraint};

const MAX_ATTEMPTS: usize = 32;
const DEFAULT_SPAN: i64 = 100;

impl Field {
    /// Produce a synthetic value for this field
    pub fn generate(&self, rng: &mut StdRng, constraint: Option<&Constraint>) -> Json {
        if let Some(c) = constraint {
            if let Some(value) = &c.equals {
                return value.clone();
            }
            if let Some(choices) = &c.one_of {
                let allowed: Vec<&Json> = choices
                    .iter()
                    .filter(|v| !c.exclude.iter().any(|e| values_equal(v, e)))
                    .collect();
                if let Some(value) = allowed.choose(rng) {
                    return (*value).clone();
                }
            }
        }

        let mut value = self.sample(rng, constraint);
        for _ in 0..MAX_ATTEMPTS {
            if constraint.map_or(true, |c| c.admits(&value)) {
                break;
            }
            value = self.sample(rng, constraint);
        }
        value
    }

    fn sample(&self, rng: &mut StdRng, constraint: Option<&Constraint>) -> Json {
        match self.generator_fn() {
            Some(generator) => generator(rng),
            None => sample_type(self.field_type(), rng, constraint),
        }
    }
}

fn sample_type(field_type: &FieldType, rng: &mut StdRng, constraint: Option<&Constraint>) -> Json {
    match field_type {
        FieldType::String { .. } => Json::String(word(rng)),
        FieldType::Int => {
            let (lo, hi) = int_range(constraint);
            Json::from(if lo >= hi { lo } else { rng.gen_range(lo..=hi) })
        }
        FieldType::Float => {
            let (lo, hi) = float_range(constraint);
            let f = if lo >= hi { lo } else { rng.gen_range(lo..hi) };
            Json::from(f)
        }
        FieldType::Bool => Json::Bool(rng.gen()),
        FieldType::Id { .. } | FieldType::Uuid => Json::String(random_hex(rng)),
        FieldType::Datetime => {
            let back = Duration::seconds(rng.gen_range(0..365 * 24 * 3600));
            Json::String((Utc::now() - back).to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        FieldType::List { element } => {
            let len = rng.gen_range(0..=3);
            Json::Array((0..len).map(|_| sample_type(element, rng, None)).collect())
        }
        FieldType::Object => Json::Object(Map::new()),
    }
}

/// Random uuid (v4 layout) from the seeded rng
pub(crate) fn random_hex(rng: &mut StdRng) -> String {
    uuid::Builder::from_random_bytes(rng.gen())
        .into_uuid()
        .simple()
        .to_string()
}

fn word(rng: &mut StdRng) -> String {
    let len = rng.gen_range(6..=12);
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

fn int_range(constraint: Option<&Constraint>) -> (i64, i64) {
    let lower = constraint
        .and_then(|c| c.lower.as_ref())
        .and_then(|l| l.value.as_f64().map(|v| (v, l.inclusive)))
        .map(|(v, inclusive)| {
            if inclusive {
                v.ceil() as i64
            } else {
                v.floor() as i64 + 1
            }
        });
    let upper = constraint
        .and_then(|c| c.upper.as_ref())
        .and_then(|l| l.value.as_f64().map(|v| (v, l.inclusive)))
        .map(|(v, inclusive)| {
            if inclusive {
                v.floor() as i64
            } else {
                v.ceil() as i64 - 1
            }
        });
    match (lower, upper) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => (lo, lo.saturating_add(DEFAULT_SPAN)),
        (None, Some(hi)) => (hi.saturating_sub(DEFAULT_SPAN), hi),
        (None, None) => (0, DEFAULT_SPAN),
    }
}

fn float_range(constraint: Option<&Constraint>) -> (f64, f64) {
    let lower = constraint
        .and_then(|c| c.lower.as_ref())
        .and_then(|l| l.value.as_f64());
    let upper = constraint
        .and_then(|c| c.upper.as_ref())
        .and_then(|l| l.value.as_f64());
    let span = DEFAULT_SPAN as f64;
    match (lower, upper) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => (lo, lo + span),
        (None, Some(hi)) => (hi - span, hi),
        (None, None) => (0.0, span),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;
    use rand::SeedableRng;
    use serde_json::json;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_equality_constraint() {
        let c = Predicate::eq("color", "red").constraints();
        let value = Field::string("color").generate(&mut rng(), c.get("color"));
        assert_eq!(value, json!("red"));
    }

    #[test]
    fn test_range_constraint() {
        let c = (Predicate::gt("age", 3) & Predicate::lt("age", 6)).constraints();
        let field = Field::int("age");
        let mut rng = rng();
        for _ in 0..50 {
            let v = field.generate(&mut rng, c.get("age")).as_i64().unwrap();
            assert!((4..=5).contains(&v));
        }
    }

    #[test]
    fn test_choice_respects_exclusion() {
        let c = (Predicate::including("c", ["a", "b"]) & Predicate::neq("c", "a")).constraints();
        let value = Field::string("c").generate(&mut rng(), c.get("c"));
        assert_eq!(value, json!("b"));
    }

    #[test]
    fn test_values_are_processable() {
        let mut rng = rng();
        let fields = [
            Field::string("s"),
            Field::int("i"),
            Field::float("f"),
            Field::bool("b"),
            Field::id("id"),
            Field::uuid("u"),
            Field::datetime("d"),
            Field::list("l", FieldType::Int),
            Field::object("o"),
        ];
        for field in fields {
            let value = field.generate(&mut rng, None);
            assert!(field.process(&value).is_ok(), "{}: {}", field.name(), value);
        }
    }

    #[test]
    fn test_custom_generator() {
        let field = Field::string("name").generator(|_| json!("fixed"));
        assert_eq!(field.generate(&mut rng(), None), json!("fixed"));
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let field = Field::uuid("u");
        assert_eq!(field.generate(&mut rng(), None), field.generate(&mut rng(), None));
    }
}
