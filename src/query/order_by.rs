//! Result ordering
//!
//! Ordering is stable and deterministic. Values compare by kind first:
//! null < bool < number < string < list < object.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};
use crate::index::NumberKey;

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: String,
    #[serde(default)]
    pub desc: bool,
}

impl OrderBy {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            desc: false,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            desc: true,
        }
    }

    /// Parse a comma separated list such as `"age desc, name"` or `"-age"`
    pub fn parse_list(spec: &str) -> Result<Vec<OrderBy>> {
        spec.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(OrderBy::from_str)
            .collect()
    }

    /// Compare two field lookups under this key
    pub fn compare(&self, a: Option<&Json>, b: Option<&Json>) -> Ordering {
        let ordering = compare_values(a, b);
        if self.desc {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl FromStr for OrderBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let key = parts
            .next()
            .ok_or_else(|| Error::parse(0, "empty order key"))?;
        let (key, mut desc) = match key.strip_prefix('-') {
            Some(stripped) => (stripped, true),
            None => (key, false),
        };
        if let Some(direction) = parts.next() {
            desc = match direction.to_ascii_lowercase().as_str() {
                "asc" => false,
                "desc" => true,
                other => {
                    return Err(Error::parse(
                        s.find(other).unwrap_or(0),
                        format!("unknown direction '{}'", other),
                    ))
                }
            };
        }
        if parts.next().is_some() || key.is_empty() {
            return Err(Error::parse(0, format!("invalid order key '{}'", s)));
        }
        Ok(OrderBy {
            key: key.to_string(),
            desc,
        })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, if self.desc { "DESC" } else { "ASC" })
    }
}

/// Compare two records by a list of keys
pub fn compare_records(a: &Map<String, Json>, b: &Map<String, Json>, order: &[OrderBy]) -> Ordering {
    for spec in order {
        let ordering = spec.compare(a.get(&spec.key), b.get(&spec.key));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Sort records in place (stable)
pub fn sort_records(records: &mut [Map<String, Json>], order: &[OrderBy]) {
    if order.is_empty() {
        return;
    }
    records.sort_by(|a, b| compare_records(a, b, order));
}

/// Compares two JSON values for sorting.
///
/// Missing sorts with null; same kinds use natural ordering.
pub fn compare_values(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    let a = a.unwrap_or(&Json::Null);
    let b = b.unwrap_or(&Json::Null);

    let type_order = |v: &Json| -> u8 {
        match v {
            Json::Null => 0,
            Json::Bool(_) => 1,
            Json::Number(_) => 2,
            Json::String(_) => 3,
            Json::Array(_) => 4,
            Json::Object(_) => 5,
        }
    };

    let (a_type, b_type) = (type_order(a), type_order(b));
    if a_type != b_type {
        return a_type.cmp(&b_type);
    }

    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => {
            match (NumberKey::from_number(x), NumberKey::from_number(y)) {
                (Some(xk), Some(yk)) => xk.cmp(&yk),
                _ => Ordering::Equal,
            }
        }
        (Json::String(x), Json::String(y)) => x.cmp(y),
        _ => Ordering::Equal, // Lists and objects not compared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, age: Json) -> Map<String, Json> {
        json!({"_id": id, "age": age}).as_object().cloned().unwrap()
    }

    fn ids(records: &[Map<String, Json>]) -> Vec<&str> {
        records.iter().map(|r| r["_id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_sort_ascending() {
        let mut records = vec![rec("c", json!(30)), rec("a", json!(20)), rec("b", json!(25))];
        sort_records(&mut records, &[OrderBy::asc("age")]);
        assert_eq!(ids(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_descending() {
        let mut records = vec![rec("c", json!(30)), rec("a", json!(20)), rec("b", json!(25))];
        sort_records(&mut records, &[OrderBy::desc("age")]);
        assert_eq!(ids(&records), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_sort_stable_and_nulls_first() {
        let mut records = vec![
            rec("a", json!(25)),
            rec("b", Json::Null),
            rec("c", json!(25)),
        ];
        sort_records(&mut records, &[OrderBy::asc("age")]);
        assert_eq!(ids(&records), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_secondary_key() {
        let mut records = vec![rec("b", json!(1)), rec("a", json!(1)), rec("c", json!(0))];
        sort_records(&mut records, &[OrderBy::asc("age"), OrderBy::asc("_id")]);
        assert_eq!(ids(&records), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("age".parse::<OrderBy>().unwrap(), OrderBy::asc("age"));
        assert_eq!("age DESC".parse::<OrderBy>().unwrap(), OrderBy::desc("age"));
        assert_eq!("-age".parse::<OrderBy>().unwrap(), OrderBy::desc("age"));
        assert_eq!(
            OrderBy::parse_list("age desc, name").unwrap(),
            vec![OrderBy::desc("age"), OrderBy::asc("name")]
        );
        assert!("age sideways".parse::<OrderBy>().is_err());
        assert!("age desc extra".parse::<OrderBy>().is_err());
    }
}
