//! BTreeMap-based index structures
//!
//! Indexes map a field value to the set of batch members holding it.
//! Members are identified by their process-unique serial.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use serde_json::Value as Json;

/// Member identifier stored in an index
pub type MemberId = u64;

/// Exact numeric key.
///
/// Integral values are held as `Int` whatever their JSON representation, so
/// `3` and `3.0` are one key and integers beyond 2^53 keep full precision.
/// `Float` only holds non-integral or out-of-range values. Ordering is the
/// exact numeric order across both variants.
#[derive(Debug, Clone, Copy)]
pub enum NumberKey {
    Int(i128),
    Float(f64),
}

const I128_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0; // 2^127

impl NumberKey {
    pub fn from_f64(v: f64) -> Self {
        if v.fract() == 0.0 && v >= -I128_BOUND && v < I128_BOUND {
            NumberKey::Int(v as i128)
        } else {
            NumberKey::Float(v)
        }
    }

    pub fn from_number(n: &serde_json::Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            Some(NumberKey::Int(i as i128))
        } else if let Some(u) = n.as_u64() {
            Some(NumberKey::Int(u as i128))
        } else {
            n.as_f64().map(Self::from_f64)
        }
    }
}

fn cmp_int_float(i: i128, f: f64) -> Ordering {
    if f >= I128_BOUND {
        return Ordering::Less;
    }
    if f < -I128_BOUND {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => whole.total_cmp(&f),
        ordering => ordering,
    }
}

impl Ord for NumberKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NumberKey::Int(a), NumberKey::Int(b)) => a.cmp(b),
            (NumberKey::Float(a), NumberKey::Float(b)) => a.total_cmp(b),
            (NumberKey::Int(a), NumberKey::Float(b)) => cmp_int_float(*a, *b),
            (NumberKey::Float(a), NumberKey::Int(b)) => cmp_int_float(*b, *a).reverse(),
        }
    }
}

impl PartialOrd for NumberKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NumberKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumberKey {}

/// Index key representing a field value.
///
/// Ordering is deterministic: Null < Bool < Number < String.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    /// Null or missing value
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    Number(NumberKey),
    /// String value
    String(String),
}

impl IndexKey {
    /// Create a key from a float
    pub fn from_f64(v: f64) -> Self {
        IndexKey::Number(NumberKey::from_f64(v))
    }

    /// Create a key from a string
    pub fn from_string(v: impl Into<String>) -> Self {
        IndexKey::String(v.into())
    }

    /// Create a key from a JSON value
    ///
    /// Arrays and objects are not indexable.
    pub fn from_json(value: &Json) -> Option<Self> {
        match value {
            Json::Null => Some(IndexKey::Null),
            Json::Bool(b) => Some(IndexKey::Bool(*b)),
            Json::Number(n) => NumberKey::from_number(n).map(IndexKey::Number),
            Json::String(s) => Some(IndexKey::from_string(s.as_str())),
            _ => None,
        }
    }

    /// Discriminant rank, used to keep range scans within one kind
    fn kind(&self) -> u8 {
        match self {
            IndexKey::Null => 0,
            IndexKey::Bool(_) => 1,
            IndexKey::Number(_) => 2,
            IndexKey::String(_) => 3,
        }
    }

    /// Whether the key can bound a range scan
    pub fn is_orderable(&self) -> bool {
        !matches!(self, IndexKey::Null)
    }
}

/// A single field index using BTreeMap for deterministic ordering.
#[derive(Debug, Default, Clone)]
pub struct IndexTree {
    tree: BTreeMap<IndexKey, BTreeSet<MemberId>>,
}

impl IndexTree {
    /// Creates a new empty index tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member under a key
    pub fn insert(&mut self, key: IndexKey, member: MemberId) {
        self.tree.entry(key).or_default().insert(member);
    }

    /// Remove a member from a key.
    ///
    /// If the key has no more members, removes the key entirely.
    pub fn remove(&mut self, key: &IndexKey, member: MemberId) {
        if let Some(members) = self.tree.get_mut(key) {
            members.remove(&member);
            if members.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// Members holding exactly `key`
    pub fn lookup_eq(&self, key: &IndexKey) -> BTreeSet<MemberId> {
        self.tree.get(key).cloned().unwrap_or_default()
    }

    /// Members whose key is above `key`, within the same kind
    pub fn lookup_above(&self, key: &IndexKey, inclusive: bool) -> BTreeSet<MemberId> {
        let lower = if inclusive {
            Bound::Included(key)
        } else {
            Bound::Excluded(key)
        };
        self.scan((lower, Bound::Unbounded), key.kind())
    }

    /// Members whose key is below `key`, within the same kind
    pub fn lookup_below(&self, key: &IndexKey, inclusive: bool) -> BTreeSet<MemberId> {
        let upper = if inclusive {
            Bound::Included(key)
        } else {
            Bound::Excluded(key)
        };
        self.scan((Bound::Unbounded, upper), key.kind())
    }

    fn scan(&self, range: (Bound<&IndexKey>, Bound<&IndexKey>), kind: u8) -> BTreeSet<MemberId> {
        if kind == IndexKey::Null.kind() {
            return BTreeSet::new();
        }
        self.tree
            .range::<IndexKey, _>(range)
            .filter(|(k, _)| k.kind() == kind)
            .flat_map(|(_, members)| members.iter().copied())
            .collect()
    }

    /// Every indexed member
    pub fn all(&self) -> BTreeSet<MemberId> {
        self.tree.values().flatten().copied().collect()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the number of distinct keys
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Returns the total number of member entries
    pub fn member_count(&self) -> usize {
        self.tree.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(v: Json) -> IndexKey {
        IndexKey::from_json(&v).unwrap()
    }

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            IndexKey::Null,
            key(json!(false)),
            key(json!(true)),
            key(json!(-100.5)),
            key(json!(-1)),
            key(json!(0)),
            key(json!(100)),
            key(json!("aaa")),
            key(json!("zzz")),
        ];

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "Keys should be ordered at {}", i);
        }
    }

    #[test]
    fn test_int_and_float_share_key() {
        assert_eq!(key(json!(3)), key(json!(3.0)));
        assert_eq!(key(json!(0.0)), key(json!(-0.0)));
    }

    #[test]
    fn test_large_integers_keep_precision() {
        assert_ne!(key(json!(9007199254740993i64)), key(json!(9007199254740992i64)));
        assert_eq!(key(json!(9007199254740992i64)), key(json!(9007199254740992.0)));
        assert!(key(json!(9007199254740992i64)) < key(json!(9007199254740993i64)));
        assert!(key(json!(u64::MAX)) > key(json!(i64::MAX)));
    }

    #[test]
    fn test_mixed_number_ordering() {
        assert!(key(json!(2)) < key(json!(2.5)));
        assert!(key(json!(2.5)) < key(json!(3)));
        assert!(key(json!(-3)) < key(json!(-2.5)));
        assert!(key(json!(-2.5)) < key(json!(-2)));
        assert!(key(json!(i64::MAX)) < key(json!(1e300)));
        assert!(key(json!(i64::MIN)) > key(json!(-1e300)));
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut tree = IndexTree::new();
        tree.insert(key(json!("alice")), 1);
        tree.insert(key(json!("alice")), 2);
        tree.insert(key(json!("bob")), 3);

        assert_eq!(
            tree.lookup_eq(&key(json!("alice"))).into_iter().collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(tree.member_count(), 3);
    }

    #[test]
    fn test_remove() {
        let mut tree = IndexTree::new();
        tree.insert(key(json!(1)), 10);
        tree.insert(key(json!(1)), 20);

        tree.remove(&key(json!(1)), 10);
        assert_eq!(tree.lookup_eq(&key(json!(1))).len(), 1);

        tree.remove(&key(json!(1)), 20);
        assert_eq!(tree.key_count(), 0);
    }

    #[test]
    fn test_range_stays_within_kind() {
        let mut tree = IndexTree::new();
        tree.insert(IndexKey::Null, 1);
        tree.insert(key(json!(2)), 2);
        tree.insert(key(json!(4)), 4);
        tree.insert(key(json!("x")), 9);

        let above = tree.lookup_above(&key(json!(2)), false);
        assert_eq!(above.into_iter().collect::<Vec<_>>(), vec![4]);

        let below = tree.lookup_below(&key(json!(4)), true);
        assert_eq!(below.into_iter().collect::<Vec<_>>(), vec![2, 4]);

        assert!(tree.lookup_above(&IndexKey::Null, true).is_empty());
    }

    #[test]
    fn test_arrays_not_indexed() {
        assert_eq!(IndexKey::from_json(&json!([1, 2, 3])), None);
    }
}
