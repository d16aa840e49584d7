//! Predicate tree
//!
//! A predicate is an immutable tree of conditional `(field, op, value)`
//! leaves and boolean `and`/`or`/`not` nodes. Trees dump to plain JSON
//! keyed by a discriminant code so they can cross process boundaries.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use crate::error::{Error, Result};
use crate::resource::ResourceType;

/// Dump discriminant for boolean nodes
pub const BOOLEAN_CODE: u64 = 1;
/// Dump discriminant for conditional leaves
pub const CONDITIONAL_CODE: u64 = 2;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionalOp {
    Eq,
    Neq,
    Gt,
    Geq,
    Lt,
    Leq,
    /// Value is one of a list
    In,
    /// Value is none of a list
    Ex,
}

impl ConditionalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionalOp::Eq => "eq",
            ConditionalOp::Neq => "neq",
            ConditionalOp::Gt => "gt",
            ConditionalOp::Geq => "geq",
            ConditionalOp::Lt => "lt",
            ConditionalOp::Leq => "leq",
            ConditionalOp::In => "in",
            ConditionalOp::Ex => "ex",
        }
    }

    /// Infix symbol used by `Display` and the parser
    pub fn symbol(&self) -> &'static str {
        match self {
            ConditionalOp::Eq => "==",
            ConditionalOp::Neq => "!=",
            ConditionalOp::Gt => ">",
            ConditionalOp::Geq => ">=",
            ConditionalOp::Lt => "<",
            ConditionalOp::Leq => "<=",
            ConditionalOp::In => "in",
            ConditionalOp::Ex => "not in",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => ConditionalOp::Eq,
            "neq" => ConditionalOp::Neq,
            "gt" => ConditionalOp::Gt,
            "geq" => ConditionalOp::Geq,
            "lt" => ConditionalOp::Lt,
            "leq" => ConditionalOp::Leq,
            "in" => ConditionalOp::In,
            "ex" => ConditionalOp::Ex,
            _ => return None,
        })
    }

    /// Logical complement
    pub fn negate(&self) -> Self {
        match self {
            ConditionalOp::Eq => ConditionalOp::Neq,
            ConditionalOp::Neq => ConditionalOp::Eq,
            ConditionalOp::Gt => ConditionalOp::Leq,
            ConditionalOp::Geq => ConditionalOp::Lt,
            ConditionalOp::Lt => ConditionalOp::Geq,
            ConditionalOp::Leq => ConditionalOp::Gt,
            ConditionalOp::In => ConditionalOp::Ex,
            ConditionalOp::Ex => ConditionalOp::In,
        }
    }

    /// Membership operators carry a list value
    pub fn takes_list(&self) -> bool {
        matches!(self, ConditionalOp::In | ConditionalOp::Ex)
    }
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    And,
    Or,
    Not,
}

impl BooleanOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanOp::And => "and",
            BooleanOp::Or => "or",
            BooleanOp::Not => "not",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "and" => BooleanOp::And,
            "or" => BooleanOp::Or,
            "not" => BooleanOp::Not,
            _ => return None,
        })
    }
}

/// Filter expression over field comparisons
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Conditional {
        op: ConditionalOp,
        field: String,
        value: Json,
    },
    Boolean {
        op: BooleanOp,
        lhs: Box<Predicate>,
        /// Absent for `not`
        rhs: Option<Box<Predicate>>,
    },
}

impl Predicate {
    pub fn conditional(op: ConditionalOp, field: impl Into<String>, value: impl Into<Json>) -> Self {
        Predicate::Conditional {
            op,
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Json>) -> Self {
        Self::conditional(ConditionalOp::Eq, field, value)
    }

    pub fn neq(field: impl Into<String>, value: impl Into<Json>) -> Self {
        Self::conditional(ConditionalOp::Neq, field, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Json>) -> Self {
        Self::conditional(ConditionalOp::Gt, field, value)
    }

    pub fn geq(field: impl Into<String>, value: impl Into<Json>) -> Self {
        Self::conditional(ConditionalOp::Geq, field, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Json>) -> Self {
        Self::conditional(ConditionalOp::Lt, field, value)
    }

    pub fn leq(field: impl Into<String>, value: impl Into<Json>) -> Self {
        Self::conditional(ConditionalOp::Leq, field, value)
    }

    pub fn including<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Json>,
    {
        let values: Vec<Json> = values.into_iter().map(Into::into).collect();
        Self::conditional(ConditionalOp::In, field, Json::Array(values))
    }

    pub fn excluding<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Json>,
    {
        let values: Vec<Json> = values.into_iter().map(Into::into).collect();
        Self::conditional(ConditionalOp::Ex, field, Json::Array(values))
    }

    pub fn and(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Boolean {
            op: BooleanOp::And,
            lhs: Box::new(lhs),
            rhs: Some(Box::new(rhs)),
        }
    }

    pub fn or(lhs: Predicate, rhs: Predicate) -> Self {
        Predicate::Boolean {
            op: BooleanOp::Or,
            lhs: Box::new(lhs),
            rhs: Some(Box::new(rhs)),
        }
    }

    pub fn negate(inner: Predicate) -> Self {
        Predicate::Boolean {
            op: BooleanOp::Not,
            lhs: Box::new(inner),
            rhs: None,
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, Predicate::Conditional { .. })
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Predicate::Boolean { .. })
    }

    /// Names of every field the predicate compares
    pub fn fields(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::Conditional { field, .. } => {
                out.insert(field.clone());
            }
            Predicate::Boolean { lhs, rhs, .. } => {
                lhs.collect_fields(out);
                if let Some(rhs) = rhs {
                    rhs.collect_fields(out);
                }
            }
        }
    }

    /// Fold predicates with `and`; `None` when empty, the sole element when singular
    pub fn reduce_and<I>(predicates: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Predicate>,
    {
        predicates.into_iter().reduce(Predicate::and)
    }

    /// Fold predicates with `or`; `None` when empty, the sole element when singular
    pub fn reduce_or<I>(predicates: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Predicate>,
    {
        predicates.into_iter().reduce(Predicate::or)
    }

    /// Render as a plain JSON tree
    pub fn dump(&self) -> Json {
        match self {
            Predicate::Conditional { op, field, value } => json!({
                "code": CONDITIONAL_CODE,
                "op": op.as_str(),
                "field": field,
                "value": value,
            }),
            Predicate::Boolean { op, lhs, rhs } => json!({
                "code": BOOLEAN_CODE,
                "op": op.as_str(),
                "lhs": lhs.dump(),
                "rhs": rhs.as_ref().map(|r| r.dump()).unwrap_or(Json::Null),
            }),
        }
    }

    /// Rebuild a predicate from its dump, checking field names against `target`
    pub fn load(target: &ResourceType, dump: &Json) -> Result<Predicate> {
        let predicate = Self::load_unchecked(dump)?;
        predicate.validate(target)?;
        Ok(predicate)
    }

    /// Rebuild a predicate from its dump, checking structure only
    pub fn load_unchecked(dump: &Json) -> Result<Predicate> {
        let obj = dump
            .as_object()
            .ok_or_else(|| Error::invalid_predicate("predicate dump must be an object"))?;
        let code = obj
            .get("code")
            .and_then(Json::as_u64)
            .ok_or_else(|| Error::invalid_predicate("missing predicate code"))?;
        let op = obj
            .get("op")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::invalid_predicate("missing predicate op"))?;

        match code {
            CONDITIONAL_CODE => {
                let op = ConditionalOp::parse(op)
                    .ok_or_else(|| Error::invalid_predicate(format!("unknown operator '{}'", op)))?;
                let field = obj
                    .get("field")
                    .and_then(Json::as_str)
                    .ok_or_else(|| Error::invalid_predicate("missing field name"))?;
                let value = obj.get("value").cloned().unwrap_or(Json::Null);
                if op.takes_list() && !value.is_array() {
                    return Err(Error::invalid_predicate(format!(
                        "operator '{}' requires a list value",
                        op.as_str()
                    )));
                }
                Ok(Predicate::conditional(op, field, value))
            }
            BOOLEAN_CODE => {
                let op = BooleanOp::parse(op)
                    .ok_or_else(|| Error::invalid_predicate(format!("unknown operator '{}'", op)))?;
                let lhs = obj
                    .get("lhs")
                    .ok_or_else(|| Error::invalid_predicate("missing lhs"))?;
                let lhs = Self::load_unchecked(lhs)?;
                let rhs = match obj.get("rhs") {
                    None | Some(Json::Null) => None,
                    Some(rhs) => Some(Self::load_unchecked(rhs)?),
                };
                match (op, rhs) {
                    (BooleanOp::Not, None) => Ok(Predicate::negate(lhs)),
                    (BooleanOp::Not, Some(_)) => {
                        Err(Error::invalid_predicate("'not' takes a single operand"))
                    }
                    (_, None) => Err(Error::invalid_predicate(format!(
                        "'{}' requires two operands",
                        op.as_str()
                    ))),
                    (op, Some(rhs)) => Ok(Predicate::Boolean {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Some(Box::new(rhs)),
                    }),
                }
            }
            other => Err(Error::invalid_predicate(format!(
                "unknown predicate code {}",
                other
            ))),
        }
    }

    /// Every compared name must be a field of `target`
    pub fn validate(&self, target: &ResourceType) -> Result<()> {
        for name in self.fields() {
            target.field_resolver(&name)?;
        }
        Ok(())
    }

    /// Base64 of the JSON dump
    pub fn serialize(&self) -> String {
        STANDARD.encode(self.dump().to_string())
    }

    pub fn deserialize(target: &ResourceType, encoded: &str) -> Result<Predicate> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::invalid_predicate(format!("bad base64: {}", e)))?;
        let dump: Json = serde_json::from_slice(&bytes)?;
        Self::load(target, &dump)
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        Predicate::and(self, rhs)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        Predicate::or(self, rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::negate(self)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Conditional { op, field, value } => {
                if let (true, Json::Array(items)) = (op.takes_list(), value) {
                    let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                    write!(f, "{} {} ({})", field, op.symbol(), items.join(", "))
                } else {
                    write!(f, "{} {} {}", field, op.symbol(), value)
                }
            }
            Predicate::Boolean {
                op: BooleanOp::Not,
                lhs,
                ..
            } => write!(f, "not ({})", lhs),
            Predicate::Boolean { op, lhs, rhs } => match rhs {
                Some(rhs) => write!(f, "({} {} {})", lhs, op.as_str(), rhs),
                None => write!(f, "{}", lhs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_empty_and_singleton() {
        assert_eq!(Predicate::reduce_and(Vec::new()), None);
        assert_eq!(Predicate::reduce_or(Vec::new()), None);

        let p = Predicate::gt("age", 5);
        assert_eq!(Predicate::reduce_and(vec![p.clone()]), Some(p.clone()));
        assert_eq!(Predicate::reduce_or(vec![p.clone()]), Some(p));
    }

    #[test]
    fn test_reduce_folds_left() {
        let a = Predicate::eq("a", 1);
        let b = Predicate::eq("b", 2);
        let c = Predicate::eq("c", 3);
        let reduced = Predicate::reduce_and(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(reduced, (a & b) & c);
    }

    #[test]
    fn test_operators() {
        let p = Predicate::eq("color", "red") | !Predicate::lt("age", 3);
        match &p {
            Predicate::Boolean { op, rhs, .. } => {
                assert_eq!(*op, BooleanOp::Or);
                assert!(matches!(
                    rhs.as_deref(),
                    Some(Predicate::Boolean { op: BooleanOp::Not, .. })
                ));
            }
            _ => panic!("expected boolean"),
        }
        assert_eq!(
            p.fields().into_iter().collect::<Vec<_>>(),
            vec!["age".to_string(), "color".to_string()]
        );
    }

    #[test]
    fn test_dump_shape() {
        let p = Predicate::gt("age", 5) & Predicate::including("color", ["red", "blue"]);
        let dump = p.dump();
        assert_eq!(dump["code"], 1);
        assert_eq!(dump["op"], "and");
        assert_eq!(dump["lhs"]["code"], 2);
        assert_eq!(dump["lhs"]["op"], "gt");
        assert_eq!(dump["lhs"]["field"], "age");
        assert_eq!(dump["rhs"]["value"], json!(["red", "blue"]));
    }

    #[test]
    fn test_load_unchecked_roundtrip() {
        let p = !(Predicate::eq("a", 1) | Predicate::leq("b", 2.5));
        assert_eq!(Predicate::load_unchecked(&p.dump()).unwrap(), p);
    }

    #[test]
    fn test_load_rejects_bad_structure() {
        let bad = [
            json!({"code": 9, "op": "eq", "field": "a", "value": 1}),
            json!({"code": 2, "op": "like", "field": "a", "value": 1}),
            json!({"code": 2, "op": "in", "field": "a", "value": 1}),
            json!({"code": 1, "op": "and", "lhs": {"code": 2, "op": "eq", "field": "a", "value": 1}}),
            json!("eq"),
        ];
        for dump in bad {
            let err = Predicate::load_unchecked(&dump).unwrap_err();
            assert_eq!(err.code(), "BINDERY_INVALID_PREDICATE", "{}", dump);
        }
    }

    #[test]
    fn test_display() {
        let p = Predicate::geq("age", 3)
            & (Predicate::eq("color", "red") | Predicate::including("color", ["blue"]));
        assert_eq!(
            p.to_string(),
            r#"(age >= 3 and (color == "red" or color in ("blue")))"#
        );
        assert_eq!((!Predicate::eq("a", 1)).to_string(), "not (a == 1)");
    }

    #[test]
    fn test_negate_op() {
        assert_eq!(ConditionalOp::Gt.negate(), ConditionalOp::Leq);
        assert_eq!(ConditionalOp::In.negate(), ConditionalOp::Ex);
    }
}
