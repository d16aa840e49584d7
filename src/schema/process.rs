//! Field value coercion
//!
//! `process` validates a value against its field and returns the
//! normalized form that is written to the store. Coercion is limited to
//! lossless conversions (numeric strings, integral floats, epoch seconds).

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use serde_json::Value as Json;

use super::errors::FieldError;
use super::types::{Field, FieldType};

impl Field {
    /// Validate and normalize a value for this field
    pub fn process(&self, value: &Json) -> Result<Json, FieldError> {
        if value.is_null() {
            return if self.is_nullable() {
                Ok(Json::Null)
            } else {
                Err(FieldError::null())
            };
        }
        coerce(self.field_type(), value)
    }

    /// Check the definition itself (pattern compiles, list element sane)
    pub fn check(&self) -> Result<(), String> {
        check_type(self.field_type())
    }
}

fn check_type(field_type: &FieldType) -> Result<(), String> {
    match field_type {
        FieldType::String {
            pattern: Some(pattern),
        } => Regex::new(pattern)
            .map(|_| ())
            .map_err(|e| format!("invalid pattern '{}': {}", pattern, e)),
        FieldType::List { element } => check_type(element),
        _ => Ok(()),
    }
}

fn describe(value: &Json) -> String {
    let text = value.to_string();
    if text.len() > 40 {
        format!("{}...", &text[..text.char_indices().nth(37).map_or(text.len(), |(i, _)| i)])
    } else {
        text
    }
}

fn mismatch(field_type: &FieldType, value: &Json) -> FieldError {
    FieldError::new(field_type.type_name(), describe(value))
}

fn coerce(field_type: &FieldType, value: &Json) -> Result<Json, FieldError> {
    match field_type {
        FieldType::String { pattern } => {
            let s = value.as_str().ok_or_else(|| mismatch(field_type, value))?;
            if let Some(pattern) = pattern {
                let re = Regex::new(&format!("^(?:{})$", pattern))
                    .map_err(|_| FieldError::new("valid pattern", pattern.clone()))?;
                if !re.is_match(s) {
                    return Err(FieldError::new(
                        format!("string matching /{}/", pattern),
                        describe(value),
                    ));
                }
            }
            Ok(value.clone())
        }
        FieldType::Int => coerce_int(value).ok_or_else(|| mismatch(field_type, value)),
        FieldType::Float => coerce_float(value).ok_or_else(|| mismatch(field_type, value)),
        FieldType::Bool => match value {
            Json::Bool(_) => Ok(value.clone()),
            Json::String(s) if s == "true" => Ok(Json::Bool(true)),
            Json::String(s) if s == "false" => Ok(Json::Bool(false)),
            _ => Err(mismatch(field_type, value)),
        },
        FieldType::Id { .. } => match value {
            Json::String(s) if !s.is_empty() => Ok(value.clone()),
            Json::Number(n) if n.is_i64() || n.is_u64() => Ok(Json::String(n.to_string())),
            _ => Err(mismatch(field_type, value)),
        },
        FieldType::Uuid => value
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|u| Json::String(u.simple().to_string()))
            .ok_or_else(|| mismatch(field_type, value)),
        FieldType::Datetime => coerce_datetime(value).ok_or_else(|| mismatch(field_type, value)),
        FieldType::List { element } => {
            let items = value.as_array().ok_or_else(|| mismatch(field_type, value))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if item.is_null() {
                        return Err(FieldError::new(
                            format!("non-null {} at [{}]", element.type_name(), i),
                            "null",
                        ));
                    }
                    coerce(element, item).map_err(|e| {
                        FieldError::new(format!("{} at [{}]", e.expected, i), e.actual)
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array)
        }
        FieldType::Object => {
            if value.is_object() {
                Ok(value.clone())
            } else {
                Err(mismatch(field_type, value))
            }
        }
    }
}

fn coerce_int(value: &Json) -> Option<Json> {
    match value {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Json::from(i))
            } else if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(Json::from(f as i64))
                } else {
                    None
                }
            } else {
                None
            }
        }
        Json::String(s) => s.trim().parse::<i64>().ok().map(Json::from),
        _ => None,
    }
}

fn coerce_float(value: &Json) -> Option<Json> {
    let f = match value {
        Json::Number(n) => n.as_f64()?,
        Json::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    serde_json::Number::from_f64(f).map(Json::Number)
}

fn coerce_datetime(value: &Json) -> Option<Json> {
    let dt: DateTime<Utc> = match value {
        Json::String(s) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
        Json::Number(n) => Utc.timestamp_opt(n.as_i64()?, 0).single()?,
        _ => return None,
    };
    Some(Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_handling() {
        assert_eq!(Field::int("n").process(&Json::Null), Ok(Json::Null));
        let err = Field::int("n").nullable(false).process(&Json::Null).unwrap_err();
        assert_eq!(err.actual, "null");
    }

    #[test]
    fn test_int_coercion() {
        let field = Field::int("age");
        assert_eq!(field.process(&json!(3)), Ok(json!(3)));
        assert_eq!(field.process(&json!(3.0)), Ok(json!(3)));
        assert_eq!(field.process(&json!("42")), Ok(json!(42)));
        assert!(field.process(&json!(3.5)).is_err());
        assert!(field.process(&json!("old")).is_err());
        assert!(field.process(&json!(true)).is_err());
    }

    #[test]
    fn test_float_coercion() {
        let field = Field::float("weight");
        assert_eq!(field.process(&json!(2)), Ok(json!(2.0)));
        assert_eq!(field.process(&json!("1.5")), Ok(json!(1.5)));
    }

    #[test]
    fn test_string_pattern() {
        let field = Field::string("code").pattern("[A-Z]{3}");
        assert!(field.process(&json!("ABC")).is_ok());
        assert!(field.process(&json!("ABCD")).is_err());
        assert!(field.process(&json!(12)).is_err());
        assert!(Field::string("x").pattern("(").check().is_err());
    }

    #[test]
    fn test_uuid_normalized() {
        let field = Field::uuid("token");
        let out = field
            .process(&json!("67E55044-10B1-426F-9247-BB680E5FE0C8"))
            .unwrap();
        assert_eq!(out, json!("67e5504410b1426f9247bb680e5fe0c8"));
    }

    #[test]
    fn test_datetime_normalized_to_utc() {
        let field = Field::datetime("born");
        assert_eq!(
            field.process(&json!("2020-01-01T02:00:00+02:00")),
            Ok(json!("2020-01-01T00:00:00Z"))
        );
        assert_eq!(field.process(&json!(0)), Ok(json!("1970-01-01T00:00:00Z")));
        assert!(field.process(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_list_elements() {
        let field = Field::list("scores", FieldType::Int);
        assert_eq!(field.process(&json!([1, "2"])), Ok(json!([1, 2])));

        let err = field.process(&json!([1, "x"])).unwrap_err();
        assert_eq!(err.expected, "int at [1]");
    }

    #[test]
    fn test_id_accepts_integers() {
        let field = Field::id("ref");
        assert_eq!(field.process(&json!(7)), Ok(json!("7")));
        assert!(field.process(&json!("")).is_err());
    }
}
