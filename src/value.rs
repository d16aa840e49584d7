//! Resolved attribute values
//!
//! Every attribute read from a [`Resource`] is one of four shapes. Scalars
//! are plain JSON; related objects are shared handles, so two reads of the
//! same cached relationship compare equal by identity.

use std::fmt;

use serde_json::Value as Json;

use crate::batch::Batch;
use crate::resource::Resource;

/// The value of one resolver on one resource
#[derive(Clone, Default)]
pub enum Value {
    /// Absent or null
    #[default]
    Null,
    /// Any non-null JSON value (field values, computed scalars)
    Scalar(Json),
    /// A single related resource
    Resource(Resource),
    /// A collection of related resources
    Batch(Batch),
}

impl Value {
    /// Wrap a JSON value, normalizing JSON null to [`Value::Null`]
    pub fn from_json(json: Json) -> Self {
        if json.is_null() {
            Value::Null
        } else {
            Value::Scalar(json)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the scalar payload
    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Value::Scalar(json) => Some(json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Json::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Json::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(Json::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Json::as_bool)
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Value::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn as_batch(&self) -> Option<&Batch> {
        match self {
            Value::Batch(batch) => Some(batch),
            _ => None,
        }
    }

    /// Scalar view used by storage and predicates; related objects have none
    pub fn to_json(&self) -> Json {
        match self {
            Value::Scalar(json) => json.clone(),
            _ => Json::Null,
        }
    }

    /// Full JSON rendering, recursing into related objects
    pub fn dump(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Scalar(json) => json.clone(),
            Value::Resource(resource) => resource.dump(),
            Value::Batch(batch) => batch.dump(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Resource(a), Value::Resource(b)) => a.ptr_eq(b),
            (Value::Batch(a), Value::Batch(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Scalar(json) => write!(f, "Scalar({})", json),
            Value::Resource(resource) => write!(f, "Resource({:?})", resource),
            Value::Batch(batch) => write!(f, "Batch({:?})", batch),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::from_json(json)
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        Value::Resource(resource)
    }
}

impl From<Batch> for Value {
    fn from(batch: Batch) -> Self {
        Value::Batch(batch)
    }
}

impl From<Option<Resource>> for Value {
    fn from(resource: Option<Resource>) -> Self {
        resource.map(Value::Resource).unwrap_or(Value::Null)
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::from_json(Json::from(v))
                }
            }
        )*
    };
}

scalar_from!(&str, String, i32, i64, u32, u64, f64, bool);
