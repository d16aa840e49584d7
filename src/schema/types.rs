//! Field and schema definitions
//!
//! Supported types:
//! - string: UTF-8 string, optional regex pattern
//! - int: 64-bit signed integer
//! - float: 64-bit floating point
//! - bool: Boolean
//! - id: string identifier, optionally a foreign key to another type
//! - uuid: UUID, stored as simple lowercase hex
//! - datetime: RFC 3339 timestamp, stored in UTC
//! - list: homogeneous list with element type
//! - object: free-form JSON object

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Primary key field name, fixed across all stores
pub const ID_FIELD: &str = "_id";
/// Revision field name, assigned by the store
pub const REV_FIELD: &str = "_rev";

/// Default-value factory
pub type DefaultFn = Arc<dyn Fn() -> Json + Send + Sync>;
/// Fixture value generator
pub type GeneratorFn = Arc<dyn Fn(&mut StdRng) -> Json + Send + Sync>;

/// Field data types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Int,
    Float,
    Bool,
    Id {
        /// Resource type this id refers to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    Uuid,
    Datetime,
    List {
        element: Box<FieldType>,
    },
    Object,
}

impl FieldType {
    /// Plain string type
    pub fn string() -> Self {
        FieldType::String { pattern: None }
    }

    /// Plain id type
    pub fn id() -> Self {
        FieldType::Id { target: None }
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String { .. } => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Id { .. } => "id",
            FieldType::Uuid => "uuid",
            FieldType::Datetime => "datetime",
            FieldType::List { .. } => "list",
            FieldType::Object => "object",
        }
    }

    /// Whether batches keep an ordered index for fields of this type
    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            FieldType::String { .. }
                | FieldType::Int
                | FieldType::Float
                | FieldType::Bool
                | FieldType::Id { .. }
        )
    }
}

/// A named, typed schema member
#[derive(Clone, Serialize, Deserialize)]
pub struct Field {
    name: String,
    #[serde(flatten)]
    field_type: FieldType,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    lazy: bool,
    /// Constant default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Json>,
    #[serde(skip)]
    default_fn: Option<DefaultFn>,
    #[serde(skip)]
    generator: Option<GeneratorFn>,
}

fn default_nullable() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            required: false,
            private: false,
            lazy: false,
            default: None,
            default_fn: None,
            generator: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::string())
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::id())
    }

    /// Id field referring to another resource type
    pub fn foreign_key(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::Id {
                target: Some(target.into()),
            },
        )
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Uuid)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Datetime)
    }

    pub fn list(name: impl Into<String>, element: FieldType) -> Self {
        Self::new(
            name,
            FieldType::List {
                element: Box::new(element),
            },
        )
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Object)
    }

    /// Restrict a string field to values matching `pattern`
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        if let FieldType::String { pattern: p } = &mut self.field_type {
            *p = Some(pattern.into());
        }
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Required fields must carry a value on create
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Private fields are omitted from dumps
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Lazy fields are not loaded by eager queries
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn default_value(mut self, value: Json) -> Self {
        self.default = Some(value);
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Json + Send + Sync + 'static,
    {
        self.default_fn = Some(Arc::new(factory));
        self
    }

    pub fn generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&mut StdRng) -> Json + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub(crate) fn generator_fn(&self) -> Option<&GeneratorFn> {
        self.generator.as_ref()
    }

    /// Produce the default value, factory first
    pub fn default_for(&self) -> Option<Json> {
        match (&self.default_fn, &self.default) {
            (Some(factory), _) => Some(factory()),
            (None, Some(value)) => Some(value.clone()),
            (None, None) => None,
        }
    }

    /// Type name this id field refers to, if any
    pub fn foreign_target(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::Id { target } => target.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type", &self.field_type)
            .field("nullable", &self.nullable)
            .field("required", &self.required)
            .field("private", &self.private)
            .field("lazy", &self.lazy)
            .finish()
    }
}

/// Ordered field set owned by one resource type
///
/// Always contains `_id` and `_rev`.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<Field>,
    positions: HashMap<String, usize>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        let mut schema = Self {
            fields: Vec::new(),
            positions: HashMap::new(),
        };
        schema.add(
            Field::id(ID_FIELD)
                .nullable(false)
                .default_with(|| Json::String(uuid::Uuid::new_v4().simple().to_string())),
        );
        schema.add(Field::string(REV_FIELD));
        schema
    }

    /// Add a field, replacing any field of the same name in place
    pub fn add(&mut self, field: Field) {
        match self.positions.get(field.name()) {
            Some(&pos) => self.fields[pos] = field,
            None => {
                self.positions.insert(field.name.clone(), self.fields.len());
                self.fields.push(field);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.positions.get(name).map(|&pos| &self.fields[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_has_id_and_rev() {
        let schema = Schema::new();
        assert_eq!(schema.names().collect::<Vec<_>>(), vec![ID_FIELD, REV_FIELD]);
        assert!(!schema.get(ID_FIELD).unwrap().is_nullable());
    }

    #[test]
    fn test_id_default_is_uuid_hex() {
        let schema = Schema::new();
        let id = schema.get(ID_FIELD).unwrap().default_for().unwrap();
        let id = id.as_str().unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_add_replaces_in_place() {
        let mut schema = Schema::new();
        schema.add(Field::string("color"));
        schema.add(Field::int("age"));
        schema.add(Field::int("color"));

        assert_eq!(schema.len(), 4);
        assert_eq!(schema.fields()[2].field_type(), &FieldType::Int);
    }

    #[test]
    fn test_field_deserialize() {
        let field: Field = serde_json::from_value(json!({
            "name": "owner_id",
            "type": "id",
            "target": "Person",
            "nullable": false
        }))
        .unwrap();

        assert_eq!(field.foreign_target(), Some("Person"));
        assert!(!field.is_nullable());
        assert!(!field.is_lazy());
    }

    #[test]
    fn test_list_field_roundtrip() {
        let field = Field::list("tags", FieldType::string()).lazy();
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "list");
        assert_eq!(json["element"]["type"], "string");
        assert_eq!(json["lazy"], true);
    }

    #[test]
    fn test_default_factory_wins() {
        let field = Field::int("n")
            .default_value(json!(1))
            .default_with(|| json!(2));
        assert_eq!(field.default_for(), Some(json!(2)));
    }
}
