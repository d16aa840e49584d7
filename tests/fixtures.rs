//! Fixture generation tests
//!
//! - Backfill pads short results with resources matching the filter
//! - Simulation mode answers queries without touching the store
//! - Seeded registries generate the same fixtures
//! - Inherited types carry their parent's fields and resolvers

use std::io::Write;
use std::sync::Arc;

use bindery::store::{MemoryStore, RecordingStore};
use bindery::{Backfill, Config, Field, Predicate, Registry, ResourceDef, ResourceType};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn dog_def() -> ResourceDef {
    ResourceDef::new("Dog")
        .field(Field::string("name"))
        .field(Field::int("age"))
        .field(Field::string("color"))
}

fn dog_type(config: Config) -> (ResourceType, Arc<RecordingStore<MemoryStore>>) {
    let store = Arc::new(RecordingStore::new(MemoryStore::new()));
    let registry = Registry::builder()
        .config(config)
        .define(dog_def())
        .bind("Dog", store.clone())
        .build()
        .unwrap();
    (registry.resource_type("Dog").unwrap(), store)
}

fn seed_two(dog: &ResourceType) {
    let dogs = vec![
        dog.new_resource(json!({"name": "Rex", "age": 3, "color": "red"})).unwrap(),
        dog.new_resource(json!({"name": "Fido", "age": 8, "color": "red"})).unwrap(),
    ];
    dog.create_many(&dogs).unwrap();
}

// =============================================================================
// Backfill
// =============================================================================

/// Ephemeral backfill fills up to the limit without writing.
#[test]
fn test_ephemeral_backfill() {
    let (dog, _) = dog_type(Config::default().with_seed(1));
    seed_two(&dog);

    let batch = dog
        .where_(Predicate::eq("color", "red") & Predicate::geq("age", 2))
        .unwrap()
        .limit(5)
        .backfill(Backfill::Ephemeral)
        .execute()
        .unwrap();

    assert_eq!(batch.len(), 5);
    assert_eq!(dog.count().unwrap(), 2);
    for member in batch.members() {
        assert_eq!(member.get("color").unwrap().as_str(), Some("red"));
        assert!(member.get("age").unwrap().as_i64().unwrap() >= 2);
    }
    let generated: Vec<_> = batch.members().into_iter().filter(|m| !m.is_created()).collect();
    assert_eq!(generated.len(), 3);
    assert_eq!(dog.registry().metrics().resources_backfilled, 3);
}

/// Persistent backfill creates the generated resources.
#[test]
fn test_persistent_backfill() {
    let (dog, _) = dog_type(Config::default().with_seed(2));
    seed_two(&dog);

    let batch = dog
        .where_eq("color", "blue")
        .unwrap()
        .limit(4)
        .backfill(Backfill::Persistent)
        .execute()
        .unwrap();

    assert_eq!(batch.len(), 4);
    assert!(batch.members().iter().all(|m| m.is_created()));
    assert_eq!(dog.count().unwrap(), 6);
    assert_eq!(dog.where_eq("color", "blue").unwrap().execute().unwrap().len(), 4);
}

/// Without a limit, an empty result is padded with 1..=backfill_max fixtures.
#[test]
fn test_backfill_without_limit() {
    let config = Config {
        backfill_max: 3,
        ..Config::default()
    };
    let (dog, _) = dog_type(config);
    let batch = dog
        .query()
        .backfill(Backfill::Ephemeral)
        .execute()
        .unwrap();
    assert!((1..=3).contains(&batch.len()));

    seed_two(&dog);
    let batch = dog
        .query()
        .backfill(Backfill::Ephemeral)
        .execute()
        .unwrap();
    assert_eq!(batch.len(), 2);
}

// =============================================================================
// Simulation
// =============================================================================

#[test]
fn test_simulation_skips_store() {
    let (dog, store) = dog_type(Config::simulation().with_seed(3));
    let batch = dog
        .where_(Predicate::including("color", ["red", "blue"]) & Predicate::lt("age", 4))
        .unwrap()
        .order_by_str("age")
        .unwrap()
        .limit(6)
        .execute()
        .unwrap();

    assert_eq!(batch.len(), 6);
    assert!(store.history().is_empty());

    let mut last = i64::MIN;
    for member in batch.members() {
        assert!(!member.is_dirty());
        let color = member.get("color").unwrap();
        assert!(matches!(color.as_str(), Some("red") | Some("blue")));
        let age = member.get("age").unwrap().as_i64().unwrap();
        assert!(age < 4);
        assert!(age >= last);
        last = age;
    }
}

#[test]
fn test_seeded_generation_is_deterministic() {
    let (a, _) = dog_type(Config::default().with_seed(42));
    let (b, _) = dog_type(Config::default().with_seed(42));
    let first: Vec<_> = (0..3).map(|_| a.generate().unwrap().dump()).collect();
    let second: Vec<_> = (0..3).map(|_| b.generate().unwrap().dump()).collect();
    assert_eq!(first, second);
}

// =============================================================================
// Inheritance and Configuration
// =============================================================================

#[test]
fn test_inherited_fields_and_relationships() {
    let registry = Registry::builder()
        .define(
            ResourceDef::new("Animal")
                .field(Field::string("name"))
                .join("owner", "owner_id", "Person._id", false)
                .field(Field::foreign_key("owner_id", "Person")),
        )
        .define(
            ResourceDef::new("Puppy")
                .extends("Animal")
                .field(Field::int("weeks")),
        )
        .define(ResourceDef::new("Person").field(Field::string("name")))
        .build()
        .unwrap();

    let animal = registry.resource_type("Animal").unwrap();
    let puppy = registry.resource_type("Puppy").unwrap();
    let person = registry.resource_type("Person").unwrap();
    assert!(puppy.is_subtype_of(&animal));
    assert!(puppy.schema().contains("name"));
    assert!(puppy.schema().contains("weeks"));
    assert!(!animal.schema().contains("weeks"));

    let alice = person.new_resource(json!({"name": "Alice"})).unwrap();
    alice.create().unwrap();
    let pup = puppy
        .new_resource(json!({"name": "Bit", "weeks": 9, "owner_id": alice.id()}))
        .unwrap();
    pup.create().unwrap();

    let fetched = puppy.get(&pup.id().unwrap()).unwrap().unwrap();
    let owner = fetched.get("owner").unwrap();
    assert_eq!(owner.as_resource().unwrap().id(), alice.id());
    assert_eq!(animal.count().unwrap(), 0);
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"mode": "simulation", "backfill_max": 4, "seed": 9, "index_batches": false}}"#
    )
    .unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert!(config.is_simulation());
    assert_eq!(config.backfill_max, 4);
    assert_eq!(config.seed, Some(9));

    let (dog, _) = dog_type(config);
    let batch = dog.query().execute().unwrap();
    assert!((1..=4).contains(&batch.len()));
    assert!(!batch.is_indexed());
}

#[test]
fn test_invalid_config_rejected() {
    assert!(Config::from_json_str(r#"{"backfill_max": 0}"#).is_err());
    assert!(Config::from_json_str(r#"{"mode": "turbo"}"#).is_err());
}
