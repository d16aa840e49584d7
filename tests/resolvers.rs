//! Resolver and resource state tests
//!
//! - Resolving an attribute twice yields the same value and one load
//! - Field loading is amortized across a batch
//! - Dirty tracking through set, create, update and reload

use std::sync::Arc;

use bindery::store::{MemoryStore, RecordingStore, StoreMethod};
use bindery::{Field, Registry, Resolver, ResourceDef, ResourceType, Value};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn recording() -> Arc<RecordingStore<MemoryStore>> {
    Arc::new(RecordingStore::new(MemoryStore::new()))
}

fn dog_type(store: Arc<RecordingStore<MemoryStore>>) -> ResourceType {
    let registry = Registry::builder()
        .define(
            ResourceDef::new("Dog")
                .field(Field::string("name").required())
                .field(Field::int("age"))
                .field(Field::string("bio").lazy())
                .resolver(Resolver::computed("label", |dog, _| {
                    let name = dog.get("name")?;
                    Ok(Value::from(json!(format!(
                        "dog:{}",
                        name.as_str().unwrap_or("?")
                    ))))
                })),
        )
        .bind("Dog", store)
        .build()
        .unwrap();
    registry.resource_type("Dog").unwrap()
}

fn seed(dog: &ResourceType, count: usize) {
    let dogs: Vec<_> = (0..count)
        .map(|i| {
            dog.new_resource(json!({
                "_id": format!("d{}", i),
                "name": format!("dog{}", i),
                "age": i,
                "bio": format!("bio of dog{}", i),
            }))
            .unwrap()
        })
        .collect();
    dog.create_many(&dogs).unwrap();
}

// =============================================================================
// Idempotence
// =============================================================================

/// A second read returns the cached value without touching the store.
#[test]
fn test_resolving_twice_is_idempotent() {
    let store = recording();
    let dog = dog_type(store.clone());
    seed(&dog, 3);

    let batch = dog.query().execute().unwrap();
    let first = batch.first().unwrap();
    assert!(!first.is_loaded("bio"));

    store.clear();
    let a = first.get("bio").unwrap();
    let b = first.get("bio").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_str(), Some("bio of dog0"));
    assert_eq!(store.calls(StoreMethod::Fetch), 1);
    assert_eq!(store.history().len(), 1);
}

/// Computed values are cached like any other attribute.
#[test]
fn test_computed_value_cached() {
    let store = recording();
    let dog = dog_type(store.clone());
    let rex = dog.new_resource(json!({"name": "Rex"})).unwrap();

    assert_eq!(rex.get("label").unwrap(), Value::from(json!("dog:Rex")));
    assert!(rex.is_loaded("label"));
    rex.set("name", json!("Max")).unwrap();
    assert_eq!(rex.get("label").unwrap(), Value::from(json!("dog:Rex")));

    rex.unload(["label"]);
    assert_eq!(rex.get("label").unwrap(), Value::from(json!("dog:Max")));
    assert!(store.history().is_empty());
}

/// The transformed value is what every later read returns.
#[test]
fn test_post_execute_value_is_cached() {
    let registry = Registry::builder()
        .define(
            ResourceDef::new("Dog")
                .field(Field::string("name"))
                .resolver(
                    Resolver::computed("shout", |dog, _| {
                        let name = dog.get("name")?;
                        Ok(Value::from(json!(name.as_str().unwrap_or("").to_string())))
                    })
                    .post_execute(|_, value| {
                        Ok(Value::from(json!(value.as_str().unwrap_or("").to_uppercase())))
                    }),
                ),
        )
        .build()
        .unwrap();
    let dog = registry.resource_type("Dog").unwrap();

    let rex = dog.new_resource(json!({"name": "rex"})).unwrap();
    assert_eq!(rex.get("shout").unwrap().as_str(), Some("REX"));
    assert_eq!(rex.get("shout").unwrap().as_str(), Some("REX"));

    let dogs = vec![
        dog.new_resource(json!({"name": "fido"})).unwrap(),
        dog.new_resource(json!({"name": "max"})).unwrap(),
    ];
    dog.create_many(&dogs).unwrap();
    let batch = dog.query().execute().unwrap();
    batch.resolve(["shout"]).unwrap();
    let shouts: Vec<_> = batch
        .members()
        .iter()
        .map(|d| d.get("shout").unwrap().as_str().map(str::to_string))
        .collect();
    assert_eq!(shouts, vec![Some("FIDO".to_string()), Some("MAX".to_string())]);
}

// =============================================================================
// Amortized Loading
// =============================================================================

/// Loading a lazy field for a whole batch costs one `fetch_many`.
#[test]
fn test_batch_field_loading_is_amortized() {
    let store = recording();
    let dog = dog_type(store.clone());
    seed(&dog, 5);

    let batch = dog.query().execute().unwrap();
    assert_eq!(batch.len(), 5);

    store.clear();
    batch.resolve(["bio"]).unwrap();
    assert_eq!(store.calls(StoreMethod::FetchMany), 1);
    assert_eq!(store.calls(StoreMethod::Fetch), 0);

    let bios: Vec<_> = batch
        .members()
        .iter()
        .map(|d| d.get("bio").unwrap().as_str().map(str::to_string))
        .collect();
    assert_eq!(bios[4].as_deref(), Some("bio of dog4"));
    assert_eq!(store.history().len(), 1);
}

/// Selecting a lazy field loads it with the query itself.
#[test]
fn test_selected_lazy_field_loads_eagerly() {
    let store = recording();
    let dog = dog_type(store.clone());
    seed(&dog, 2);

    store.clear();
    let batch = dog.select(["bio"]).unwrap().execute().unwrap();
    assert!(batch.members().iter().all(|d| d.is_loaded("bio")));
    assert_eq!(store.history().len(), 1);
    assert_eq!(store.calls(StoreMethod::Query), 1);
}

// =============================================================================
// Dirty Tracking
// =============================================================================

#[test]
fn test_dirty_tracking_roundtrip() {
    let store = recording();
    let dog = dog_type(store.clone());

    let rex = dog.new_resource(json!({"name": "Rex"})).unwrap();
    assert!(!rex.is_created());
    assert!(rex.dirty().contains("name"));

    rex.create().unwrap();
    assert!(rex.is_created());
    assert!(!rex.is_dirty());
    let first_rev = rex.rev();
    assert!(first_rev.is_some());

    rex.set("age", json!(4)).unwrap();
    assert_eq!(rex.dirty().into_iter().collect::<Vec<_>>(), vec!["age".to_string()]);

    store.clear();
    rex.update().unwrap();
    assert!(!rex.is_dirty());
    assert_ne!(rex.rev(), first_rev);

    let history = store.history();
    assert_eq!(history.count(StoreMethod::UpdateMany), 1);
    let written = &history.events()[0].records[0];
    assert_eq!(written.len(), 1);
    assert_eq!(written["age"], json!(4));

    rex.unload_all();
    assert_eq!(rex.loaded(), vec!["_id".to_string()]);
    rex.reload().unwrap();
    assert_eq!(rex.get("age").unwrap().as_i64(), Some(4));
}

/// `require` fails when a resolved value is null.
#[test]
fn test_require_rejects_null() {
    let dog = dog_type(recording());
    let rex = dog.new_resource(json!({"name": "Rex"})).unwrap();
    rex.require(["name"]).unwrap();

    let err = rex.require(["name", "age"]).unwrap_err();
    assert_eq!(err.code(), "BINDERY_VALIDATION_FAILED");
}

/// Unknown attribute names fail immediately.
#[test]
fn test_unknown_resolver() {
    let dog = dog_type(recording());
    let rex = dog.new_resource(json!({"name": "Rex"})).unwrap();
    let err = rex.get("wings").unwrap_err();
    assert_eq!(err.code(), "BINDERY_UNKNOWN_RESOLVER");
    assert!(dog.select(["wings"]).is_err());
}
