//! Write path tests
//!
//! - Created resources read back with the same values
//! - Bulk updates issue one store call per dirty-field set
//! - Validation errors are collected for the whole batch

use std::sync::Arc;

use bindery::store::{MemoryStore, RecordingStore, StoreMethod};
use bindery::{Error, Field, Registry, ResourceDef, ResourceType, Value};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn dog_type(store: Arc<RecordingStore<MemoryStore>>) -> ResourceType {
    let registry = Registry::builder()
        .define(
            ResourceDef::new("Dog")
                .field(Field::string("name").required())
                .field(Field::int("age"))
                .field(Field::string("color").nullable(false))
                .field(Field::string("secret").private())
                .join("owner", "owner_id", "Person._id", false)
                .field(Field::foreign_key("owner_id", "Person")),
        )
        .define(ResourceDef::new("Person").field(Field::string("name")))
        .bind("Dog", store)
        .build()
        .unwrap();
    registry.resource_type("Dog").unwrap()
}

fn recording() -> Arc<RecordingStore<MemoryStore>> {
    Arc::new(RecordingStore::new(MemoryStore::new()))
}

// =============================================================================
// Create / Get
// =============================================================================

#[test]
fn test_create_then_get() {
    let dog = dog_type(recording());
    let rex = dog
        .new_resource(json!({"name": "Rex", "age": "4", "color": "brown"}))
        .unwrap();
    rex.create().unwrap();
    let id = rex.id().unwrap();

    let fetched = dog.get(&id).unwrap().expect("stored");
    assert!(!fetched.ptr_eq(&rex));
    assert_eq!(fetched.get("name").unwrap().as_str(), Some("Rex"));
    // numeric strings are coerced on write
    assert_eq!(fetched.get("age").unwrap().as_i64(), Some(4));
    assert_eq!(fetched.rev(), rex.rev());
    assert!(!fetched.is_dirty());

    assert!(dog.exists(&id).unwrap());
    assert_eq!(dog.count().unwrap(), 1);
    assert!(dog.get("missing").unwrap().is_none());
}

#[test]
fn test_get_many_keeps_requested_order() {
    let dog = dog_type(recording());
    let dogs: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| dog.new_resource(json!({"_id": id, "name": id})).unwrap())
        .collect();
    dog.create_many(&dogs).unwrap();

    let ids = vec!["c".to_string(), "zz".to_string(), "a".to_string()];
    let batch = dog.get_many(&ids).unwrap();
    assert_eq!(batch.ids(), vec!["c".to_string(), "a".to_string()]);
}

#[test]
fn test_dump_hides_private_fields() {
    let dog = dog_type(recording());
    let rex = dog
        .new_resource(json!({"name": "Rex", "secret": "bones under the porch"}))
        .unwrap();
    let dump = rex.dump();
    assert_eq!(dump["name"], json!("Rex"));
    assert!(dump.get("secret").is_none());
}

// =============================================================================
// Bulk Updates
// =============================================================================

/// Three distinct dirty-field sets become three `update_many` calls.
#[test]
fn test_update_many_partitions_by_dirty_fields() {
    let store = recording();
    let dog = dog_type(store.clone());
    let dogs: Vec<_> = (0..6)
        .map(|i| dog.new_resource(json!({"name": format!("dog{}", i)})).unwrap())
        .collect();
    dog.create_many(&dogs).unwrap();

    dogs[0].set("age", json!(1)).unwrap();
    dogs[1].set("age", json!(2)).unwrap();
    dogs[2].set("name", json!("renamed")).unwrap();
    dogs[3].set("name", json!("renamed too")).unwrap();
    dogs[3].set("age", json!(3)).unwrap();
    dogs[4].set("age", json!(5)).unwrap();
    dogs[4].set("name", json!("also renamed")).unwrap();
    // dogs[5] stays clean

    store.clear();
    dog.update_many(&dogs).unwrap();
    assert_eq!(store.calls(StoreMethod::UpdateMany), 3);
    assert!(dogs.iter().all(|d| !d.is_dirty()));

    let stored = dog.get(&dogs[3].id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.get("name").unwrap().as_str(), Some("renamed too"));
    assert_eq!(stored.get("age").unwrap().as_i64(), Some(3));
}

#[test]
fn test_update_of_uncreated_is_unsupported() {
    let dog = dog_type(recording());
    let rex = dog.new_resource(json!({"name": "Rex"})).unwrap();
    assert_eq!(rex.update().unwrap_err().code(), "BINDERY_UNSUPPORTED");
}

// =============================================================================
// Validation
// =============================================================================

/// Every failing record and field is reported, and nothing is written.
#[test]
fn test_validation_errors_are_collected() {
    let store = recording();
    let dog = dog_type(store.clone());
    let good = dog.new_resource(json!({"_id": "good", "name": "Rex"})).unwrap();
    let bad_age = dog
        .new_resource(json!({"_id": "bad1", "name": "Fido", "age": "old"}))
        .unwrap();
    let no_name = dog.new_resource(json!({"_id": "bad2", "age": 3})).unwrap();

    let err = dog.create_many(&[good, bad_age, no_name]).unwrap_err();
    match err {
        Error::Validation(validation) => {
            assert_eq!(validation.type_name, "Dog");
            assert_eq!(validation.records.len(), 2);
            assert!(validation.field_error("bad1", "age").is_some());
            assert!(validation.field_error("bad2", "name").is_some());
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(store.calls(StoreMethod::CreateMany), 0);
    assert_eq!(dog.count().unwrap(), 0);
}

/// Null on a non-nullable optional field is dropped rather than written.
#[test]
fn test_null_on_non_nullable_is_dropped() {
    let dog = dog_type(recording());
    let rex = dog
        .new_resource(json!({"name": "Rex", "color": null}))
        .unwrap();
    rex.create().unwrap();
    let stored = dog.get(&rex.id().unwrap()).unwrap().unwrap();
    assert!(stored.get("color").unwrap().is_null());
    assert_eq!(stored.peek_json("color"), json!(null));
}

// =============================================================================
// Save and Delete
// =============================================================================

/// Saving with depth 1 creates loaded related resources too.
#[test]
fn test_save_cascades_to_related() {
    let dog = dog_type(recording());
    let person = dog.resolver_target("owner").unwrap();
    let alice = person.new_resource(json!({"name": "Alice"})).unwrap();
    let rex = dog.new_resource(json!({"name": "Rex"})).unwrap();
    rex.set("owner", alice.clone()).unwrap();

    rex.save_depth(1).unwrap();
    assert!(rex.is_created());
    assert!(alice.is_created());
    assert_eq!(person.count().unwrap(), 1);

    rex.set("age", json!(9)).unwrap();
    rex.save().unwrap();
    assert_eq!(dog.count().unwrap(), 1);
    let stored = dog.get(&rex.id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.get("age").unwrap(), Value::from(9i64));
}

#[test]
fn test_delete_forgets_identity() {
    let dog = dog_type(recording());
    let rex = dog.new_resource(json!({"name": "Rex"})).unwrap();
    rex.create().unwrap();
    let id = rex.id().unwrap();

    rex.delete().unwrap();
    assert!(!rex.is_created());
    assert!(!dog.exists(&id).unwrap());
    assert!(rex.dirty().contains("name"));

    // a deleted resource can be created again
    rex.create().unwrap();
    assert_eq!(dog.count().unwrap(), 1);
}
