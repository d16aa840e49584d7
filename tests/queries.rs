//! Query, predicate and batch tests
//!
//! - Predicate reduction identity and dump/load round trip
//! - Indexed batch filtering agrees with a linear scan
//! - Query building, rendering and paging

use std::sync::Arc;

use bindery::store::{MemoryStore, RecordingStore, StoreMethod};
use bindery::{Batch, Config, Field, OrderBy, Predicate, Query, Registry, ResourceDef, ResourceType};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn dog_type_with(config: Config) -> (ResourceType, Arc<RecordingStore<MemoryStore>>) {
    let store = Arc::new(RecordingStore::new(MemoryStore::new()));
    let registry = Registry::builder()
        .config(config)
        .define(
            ResourceDef::new("Dog")
                .field(Field::string("name"))
                .field(Field::int("age"))
                .field(Field::string("color")),
        )
        .bind("Dog", store.clone())
        .build()
        .unwrap();
    (registry.resource_type("Dog").unwrap(), store)
}

fn seeded() -> (ResourceType, Arc<RecordingStore<MemoryStore>>) {
    let (dog, store) = dog_type_with(Config::default());
    let rows = [
        ("d1", "Rex", 3, "red"),
        ("d2", "Fido", 7, "blue"),
        ("d3", "Spot", 5, "green"),
        ("d4", "Max", 1, "red"),
        ("d5", "Bella", 9, "black"),
        ("d6", "Luna", 5, "blue"),
    ];
    let dogs: Vec<_> = rows
        .iter()
        .map(|(id, name, age, color)| {
            dog.new_resource(json!({"_id": id, "name": name, "age": age, "color": color}))
                .unwrap()
        })
        .collect();
    dog.create_many(&dogs).unwrap();
    store.clear();
    (dog, store)
}

fn sample_predicates() -> Vec<Predicate> {
    vec![
        Predicate::eq("color", "red"),
        Predicate::neq("color", "red"),
        Predicate::gt("age", 3),
        Predicate::geq("age", 5),
        Predicate::lt("age", 5),
        Predicate::leq("age", 3),
        Predicate::including("color", ["blue", "green"]),
        Predicate::excluding("name", ["Rex", "Luna"]),
        Predicate::gt("age", 2) & Predicate::eq("color", "blue"),
        Predicate::eq("color", "black") | Predicate::lt("age", 2),
        !Predicate::eq("color", "red"),
        !(Predicate::geq("age", 5) | Predicate::eq("name", "Rex")),
        Predicate::eq("age", "5"),
        Predicate::gt("name", 3),
    ]
}

// =============================================================================
// Predicates
// =============================================================================

#[test]
fn test_reduce_identity() {
    let p = Predicate::gt("age", 3);
    assert_eq!(Predicate::reduce_and([p.clone()]), Some(p.clone()));
    assert_eq!(Predicate::reduce_or([p.clone()]), Some(p));
    assert_eq!(Predicate::reduce_and(Vec::<Predicate>::new()), None);
}

#[test]
fn test_dump_load_roundtrip() {
    let (dog, _) = seeded();
    for predicate in sample_predicates() {
        let loaded = Predicate::load(&dog, &predicate.dump()).unwrap();
        assert_eq!(loaded, predicate);
        let decoded = Predicate::deserialize(&dog, &predicate.serialize()).unwrap();
        assert_eq!(decoded, predicate);
    }
}

#[test]
fn test_load_checks_field_names() {
    let (dog, _) = seeded();
    let dump = Predicate::eq("weight", 3).dump();
    assert!(Predicate::load(&dog, &dump).is_err());
    assert!(Predicate::load_unchecked(&dump).is_ok());
}

#[test]
fn test_textual_filter() {
    let (dog, _) = seeded();
    let batch = dog
        .filter("age >= 3 and (color == 'red' or color in ('blue', 'green'))")
        .unwrap()
        .order_by_str("_id")
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(batch.ids(), vec!["d1", "d2", "d3", "d6"]);
}

// =============================================================================
// Batch Indexes
// =============================================================================

/// Index lookups and linear scans select the same members in the same order.
#[test]
fn test_index_agrees_with_linear_scan() {
    let (dog, _) = seeded();
    let stored = dog.get_all().unwrap();
    let indexed = Batch::with_indexing(&dog, true);
    let plain = Batch::with_indexing(&dog, false);
    indexed.extend(stored.members()).unwrap();
    plain.extend(stored.members()).unwrap();
    assert!(indexed.is_indexed());
    assert!(!plain.is_indexed());

    for predicate in sample_predicates() {
        let a = indexed.where_(&predicate).unwrap();
        let b = plain.where_(&predicate).unwrap();
        assert_eq!(a.ids(), b.ids(), "mismatch for {}", predicate);

        let expected = dog
            .where_(predicate.clone())
            .unwrap()
            .order_by_str("_id")
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(a.ids(), expected.ids(), "store mismatch for {}", predicate);
    }
}

#[test]
fn test_index_follows_membership_changes() {
    let (dog, _) = seeded();
    let batch = dog.get_all().unwrap();
    assert!(batch.is_indexed());
    let red = Predicate::eq("color", "red");
    assert_eq!(batch.where_(&red).unwrap().len(), 2);

    let rex = batch.first().unwrap();
    assert!(batch.remove(&rex));
    assert_eq!(batch.where_(&red).unwrap().ids(), vec!["d4"]);

    batch.push_front(rex.clone()).unwrap();
    assert_eq!(batch.where_(&red).unwrap().ids(), vec!["d1", "d4"]);

    rex.set("color", json!("white")).unwrap();
    batch.reindex();
    assert_eq!(batch.where_(&red).unwrap().ids(), vec!["d4"]);
}

/// Fields the batch loads or sets itself are visible to its indexes.
#[test]
fn test_index_sees_fields_loaded_by_batch() {
    let registry = Registry::builder()
        .define(
            ResourceDef::new("Dog")
                .field(Field::string("name"))
                .field(Field::string("bio").lazy()),
        )
        .build()
        .unwrap();
    let dog = registry.resource_type("Dog").unwrap();
    let dogs = vec![
        dog.new_resource(json!({"_id": "d1", "name": "Rex", "bio": "good"})).unwrap(),
        dog.new_resource(json!({"_id": "d2", "name": "Fido", "bio": "loud"})).unwrap(),
    ];
    dog.create_many(&dogs).unwrap();
    let good = Predicate::eq("bio", "good");

    let batch = dog.query().execute().unwrap();
    assert!(batch.is_indexed());
    assert!(!batch.first().unwrap().is_loaded("bio"));
    batch.resolve(["bio"]).unwrap();

    let plain = Batch::with_indexing(&dog, false);
    plain.extend(batch.members()).unwrap();
    assert_eq!(batch.where_(&good).unwrap().ids(), vec!["d1"]);
    assert_eq!(batch.where_(&good).unwrap().ids(), plain.where_(&good).unwrap().ids());

    let other = dog.query().execute().unwrap();
    other.values("bio").unwrap();
    assert_eq!(other.where_(&good).unwrap().ids(), vec!["d1"]);

    other
        .merge(json!({"bio": "good"}).as_object().cloned().unwrap())
        .unwrap();
    assert_eq!(other.where_(&good).unwrap().ids(), vec!["d1", "d2"]);
}

/// Integers beyond 2^53 stay distinct in indexes, scans and the store.
#[test]
fn test_index_keeps_large_integers_apart() {
    let (dog, _) = dog_type_with(Config::default());
    let dogs = vec![
        dog.new_resource(json!({"_id": "a", "age": 9007199254740993i64})).unwrap(),
        dog.new_resource(json!({"_id": "b", "age": 9007199254740992i64})).unwrap(),
    ];
    dog.create_many(&dogs).unwrap();

    let indexed = dog.get_all().unwrap();
    let plain = Batch::with_indexing(&dog, false);
    plain.extend(indexed.members()).unwrap();

    let predicates = [
        Predicate::eq("age", 9007199254740993i64),
        Predicate::neq("age", 9007199254740993i64),
        Predicate::gt("age", 9007199254740992i64),
        Predicate::leq("age", 9007199254740992.0),
        Predicate::including("age", [9007199254740993i64]),
    ];
    for predicate in predicates {
        let expected = plain.where_(&predicate).unwrap().ids();
        assert_eq!(indexed.where_(&predicate).unwrap().ids(), expected, "{}", predicate);
        let stored = dog.where_(predicate.clone()).unwrap().execute().unwrap();
        assert_eq!(stored.ids(), expected, "store: {}", predicate);
    }
    assert_eq!(
        indexed
            .where_(&Predicate::eq("age", 9007199254740993i64))
            .unwrap()
            .ids(),
        vec!["a"]
    );
}

#[test]
fn test_batch_sort_and_slice() {
    let (dog, _) = seeded();
    let batch = dog.get_all().unwrap();
    batch.sort(&[OrderBy::desc("age"), OrderBy::asc("name")]);
    assert_eq!(batch.ids(), vec!["d5", "d2", "d6", "d3", "d1", "d4"]);

    let top = batch.slice(0..2);
    assert_eq!(top.ids(), vec!["d5", "d2"]);
    assert_eq!(batch.slice(4..100).len(), 2);

    let ages = batch.values("age").unwrap();
    assert_eq!(ages[0].as_i64(), Some(9));
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_query_is_one_store_call() {
    let (dog, store) = seeded();
    let batch = dog
        .where_(Predicate::gt("age", 2))
        .unwrap()
        .order_by_str("age desc")
        .unwrap()
        .offset(1)
        .limit(2)
        .execute()
        .unwrap();
    assert_eq!(batch.ids(), vec!["d2", "d3"]);
    assert_eq!(store.history().len(), 1);
    assert_eq!(store.calls(StoreMethod::Query), 1);
}

#[test]
fn test_limit_and_offset_are_clamped() {
    let (dog, _) = seeded();
    let query = dog.query().limit(0).offset(-4);
    assert_eq!(query.get_limit(), Some(1));
    assert_eq!(query.get_offset(), Some(0));
    assert_eq!(query.execute().unwrap().len(), 1);
}

#[test]
fn test_query_display() {
    let (dog, _) = seeded();
    let query = dog
        .select(["name"])
        .unwrap()
        .where_(Predicate::gt("age", 3))
        .unwrap()
        .order_by([OrderBy::desc("age")])
        .unwrap()
        .limit(10);
    let text = query.to_string();
    assert!(text.starts_with("SELECT name FROM Dog WHERE"));
    assert!(text.ends_with("ORDER BY age DESC LIMIT 10"));
}

#[test]
fn test_execute_first_and_exists() {
    let (dog, _) = seeded();
    let first = dog
        .where_eq("color", "blue")
        .unwrap()
        .order_by_str("age")
        .unwrap()
        .execute_first()
        .unwrap()
        .unwrap();
    assert_eq!(first.id().as_deref(), Some("d6"));
    assert!(dog.where_eq("name", "Bella").unwrap().exists().unwrap());
    assert!(!dog.where_eq("name", "Nobody").unwrap().exists().unwrap());
}

#[test]
fn test_order_by_unknown_field() {
    let (dog, _) = seeded();
    assert!(dog.query().order_by_str("weight").is_err());
    assert!(dog.query().where_str("weight > 3").is_err());
}

#[test]
fn test_default_limit_from_config() {
    let config = Config {
        default_limit: Some(2),
        ..Config::default()
    };
    let (dog, _) = dog_type_with(config);
    let dogs: Vec<_> = (0..4)
        .map(|i| dog.new_resource(json!({"name": format!("dog{}", i)})).unwrap())
        .collect();
    dog.create_many(&dogs).unwrap();
    assert_eq!(dog.query().execute().unwrap().len(), 2);
    assert_eq!(dog.get_all().unwrap().len(), 4);
}

#[test]
fn test_from_keys() {
    let (dog, _) = seeded();
    let query = Query::from_keys(&dog, ["name", "age"]).unwrap().eager(false);
    let batch = query.execute().unwrap();
    let rex = batch.members().into_iter().find(|d| d.id().as_deref() == Some("d1")).unwrap();
    assert!(rex.is_loaded("name"));
    assert!(!rex.is_loaded("color"));

    assert!(Query::from_keys(&dog, ["owner.name"]).is_err());
}
