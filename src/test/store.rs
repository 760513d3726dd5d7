use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::*;

fn setup_store(name: &str) -> Result<EntityStore> {
    EntityStore::new(&CollectionRegistry::new(), StoreConfig::new(name))
}

// Strip the engine-assigned key so records compare on application fields
fn app_view(record: &Record) -> Record {
    let mut record = record.clone();
    record.remove(SURROGATE_KEY);
    record
}

#[test]
fn test_add_then_get_by_business_key() -> Result<()> {
    let mut store = setup_store("tasks")?;

    let outcome = store.add(record!({ "id": 1, "name": "write docs" }));
    assert!(matches!(outcome, AddOutcome::Added(_)));

    let stored = store.get(1).expect("record should be stored");
    assert_eq!(app_view(&stored), record!({ "id": 1, "name": "write docs" }));
    assert!(stored.contains_key(SURROGATE_KEY));
    Ok(())
}

#[test]
fn test_duplicate_add_is_a_no_op() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.add(record!({ "id": 1, "name": "first" }));

    let outcome = store.add(record!({ "id": 1, "name": "second" }));

    match outcome {
        AddOutcome::AlreadyExists(existing) => assert_eq!(existing["name"], "first"),
        other => panic!("Expected AlreadyExists, got {:?}", other),
    }
    assert_eq!(store.find(&Query::All).len(), 1);
    assert_eq!(store.get(1).unwrap()["name"], "first");
    Ok(())
}

#[test]
fn test_add_with_stale_surrogate_key_still_checks_business_key() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.add(record!({ "id": 1 }));

    let outcome = store.add(record!({ "id": 1, "$key": 500 }));

    assert!(matches!(outcome, AddOutcome::AlreadyExists(_)));
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn test_record_without_identity_is_inserted() -> Result<()> {
    let mut store = setup_store("notes")?;
    let a = record!({ "text": "no id" });

    assert!(store.resolve(&a).is_none());
    assert!(store.entity_query(&a).is_none());
    assert!(matches!(store.add(a.clone()), AddOutcome::Added(_)));
    assert!(matches!(store.add(a), AddOutcome::Added(_)));
    assert_eq!(store.len(), 2);
    Ok(())
}

#[test]
fn test_surrogate_and_business_key_resolve_to_same_record() -> Result<()> {
    let mut store = setup_store("tasks")?;
    let AddOutcome::Added(inserted) = store.add(record!({ "id": "t-1", "name": "x" })) else {
        panic!("Expected insert");
    };

    let key = data::record::surrogate_key(&inserted).unwrap();
    let by_surrogate = store.resolve(&record!({ "$key": key }));
    let by_business = store.resolve(&record!({ "id": "t-1" }));

    assert_eq!(by_surrogate, by_business);
    assert_eq!(by_surrogate, Some(inserted));
    Ok(())
}

#[test]
fn test_update_merges_fields() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.add(record!({ "id": 1, "a": 0, "b": 0 }));

    store.update(record!({ "id": 1, "a": 1 }));
    store.update(record!({ "id": 1, "b": 2 }));

    assert_eq!(app_view(&store.get(1).unwrap()), record!({ "id": 1, "a": 1, "b": 2 }));
    Ok(())
}

#[test]
fn test_update_missing_record_reports_not_found() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.add(record!({ "id": 1 }));

    assert_eq!(store.update(record!({ "id": 2, "a": 1 })), UpdateOutcome::NotFound);
    assert_eq!(store.update(record!({ "a": 1 })), UpdateOutcome::NotFound);
    assert_eq!(store.len(), 1);
    assert!(store.get(2).is_none());
    Ok(())
}

#[test]
fn test_update_by_surrogate_key_can_change_business_key() -> Result<()> {
    let mut store = setup_store("tasks")?;
    let AddOutcome::Added(inserted) = store.add(record!({ "id": 1, "name": "x" })) else {
        panic!("Expected insert");
    };
    let key = data::record::surrogate_key(&inserted).unwrap();

    store.update(record!({ "$key": key, "id": 10 }));

    assert!(store.get(1).is_none());
    assert_eq!(store.get(10).unwrap()["name"], "x");
    Ok(())
}

#[test]
fn test_update_cannot_take_a_business_key_already_held() -> Result<()> {
    let mut store = setup_store("tasks")?;
    let AddOutcome::Added(first) = store.add(record!({ "id": 1, "name": "a" })) else {
        panic!("Expected insert");
    };
    let AddOutcome::Added(second) = store.add(record!({ "id": 2, "name": "b" })) else {
        panic!("Expected insert");
    };
    let updates = Arc::new(Mutex::new(0));
    let updates_clone = updates.clone();
    store.on(EventKind::Update, move |_| *updates_clone.lock().unwrap() += 1);

    let key = data::record::surrogate_key(&first).unwrap();
    let outcome = store.update(record!({ "$key": key, "id": 2 }));

    assert_eq!(outcome, UpdateOutcome::Conflict(second.clone()));
    assert_eq!(store.find(&Query::eq("id", 2)), vec![second]);
    assert_eq!(store.get(1), Some(first.clone()));
    assert_eq!(*updates.lock().unwrap(), 0);

    let upsert = store.set_object_with(record!({ "$key": key, "id": 2.0 }), Trigger::Emit);
    assert!(matches!(upsert, UpsertOutcome::Conflict(_)));
    assert_eq!(store.get(1), Some(first));
    assert_eq!(*updates.lock().unwrap(), 0);
    Ok(())
}

#[test]
fn test_set_collection_skips_records_that_would_duplicate_a_key() -> Result<()> {
    let mut store = setup_store("tasks")?;
    let AddOutcome::Added(first) = store.add(record!({ "id": 1 })) else {
        panic!("Expected insert");
    };
    store.add(record!({ "id": 2 }));
    let key = data::record::surrogate_key(&first).unwrap();

    store.set_collection(vec![record!({ "$key": key, "id": 2 }), record!({ "id": 3 })]);

    assert_eq!(store.find(&Query::eq("id", 2)).len(), 1);
    assert!(store.get(1).is_some());
    assert!(store.get(3).is_some());
    Ok(())
}

#[test]
fn test_large_integer_keys_stay_distinct() -> Result<()> {
    let mut store = setup_store("events")?;
    let low: u64 = 9_007_199_254_740_992;
    let high: u64 = 9_007_199_254_740_993;

    assert!(matches!(store.add(record!({ "id": low, "n": "low" })), AddOutcome::Added(_)));
    assert!(matches!(store.add(record!({ "id": high, "n": "high" })), AddOutcome::Added(_)));

    assert_eq!(store.len(), 2);
    assert_eq!(store.get(low).unwrap()["n"], "low");
    assert_eq!(store.get(high).unwrap()["n"], "high");
    assert_eq!(store.find(&Query::eq("id", high)).len(), 1);

    // integral floats still resolve to the matching integer key
    assert!(matches!(store.add(record!({ "id": 1 })), AddOutcome::Added(_)));
    assert!(matches!(store.add(record!({ "id": 1.0 })), AddOutcome::AlreadyExists(_)));
    Ok(())
}

#[test]
fn test_set_object_is_idempotent() -> Result<()> {
    let mut store = setup_store("tasks")?;
    let task = record!({ "id": 7, "status": "open" });

    let first = store.set_object(task.clone());
    let after_first = store.get_collection(None);
    let second = store.set_object(task);
    let after_second = store.get_collection(None);

    assert!(matches!(first, UpsertOutcome::Inserted(_)));
    assert!(matches!(second, UpsertOutcome::Updated(_)));
    assert_eq!(after_first, after_second);
    assert_eq!(second.record(), &after_second[0]);
    Ok(())
}

#[test]
fn test_set_collection_upserts_each_record() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.add(record!({ "id": 1, "name": "old", "done": false }));

    store.set_collection(vec![
        record!({ "id": 1, "name": "new" }),
        record!({ "id": 2, "name": "b" }),
    ]);

    let all = store.get_collection(None);
    assert_eq!(all.len(), 2);
    assert_eq!(app_view(&all[0]), record!({ "id": 1, "name": "new", "done": false }));
    assert_eq!(app_view(&all[1]), record!({ "id": 2, "name": "b" }));
    Ok(())
}

#[test]
fn test_destroy_removes_by_business_key() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.set_collection(vec![record!({ "id": 1 }), record!({ "id": 2 })]);

    let removed = store.destroy(2);
    assert_eq!(removed.map(|r| r["id"].clone()), Some(Value::from(2)));
    assert!(store.get(2).is_none());
    assert_eq!(store.len(), 1);

    // removing nothing is tolerated
    assert!(store.destroy(99).is_none());
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn test_destroy_all_keeps_registered_views() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.set_collection(vec![record!({ "id": 1, "status": "open" })]);
    store.filter("open", &record!({ "status": "open" }));
    assert_eq!(store.get_collection(Some("open")).len(), 1);

    store.destroy_all();

    assert!(store.find(&Query::All).is_empty());
    assert!(store.is_empty());
    assert!(store.get_collection(Some("open")).is_empty());
    assert!(store.view_descriptor("open").is_some());

    store.add(record!({ "id": 2, "status": "open" }));
    assert_eq!(store.get_collection(Some("open")).len(), 1);
    Ok(())
}

#[test]
fn test_find_runs_structural_queries() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.set_collection(vec![
        record!({ "id": 1, "status": "open", "rank": 3 }),
        record!({ "id": 2, "status": "closed", "rank": 1 }),
        record!({ "id": 3, "status": "open", "rank": 1 }),
    ]);

    let open = store.find(&Query::eq("status", "open"));
    assert_eq!(open.iter().map(|r| r["id"].clone()).collect::<Vec<_>>(), vec![Value::from(1), Value::from(3)]);

    let ranked = store.find_document(&serde_json::json!({ "status": "open", "rank": { "$lt": 2 } }))?;
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0]["id"], 3);

    assert!(store.find_document(&serde_json::json!({ "rank": { "$bogus": 1 } })).is_err());
    Ok(())
}

#[test]
fn test_custom_id_attr() -> Result<()> {
    let registry = CollectionRegistry::new();
    let mut store = EntityStore::new(&registry, StoreConfig::new("users").with_id_attr("uuid"))?;

    store.add(record!({ "uuid": "u-1", "name": "ada" }));
    let outcome = store.add(record!({ "uuid": "u-1", "name": "again" }));

    assert!(matches!(outcome, AddOutcome::AlreadyExists(_)));
    assert_eq!(store.get("u-1").unwrap()["name"], "ada");
    assert_eq!(store.id_attr(), "uuid");
    Ok(())
}

#[test]
fn test_stores_with_same_name_share_a_collection() -> Result<()> {
    let registry = CollectionRegistry::new();
    let mut writer = EntityStore::new(&registry, StoreConfig::new("tasks"))?;
    let reader = EntityStore::new(&registry, StoreConfig::new("tasks"))?;
    let other = EntityStore::new(&CollectionRegistry::new(), StoreConfig::new("tasks"))?;

    writer.add(record!({ "id": 1 }));

    assert!(reader.get(1).is_some());
    assert!(other.get(1).is_none());
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    let registry = CollectionRegistry::new();
    let result = EntityStore::new(&registry, StoreConfig::new(""));
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(!registry.contains(""));
}

#[test]
fn test_seed_filter_destroy_scenario() -> Result<()> {
    let mut store = setup_store("tasks")?;
    store.set_collection(vec![
        record!({ "id": 1, "name": "a" }),
        record!({ "id": 2, "name": "b" }),
    ]);

    store.filter("v", &record!({ "id": 2 }));
    let view = store.get_collection(Some("v"));
    assert_eq!(view.iter().map(app_view).collect::<Vec<_>>(), vec![record!({ "id": 2, "name": "b" })]);

    store.destroy(2);
    let descriptor = store.view_descriptor("v").cloned();
    store.register_view("v", descriptor.as_ref());
    assert!(store.get_collection(Some("v")).is_empty());
    Ok(())
}
