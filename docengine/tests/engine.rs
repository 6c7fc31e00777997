use bson::{Bson, doc, oid::ObjectId};
use docengine::{memory::InMemoryCollection, prelude::*};
use futures::future::join_all;

fn engine() -> (Engine<InMemoryCollection>, InMemoryCollection) {
    let users = InMemoryCollection::new("users");
    (Engine::new(users.clone(), EngineOptions::default()), users)
}

#[tokio::test]
async fn create_assigns_an_external_identity() {
    let (engine, _) = engine();

    let created = engine.create(doc! { "name": "Ann", "age": 31 }).await.unwrap();

    let id = created.get_str("_id").unwrap();
    assert!(ObjectId::parse_str(id).is_ok());
    assert_eq!(id, id.to_lowercase());
    assert_eq!(created.get_str("name").unwrap(), "Ann");
    assert_eq!(created.get_i32("age").unwrap(), 31);
}

#[tokio::test]
async fn create_keeps_a_supplied_identity() {
    let (engine, users) = engine();
    let oid = ObjectId::new();

    let created = engine.create(doc! { "_id": oid.to_hex(), "name": "Ann" }).await.unwrap();

    assert_eq!(created, doc! { "_id": oid.to_hex(), "name": "Ann" });
    assert!(users.find_one(doc! { "_id": oid }).await.unwrap().is_some());
}

#[tokio::test]
async fn null_or_empty_identity_lets_the_store_assign_one() {
    let (engine, _) = engine();

    let from_null = engine.create(doc! { "_id": Bson::Null, "n": 1 }).await.unwrap();
    let from_empty = engine.create(doc! { "_id": "", "n": 2 }).await.unwrap();

    assert!(ObjectId::parse_str(from_null.get_str("_id").unwrap()).is_ok());
    assert!(ObjectId::parse_str(from_empty.get_str("_id").unwrap()).is_ok());
}

#[tokio::test]
async fn invalid_identity_fails_before_the_store_is_called() {
    let (engine, users) = engine();

    let err = engine.create(doc! { "_id": "not-an-object-id" }).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Translation);
    assert!(users.is_empty().await);
}

#[tokio::test]
async fn duplicate_identity_is_reported_verbatim() {
    let (engine, _) = engine();
    let created = engine.create(doc! { "name": "Ann" }).await.unwrap();

    let err = engine
        .create(doc! { "_id": created.get_str("_id").unwrap(), "name": "Ann again" })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(err.as_store_error().and_then(StoreError::code), Some(11000));
    assert!(err.to_string().starts_with("E11000 duplicate key error"));
}

#[tokio::test]
async fn concurrent_creates_get_distinct_identities() {
    let (engine, users) = engine();

    let created = join_all((0..20).map(|n| engine.create(doc! { "n": n })))
        .await
        .into_iter()
        .collect::<EngineResult<Vec<_>>>()
        .unwrap();

    let mut ids = created
        .iter()
        .map(|document| document.get_str("_id").unwrap().to_string())
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 20);
    assert_eq!(users.len().await, 20);
}

#[tokio::test]
async fn custom_identity_property() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(users.clone(), EngineOptions::default().with_id_property("id"));

    let created = engine.create(doc! { "name": "Ann" }).await.unwrap();
    let id = created.get_str("id").unwrap().to_string();

    assert_eq!(created.keys().next().map(String::as_str), Some("id"));
    assert!(!created.contains_key("_id"));

    let read = engine.read(id.as_str()).await.unwrap().unwrap();
    assert_eq!(read, created);

    let stored = users.find_one(doc! {}).await.unwrap().unwrap();
    assert_eq!(stored.get_object_id("_id").unwrap().to_hex(), id);
    assert!(!stored.contains_key("id"));
}

#[tokio::test]
async fn update_applies_a_set() {
    let (engine, _) = engine();
    let ann = engine.create(doc! { "name": "Ann", "age": 31 }).await.unwrap();
    let id = ann.get_str("_id").unwrap();

    let summary = engine
        .update(
            Query::builder().clause(Filter::eq("_id", id)).build(),
            Update::set(doc! { "age": 32 }),
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!((summary.matched, summary.modified), (1, 1));
    assert_eq!(
        engine.read(id).await.unwrap().unwrap(),
        doc! { "_id": id, "name": "Ann", "age": 32 }
    );
}

#[tokio::test]
async fn update_ignores_identity_in_the_payload() {
    let (engine, _) = engine();
    let ann = engine.create(doc! { "name": "Ann" }).await.unwrap();
    let id = ann.get_str("_id").unwrap();

    engine
        .update(
            Query::builder().clause(Filter::eq("_id", id)).build(),
            Update::set(doc! { "_id": ObjectId::new().to_hex(), "name": "Anne" }),
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(engine.read(id).await.unwrap().unwrap().get_str("name").unwrap(), "Anne");
}

#[tokio::test]
async fn empty_set_is_a_store_error_not_a_missing_document() {
    let (engine, _) = engine();
    let ann = engine.create(doc! { "name": "Ann" }).await.unwrap();

    let err = engine
        .update(
            Query::builder().clause(Filter::eq("_id", ann.get_str("_id").unwrap())).build(),
            Update::set(doc! {}),
            UpdateOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(
        err.to_string(),
        "'$set' is empty. You must specify a field like so: {$set: {<field>: ...}}"
    );
}

#[tokio::test]
async fn update_without_a_match_is_not_found() {
    let (engine, _) = engine();

    let err = engine
        .update(
            Query::builder().clause(Filter::eq("name", "nobody")).build(),
            Update::set(doc! { "age": 1 }),
            UpdateOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn upsert_reports_the_created_identity() {
    let (engine, _) = engine();

    let summary = engine
        .update(
            Query::builder().clause(Filter::eq("name", "Dee")).build(),
            Update::set(doc! { "age": 22 }),
            UpdateOptions::default().upsert(true),
        )
        .await
        .unwrap();

    let id = summary.upserted_id.unwrap();
    let created = engine.read(id.clone()).await.unwrap().unwrap();
    assert_eq!(created, doc! { "_id": id, "name": "Dee", "age": 22 });
}

#[tokio::test]
async fn replace_keeps_the_identity() {
    let (engine, _) = engine();
    let ann = engine.create(doc! { "name": "Ann", "age": 31 }).await.unwrap();
    let id = ann.get_str("_id").unwrap();

    engine
        .update(
            Query::builder().clause(Filter::eq("_id", id)).build(),
            Update::replace(doc! { "nickname": "A" }),
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(engine.read(id).await.unwrap().unwrap(), doc! { "_id": id, "nickname": "A" });
}

#[tokio::test]
async fn multi_update_with_operators() {
    let (engine, _) = engine();
    for n in 0..3 {
        engine.create(doc! { "n": n, "hits": 0 }).await.unwrap();
    }

    let summary = engine
        .update(
            Query::from(doc! { "n": { "$gte": 1 } }),
            Update::operators(doc! { "$inc": { "hits": 1 } }),
            UpdateOptions::default().multi(true),
        )
        .await
        .unwrap();

    assert_eq!(summary.matched, 2);
    assert_eq!(engine.count(Query::from(doc! { "hits": 1 })).await.unwrap(), 2);
}

#[tokio::test]
async fn remove_and_delete() {
    let (engine, _) = engine();
    let ann = engine.create(doc! { "name": "Ann", "team": "red" }).await.unwrap();
    engine.create(doc! { "name": "Bob", "team": "red" }).await.unwrap();
    engine.create(doc! { "name": "Cid", "team": "blue" }).await.unwrap();

    engine.delete(ann.get_str("_id").unwrap()).await.unwrap();
    assert!(engine.read(ann.get_str("_id").unwrap()).await.unwrap().is_none());

    let removed = engine
        .remove(Query::builder().clause(Filter::eq("team", "red")).build())
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let err = engine
        .remove(Query::builder().clause(Filter::eq("team", "red")).build())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = engine.delete(ann.get_str("_id").unwrap()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn engines_work_over_dynamic_backends() {
    let backend: std::sync::Arc<dyn CollectionBackend> = std::sync::Arc::new(InMemoryCollection::new("users"));
    let engine = Engine::from_shared(backend, EngineOptions::default());

    let created = engine.create(doc! { "name": "Ann" }).await.unwrap();

    assert_eq!(engine.find(Query::all()).await.unwrap(), vec![created]);
}
