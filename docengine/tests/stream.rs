mod common;

use std::time::Duration;

use bson::doc;
use docengine::{memory::InMemoryCollection, prelude::*};
use futures::{StreamExt, TryStreamExt};

use common::{FlakyCollection, SlowCollection};

async fn populate<B: CollectionBackend + 'static>(engine: &Engine<B>, count: i32) -> Vec<bson::Document> {
    let mut created = Vec::new();
    for n in 0..count {
        created.push(engine.create(doc! { "n": n }).await.unwrap());
    }
    created
}

#[tokio::test]
async fn slow_store_delivers_every_document_in_order() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(
        SlowCollection::new(users.clone(), Duration::from_millis(100)),
        EngineOptions::default().with_batch_size(2),
    );
    let created = populate(&engine, 5).await;

    let streamed: Vec<_> = engine.find_stream(Query::all()).try_collect().await.unwrap();

    assert_eq!(streamed, created);
    assert_eq!(users.open_cursors(), 0);
}

#[tokio::test]
async fn delayed_consumer_still_receives_everything_then_one_end() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(users.clone(), EngineOptions::default());
    let created = populate(&engine, 5).await;

    let mut stream = engine.find_stream(Query::all());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut received = Vec::new();
    while let Some(item) = stream.next().await {
        received.push(item.unwrap());
    }

    assert_eq!(received, created);
    assert!(stream.next().await.is_none());
    assert!(stream.next().await.is_none());
    assert_eq!(users.open_cursors(), 0);
}

#[tokio::test]
async fn stream_is_lazy_until_polled() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(users.clone(), EngineOptions::default());
    populate(&engine, 3).await;

    let mut stream = engine.find_stream(Query::all());
    assert_eq!(users.open_cursors(), 0);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.get_i32("n").unwrap(), 0);
    assert_eq!(users.open_cursors(), 1);

    drop(stream);
    assert_eq!(users.open_cursors(), 0);
}

#[tokio::test]
async fn buffers_at_most_one_batch() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(users.clone(), EngineOptions::default().with_batch_size(2));
    populate(&engine, 5).await;

    let mut stream = engine.find_stream(Query::all());
    let mut seen = 0;
    while let Some(document) = stream.try_next().await.unwrap() {
        assert_eq!(document.get_i32("n").unwrap(), seen);
        assert!(DocumentStream::buffered(&stream) < 2);
        seen += 1;
    }

    assert_eq!(seen, 5);
    assert_eq!(stream.emitted(), 5);
    assert!(stream.is_closed());
}

#[tokio::test]
async fn closing_early_releases_the_cursor() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(users.clone(), EngineOptions::default().with_batch_size(2));
    populate(&engine, 5).await;

    let mut stream = engine.find_stream(Query::all());
    stream.next().await.unwrap().unwrap();
    assert_eq!(users.open_cursors(), 1);

    stream.close();

    assert_eq!(users.open_cursors(), 0);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn mid_stream_failure_is_delivered_once() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(
        FlakyCollection { inner: users.clone() },
        EngineOptions::default().with_batch_size(2),
    );
    populate(&engine, 5).await;

    let items: Vec<_> = engine.find_stream(Query::all()).collect().await;

    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok() && items[1].is_ok());
    let err = items[2].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(err.to_string(), "cursor id 42 not found");
    assert_eq!(users.open_cursors(), 0);
}

#[tokio::test]
async fn untranslatable_query_yields_only_its_error() {
    let users = InMemoryCollection::new("users");
    let engine = Engine::new(users.clone(), EngineOptions::default());
    populate(&engine, 2).await;

    let items: Vec<_> = engine
        .find_stream(Query::builder().clause(Filter::eq("_id", 42)).build())
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().kind(), ErrorKind::Translation);
    assert_eq!(users.open_cursors(), 0);
}

#[tokio::test]
async fn streams_over_a_custom_identity_property() {
    let engine = Engine::new(
        InMemoryCollection::new("users"),
        EngineOptions::default().with_id_property("key"),
    );
    let created = populate(&engine, 3).await;

    let streamed: Vec<_> = engine
        .find_stream(Query::from(doc! { "n": { "$gte": 1 } }))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(streamed, created[1..]);
    assert!(streamed.iter().all(|document| document.contains_key("key")));
}
