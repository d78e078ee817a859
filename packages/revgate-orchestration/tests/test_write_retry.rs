//! Conflict-retried writes through a session

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{catalog, fields, GatedStore};
use futures::future::join_all;
use revgate_orchestration::{
    RetryConfig, SessionConfig, SessionError, StoreSession, WriteTarget,
};
use revgate_storage::{Document, DocumentStore, InMemoryDocumentStore};
use serde_json::{json, Value};

fn increment(doc: &mut Document) {
    let count = doc.get("count").and_then(Value::as_u64).unwrap_or(0);
    doc.set("count", count + 1);
}

#[tokio::test]
async fn test_write_creates_absent_document() {
    let store = InMemoryDocumentStore::new("db");
    let session = StoreSession::open(
        Arc::new(store.clone()),
        catalog(2),
        &SessionConfig::default(),
    );

    let doc = session
        .write_until_committed("counter", increment)
        .await
        .unwrap();

    assert_eq!(doc.get("count"), Some(&json!(1)));
    assert!(doc.rev.as_ref().unwrap().as_str().starts_with("1-"));
    assert_eq!(store.peek("counter").unwrap().get("count"), Some(&json!(1)));
}

#[tokio::test]
async fn test_concurrent_writer_forces_rebase() {
    let store = InMemoryDocumentStore::new("db");
    let session = StoreSession::open(
        Arc::new(store.clone()),
        catalog(1),
        &SessionConfig::default(),
    );
    session.ready().await.unwrap();

    store
        .put(&Document::new("doc").with_field("count", 1))
        .await
        .unwrap();
    let r1 = store.peek("doc").unwrap();

    // Another writer moves the document to R2 between our read and put
    store.race_next_put(
        "doc",
        fields(&[("count", json!(10)), ("owner", json!("b"))]),
    );

    let doc = session
        .write_until_committed(WriteTarget::Snapshot(r1.clone()), increment)
        .await
        .unwrap();

    // Mutation re-applied on top of R2
    assert_eq!(doc.get("count"), Some(&json!(11)));
    assert_eq!(doc.get("owner"), Some(&json!("b")));
    assert!(doc.rev.as_ref().unwrap().as_str().starts_with("3-"));
    assert_ne!(doc.rev, r1.rev);
}

#[tokio::test]
async fn test_held_document_does_not_revert_concurrent_writer() {
    let store = InMemoryDocumentStore::new("db");
    let session = StoreSession::open(
        Arc::new(store.clone()),
        catalog(1),
        &SessionConfig::default(),
    );
    session.ready().await.unwrap();

    store
        .put(&Document::new("doc").with_field("title", "v1"))
        .await
        .unwrap();
    let r1 = store.peek("doc").unwrap();

    store.race_next_put("doc", fields(&[("title", json!("v2"))]));

    let doc = session
        .write_until_committed(r1, |doc: &mut Document| {
            doc.set("done", true);
        })
        .await
        .unwrap();

    assert_eq!(doc.get("title"), Some(&json!("v2")));
    assert_eq!(doc.get("done"), Some(&json!(true)));
    assert_eq!(store.peek("doc").unwrap().get("title"), Some(&json!("v2")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_converge() {
    let store = InMemoryDocumentStore::new("db");
    let session = StoreSession::open(
        Arc::new(store.clone()),
        catalog(3),
        &SessionConfig::default(),
    );

    let writers = (0..25).map(|_| {
        let session = session.clone();
        tokio::spawn(async move { session.write_until_committed("counter", increment).await })
    });

    for joined in join_all(writers).await {
        joined.unwrap().unwrap();
    }

    let stored = store.peek("counter").unwrap();
    assert_eq!(stored.get("count"), Some(&json!(25)));
    assert!(stored.rev.unwrap().as_str().starts_with("25-"));
}

#[tokio::test]
async fn test_write_waits_for_readiness() {
    let gated = GatedStore::new(InMemoryDocumentStore::new("slow"));
    let session = StoreSession::open(gated.clone(), catalog(3), &SessionConfig::default());

    let writer = {
        let session = session.clone();
        tokio::spawn(async move { session.set_field_eventually("x", "a", 1).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!writer.is_finished());
    assert!(!session.current_gate().is_settled());
    assert!(gated.inner.peek("x").is_none());

    gated.release();
    let doc = writer.await.unwrap().unwrap();

    assert_eq!(doc.get("a"), Some(&json!(1)));
    assert!(session.current_gate().is_settled());
    assert_eq!(gated.inner.len(), 4);
}

#[tokio::test]
async fn test_bounded_policy_surfaces_exhaustion() {
    let store = InMemoryDocumentStore::new("db");
    let config = SessionConfig::default().with_retry(RetryConfig {
        max_retries: Some(1),
        ..RetryConfig::default()
    });
    let session = StoreSession::open(Arc::new(store.clone()), catalog(1), &config);
    session.ready().await.unwrap();

    store.put(&Document::new("hot")).await.unwrap();
    for i in 0..3 {
        store.race_next_put("hot", fields(&[("n", json!(i))]));
    }

    let err = session
        .write_until_committed("hot", increment)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::RetriesExhausted { ref id, attempts: 1 } if id == "hot"
    ));
}
