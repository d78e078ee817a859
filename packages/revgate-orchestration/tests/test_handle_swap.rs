//! Handle swaps and session configuration

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use common::{catalog, fields, GatedStore};
use revgate_orchestration::{SessionConfig, SessionError, StoreSession};
use revgate_storage::{Document, DocumentStore, ErrorKind, InMemoryDocumentStore};
use serde_json::json;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_unreachable_candidate_is_rejected() {
    let first = InMemoryDocumentStore::new("first");
    let session = StoreSession::open(
        Arc::new(first.clone()),
        catalog(2),
        &SessionConfig::default(),
    );
    session.ready().await.unwrap();

    let offline = InMemoryDocumentStore::new("offline");
    offline.set_reachable(false);

    let err = session.swap_handle(Arc::new(offline.clone())).await.unwrap_err();
    assert!(matches!(err, SessionError::Unreachable(_)));
    assert_eq!(err.store_kind(), Some(ErrorKind::Unavailable));

    assert_eq!(session.epoch(), 1);
    session.set_field_eventually("a", "x", 1).await.unwrap();
    assert!(first.peek("a").is_some());
    assert!(offline.is_empty());
}

#[tokio::test]
async fn test_writes_follow_the_new_handle() {
    let first = InMemoryDocumentStore::new("first");
    let second = InMemoryDocumentStore::new("second");
    let session = StoreSession::open(
        Arc::new(first.clone()),
        catalog(3),
        &SessionConfig::default(),
    );
    session.set_field_eventually("a", "x", 1).await.unwrap();

    let gate = session.swap_handle(Arc::new(second.clone())).await.unwrap();
    assert_eq!(gate.epoch(), 2);

    session.set_field_eventually("b", "y", 2).await.unwrap();

    assert!(first.peek("b").is_none());
    assert_eq!(second.peek("b").unwrap().get("y"), Some(&json!(2)));
    // Indexes were provisioned against the new handle before the write
    assert_eq!(second.len(), 4);
}

#[tokio::test]
async fn test_swap_recovers_a_failed_epoch() {
    let broken = InMemoryDocumentStore::new("broken");
    broken.fail_puts("_design/idx_0", ErrorKind::Unauthorized);
    let session = StoreSession::open(
        Arc::new(broken.clone()),
        catalog(2),
        &SessionConfig::default(),
    );
    assert!(matches!(
        session.ready().await,
        Err(SessionError::Provisioning(_))
    ));

    let healthy = InMemoryDocumentStore::new("healthy");
    let gate = session.swap_handle(Arc::new(healthy.clone())).await.unwrap();
    gate.wait().await.unwrap();

    let doc = session.set_field_eventually("t", "ok", true).await.unwrap();
    assert_eq!(doc.get("ok"), Some(&json!(true)));
    assert!(healthy.peek("t").is_some());
    assert!(broken.peek("t").is_none());
}

#[tokio::test]
async fn test_swap_waits_for_current_epoch() {
    let gated = GatedStore::new(InMemoryDocumentStore::new("slow"));
    let session = StoreSession::open(gated.clone(), catalog(2), &SessionConfig::default());

    let swap = {
        let session = session.clone();
        tokio::spawn(async move {
            session
                .swap_handle(Arc::new(InMemoryDocumentStore::new("next")))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!swap.is_finished());
    assert_eq!(session.epoch(), 1);

    gated.release();
    let gate = swap.await.unwrap().unwrap();
    assert_eq!(gate.epoch(), 2);
    assert_eq!(session.epoch(), 2);
    assert_eq!(gated.inner.len(), 2);
}

#[tokio::test]
async fn test_yaml_config_bounds_retries() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "version: 1").unwrap();
    writeln!(file, "retry:").unwrap();
    writeln!(file, "  max_retries: 0").unwrap();
    writeln!(file, "logging:").unwrap();
    writeln!(file, "  filter: debug").unwrap();

    let config = SessionConfig::from_yaml(file.path()).unwrap();
    let store = InMemoryDocumentStore::new("db");
    let session = StoreSession::open(Arc::new(store.clone()), catalog(1), &config);
    session.ready().await.unwrap();

    store.put(&Document::new("hot")).await.unwrap();
    store.race_next_put("hot", fields(&[("by", json!("other"))]));

    let err = session
        .set_field_eventually("hot", "by", "me")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::RetriesExhausted { attempts: 0, .. }
    ));
    assert_eq!(store.peek("hot").unwrap().get("by"), Some(&json!("other")));
}
