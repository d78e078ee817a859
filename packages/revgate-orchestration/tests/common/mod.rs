//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use revgate_storage::{
    Document, DocumentStore, IndexCatalog, IndexDefinition, InMemoryDocumentStore, PutResponse,
    Result, StoreInfo, DESIGN_PREFIX,
};
use serde_json::{Map, Value};
use tokio::sync::watch;

/// Store whose index installs block until `release()` is called
pub struct GatedStore {
    pub inner: InMemoryDocumentStore,
    open: watch::Sender<bool>,
}

impl GatedStore {
    pub fn new(inner: InMemoryDocumentStore) -> Arc<Self> {
        let (open, _rx) = watch::channel(false);
        Arc::new(Self { inner, open })
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn get(&self, id: &str) -> Result<Document> {
        self.inner.get(id).await
    }

    async fn put(&self, doc: &Document) -> Result<PutResponse> {
        if doc.id.starts_with(DESIGN_PREFIX) {
            let mut rx = self.open.subscribe();
            let _ = rx.wait_for(|open| *open).await;
        }
        self.inner.put(doc).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        self.inner.info().await
    }
}

pub fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Catalog of `n` simple task indexes named `idx_0..idx_{n-1}`
pub fn catalog(n: usize) -> IndexCatalog {
    IndexCatalog::from_definitions((0..n).map(|i| {
        IndexDefinition::new(format!("idx_{}", i))
            .when_equals("type", "task")
            .when_truthy("active")
    }))
    .unwrap()
}
