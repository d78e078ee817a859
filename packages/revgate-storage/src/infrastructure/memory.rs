//! In-Memory Document Store
//!
//! HashMap-backed `DocumentStore` with CouchDB-like revisions
//! (`<generation>-<sha256 prefix>`). Every call yields to the scheduler first so
//! concurrent callers interleave the way they would against a remote store.
//!
//! Fault injection hooks (reachability, per-id put failures, racing writers)
//! exist for exercising the coordination layer's failure paths.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{Document, DocumentStore, PutResponse, Revision, StoreInfo};
use crate::error::{ErrorKind, Result, StoreError};

struct StoredDocument {
    generation: u64,
    rev: Revision,
    body: Map<String, Value>,
}

#[derive(Default)]
struct Faults {
    put_failures: HashMap<String, ErrorKind>,
    races: HashMap<String, VecDeque<Map<String, Value>>>,
}

struct Inner {
    name: String,
    docs: Mutex<HashMap<String, StoredDocument>>,
    faults: Mutex<Faults>,
    reachable: AtomicBool,
    update_seq: AtomicU64,
    put_attempts: AtomicU64,
}

#[derive(Clone)]
pub struct InMemoryDocumentStore {
    inner: Arc<Inner>,
}

impl InMemoryDocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                docs: Mutex::new(HashMap::new()),
                faults: Mutex::new(Faults::default()),
                reachable: AtomicBool::new(true),
                update_seq: AtomicU64::new(0),
                put_attempts: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Simulate the store going offline (every call fails with `Unavailable`)
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make every put to `id` fail with `kind` until cleared
    pub fn fail_puts(&self, id: impl Into<String>, kind: ErrorKind) {
        self.inner.faults.lock().put_failures.insert(id.into(), kind);
    }

    pub fn clear_put_failure(&self, id: &str) {
        self.inner.faults.lock().put_failures.remove(id);
    }

    /// Queue a concurrent writer: right before the next put to `id` is
    /// evaluated, `fields` are merged into the stored document (creating it if
    /// absent), which advances its revision.
    pub fn race_next_put(&self, id: impl Into<String>, fields: Map<String, Value>) {
        self.inner
            .faults
            .lock()
            .races
            .entry(id.into())
            .or_default()
            .push_back(fields);
    }

    /// Delete a document regardless of its revision
    pub fn remove(&self, id: &str) -> bool {
        self.inner.docs.lock().remove(id).is_some()
    }

    /// Synchronous read, bypassing reachability and scheduling
    pub fn peek(&self, id: &str) -> Option<Document> {
        self.inner.docs.lock().get(id).map(|stored| Document {
            id: id.to_string(),
            rev: Some(stored.rev.clone()),
            body: stored.body.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful writes (including racing writers)
    pub fn successful_writes(&self) -> u64 {
        self.inner.update_seq.load(Ordering::SeqCst)
    }

    /// Number of puts received, successful or not
    pub fn put_attempts(&self) -> u64 {
        self.inner.put_attempts.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable(format!(
                "Store '{}' is unreachable",
                self.name()
            )))
        }
    }

    fn next_revision(id: &str, generation: u64, body: &Map<String, Value>) -> Result<Revision> {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update(generation.to_le_bytes());
        hasher.update(serde_json::to_vec(body)?);
        let digest = format!("{:x}", hasher.finalize());
        Ok(Revision::new(format!("{}-{}", generation, &digest[..16])))
    }

    fn write(
        &self,
        docs: &mut HashMap<String, StoredDocument>,
        id: &str,
        generation: u64,
        body: Map<String, Value>,
    ) -> Result<Revision> {
        let rev = Self::next_revision(id, generation, &body)?;
        docs.insert(
            id.to_string(),
            StoredDocument {
                generation,
                rev: rev.clone(),
                body,
            },
        );
        self.inner.update_seq.fetch_add(1, Ordering::SeqCst);
        Ok(rev)
    }

    fn apply_race(&self, docs: &mut HashMap<String, StoredDocument>, id: &str) -> Result<()> {
        let race = {
            let mut faults = self.inner.faults.lock();
            faults.races.get_mut(id).and_then(|queue| queue.pop_front())
        };
        let Some(fields) = race else {
            return Ok(());
        };

        let (generation, mut body) = match docs.get(id) {
            Some(stored) => (stored.generation + 1, stored.body.clone()),
            None => (1, Map::new()),
        };
        for (key, value) in fields {
            body.insert(key, value);
        }
        self.write(docs, id, generation, body)?;
        Ok(())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: &str) -> Result<Document> {
        tokio::task::yield_now().await;
        self.ensure_reachable()?;

        self.peek(id).ok_or_else(|| StoreError::not_found(id))
    }

    async fn put(&self, doc: &Document) -> Result<PutResponse> {
        tokio::task::yield_now().await;
        self.inner.put_attempts.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;

        if let Some(kind) = self.inner.faults.lock().put_failures.get(&doc.id).copied() {
            return Err(StoreError::new(
                kind,
                format!("Injected failure writing {}", doc.id),
            ));
        }

        let mut docs = self.inner.docs.lock();
        self.apply_race(&mut docs, &doc.id)?;

        let generation = match (docs.get(&doc.id), &doc.rev) {
            (None, None) => 1,
            (None, Some(_)) => return Err(StoreError::not_found(&doc.id)),
            (Some(_), None) => return Err(StoreError::conflict(&doc.id)),
            (Some(stored), Some(rev)) if stored.rev != *rev => {
                return Err(StoreError::conflict(&doc.id))
            }
            (Some(stored), Some(_)) => stored.generation + 1,
        };

        let rev = self.write(&mut docs, &doc.id, generation, doc.body.clone())?;
        Ok(PutResponse {
            id: doc.id.clone(),
            rev,
        })
    }

    async fn info(&self) -> Result<StoreInfo> {
        tokio::task::yield_now().await;
        self.ensure_reachable()?;

        Ok(StoreInfo {
            db_name: self.name().to_string(),
            doc_count: self.len(),
            update_seq: self.successful_writes(),
        })
    }
}
