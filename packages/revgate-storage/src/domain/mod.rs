//! Domain layer for revision-checked document stores
//!
//! # Core Principles
//!
//! 1. **Opaque Revisions**: a revision is an optimistic-lock fence, not a version number
//! 2. **Compare-and-Swap Puts**: a put lands only if its revision matches the stored one
//! 3. **Absent Revision = Create**: a put without a revision must not overwrite anything
//!
//! # Domain Models
//!
//! - `Document`: JSON body plus `_id` / `_rev`
//! - `Revision`: Opaque token issued by the store on every successful put
//! - `PutResponse`: Id and new revision of a committed write
//! - `StoreInfo`: Liveness probe payload
//!
//! # Port Trait
//!
//! - `DocumentStore`: the three primitives the coordination layer consumes
//!
//! # Examples
//!
//! ```rust,ignore
//! use revgate_storage::domain::{Document, DocumentStore};
//!
//! async fn example(store: impl DocumentStore) -> Result<()> {
//!     let doc = Document::new("task:1").with_field("title", "write report");
//!     let resp = store.put(&doc).await?;           // create (no revision)
//!
//!     let mut current = store.get("task:1").await?; // carries resp.rev
//!     current.set("done", true);
//!     store.put(&current).await?;                   // compare-and-swap
//!     Ok(())
//! }
//! ```

pub mod index;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

pub use index::{EmitKey, FieldPredicate, IndexCatalog, IndexDefinition, Reducer, DESIGN_PREFIX};

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque revision token issued by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A JSON document with store identity
///
/// Serializes with CouchDB-style `_id` / `_rev` keys next to the body fields.
///
/// # Examples
///
/// ```rust
/// use revgate_storage::domain::Document;
///
/// let doc = Document::new("user:1").with_field("active", true);
/// assert_eq!(doc.id, "user:1");
/// assert!(doc.rev.is_none());
/// assert_eq!(doc.get("active"), Some(&serde_json::json!(true)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document ID
    #[serde(rename = "_id")]
    pub id: String,
    /// Current revision (None = not yet stored)
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
    /// Body fields
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    /// Create an empty document without a revision
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            body: Map::new(),
        }
    }

    /// Create a document from an existing body
    pub fn with_body(id: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            body,
        }
    }

    pub fn with_rev(mut self, rev: Revision) -> Self {
        self.rev = Some(rev);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Set a field, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.body.insert(key.into(), value.into())
    }

    /// Overlay `fields` onto the body (named fields win, others are kept)
    pub fn merge(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            self.body.insert(key.clone(), value.clone());
        }
    }
}

/// Result of a committed put
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    pub id: String,
    pub rev: Revision,
}

/// Store metadata returned by the liveness probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub db_name: String,
    pub doc_count: usize,
    pub update_seq: u64,
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: DocumentStore
// ═══════════════════════════════════════════════════════════════════════════

/// Revision-checked document store abstraction
///
/// # Contract
///
/// - `get` fails with `ErrorKind::NotFound` for unknown (or deleted) ids
/// - `put` without a revision creates the document, or fails with
///   `ErrorKind::Conflict` if the id is taken
/// - `put` with a revision fails with `ErrorKind::Conflict` if the stored
///   revision differs, and may fail with `ErrorKind::NotFound` if the id no
///   longer exists
/// - `info` is a cheap liveness probe
///
/// # Implementations
///
/// - `InMemoryDocumentStore`: in-process adapter used by tests
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the current document (with its revision)
    async fn get(&self, id: &str) -> Result<Document>;

    /// Compare-and-swap write
    async fn put(&self, doc: &Document) -> Result<PutResponse>;

    /// Store metadata / reachability probe
    async fn info(&self) -> Result<StoreInfo>;
}

/// Shared handle to a store
pub type StoreHandle = Arc<dyn DocumentStore>;

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
