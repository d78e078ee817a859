//! revgate-storage - Revision-checked document store port
//!
//! > "A revision is a fence, not a version number."
//!
//! ## Core Principles
//!
//! 1. **Optimistic Concurrency**: every write names the revision it replaces
//! 2. **Explicit Outcomes**: `Conflict` and `NotFound` are distinguishable from hard failures
//! 3. **Declarative Indexes**: secondary indexes are data, installed as design documents
//!
//! ## Usage
//!
//! ```rust,ignore
//! use revgate_storage::{Document, DocumentStore, InMemoryDocumentStore, IndexCatalog};
//!
//! let store = InMemoryDocumentStore::new("tasks");
//!
//! // 1. Create (no revision)
//! let resp = store.put(&Document::new("task:1").with_field("title", "ship it")).await?;
//!
//! // 2. Update (compare-and-swap on the revision)
//! let mut doc = store.get("task:1").await?;
//! doc.set("completed", true);
//! store.put(&doc).await?;
//!
//! // 3. Index definitions become design documents
//! for index in &IndexCatalog::task_tracker() {
//!     store.put(&index.design_document()).await?;
//! }
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StoreError};

pub use domain::{
    Document, DocumentStore, EmitKey, FieldPredicate, IndexCatalog, IndexDefinition, PutResponse,
    Reducer, Revision, StoreHandle, StoreInfo, DESIGN_PREFIX,
};
pub use infrastructure::InMemoryDocumentStore;
