use revgate_storage::{Document, DocumentStore};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::writer::{WriteRetryEngine, WriteTarget};

impl WriteRetryEngine {
    /// Set `updates` on a document without the caller tracking revisions.
    ///
    /// A bare id is fetched then merged; a document is merged directly (and
    /// put straight away if it carries a revision). After a conflict only the
    /// named fields are re-applied, so concurrent writers' other fields are
    /// kept, even for an `Overlay` target.
    pub async fn set_fields_eventually(
        &self,
        store: &dyn DocumentStore,
        target: impl Into<WriteTarget>,
        updates: Map<String, Value>,
    ) -> Result<Document> {
        let target = match target.into() {
            WriteTarget::Overlay(doc) => WriteTarget::Snapshot(doc),
            other => other,
        };

        self.write_until_committed(store, target, |doc: &mut Document| doc.merge(&updates))
            .await
    }

    /// Single-field form of [`set_fields_eventually`](Self::set_fields_eventually)
    pub async fn set_field_eventually(
        &self,
        store: &dyn DocumentStore,
        target: impl Into<WriteTarget>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Document> {
        let mut updates = Map::new();
        updates.insert(key.into(), value.into());
        self.set_fields_eventually(store, target, updates).await
    }
}
