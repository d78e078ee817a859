//! Optimistic-concurrency write retry
//!
//! Every call runs a small state machine against the store:
//!
//! ```text
//!            ┌──────── conflict ────────┐
//!            ▼                          │
//!   ──► Reconcile ──ok──► Put(rev) ─────┤──ok──► Committed
//!            │                │         │
//!        not found        not found     │
//!            ▼                ▼         │
//!          Create ◄───────────┘         │
//!            │                          │
//!            ├──────── conflict ────────┘
//!            └──ok──► Committed
//! ```
//!
//! A target that already carries a revision starts at `Put`. Any error other
//! than conflict/not-found ends the call. Only conflicts count against the
//! retry policy.

use std::fmt;

use revgate_storage::{Document, DocumentStore, PutResponse};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::retry::RetryPolicy;

/// What the caller wants written
#[derive(Debug, Clone, PartialEq)]
pub enum WriteTarget {
    /// Only an id: every attempt starts from the stored body.
    Id(String),
    /// A document the caller read earlier: its revision enables a direct put,
    /// but after a conflict only the mutation is re-applied to the fresh body.
    /// Its own body is only used when the document has to be created.
    Snapshot(Document),
    /// Opt-in: the caller's whole body is laid over the stored one on every
    /// attempt, reverting concurrent changes to any field it carries.
    Overlay(Document),
}

impl WriteTarget {
    pub fn id(&self) -> &str {
        match self {
            WriteTarget::Id(id) => id,
            WriteTarget::Snapshot(doc) | WriteTarget::Overlay(doc) => &doc.id,
        }
    }

    /// Document to put directly, if the caller supplied a revision
    fn fast_path(&self) -> Option<&Document> {
        match self {
            WriteTarget::Snapshot(doc) | WriteTarget::Overlay(doc) if doc.rev.is_some() => {
                Some(doc)
            }
            _ => None,
        }
    }

    /// Caller fields to lay over `base` (`creating`: base is an empty new document)
    fn overlay(&self, creating: bool) -> Option<&Map<String, Value>> {
        match self {
            WriteTarget::Id(_) => None,
            WriteTarget::Overlay(doc) => Some(&doc.body),
            WriteTarget::Snapshot(doc) if creating => Some(&doc.body),
            WriteTarget::Snapshot(_) => None,
        }
    }

    /// Build the next candidate from `base`, keeping base's revision
    fn rebase<M>(&self, base: Document, mutation: &mut M) -> Document
    where
        M: FnMut(&mut Document),
    {
        let creating = base.rev.is_none();
        let mut candidate = base;
        if let Some(fields) = self.overlay(creating) {
            candidate.merge(fields);
        }
        mutation(&mut candidate);
        candidate
    }
}

impl From<&str> for WriteTarget {
    fn from(id: &str) -> Self {
        WriteTarget::Id(id.to_string())
    }
}

impl From<String> for WriteTarget {
    fn from(id: String) -> Self {
        WriteTarget::Id(id)
    }
}

impl From<Document> for WriteTarget {
    fn from(doc: Document) -> Self {
        WriteTarget::Snapshot(doc)
    }
}

enum WriteStep {
    Put(Document),
    Reconcile,
    Create,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStep::Put(_) => f.write_str("put"),
            WriteStep::Reconcile => f.write_str("reconcile"),
            WriteStep::Create => f.write_str("create"),
        }
    }
}

/// Read-modify-write engine that absorbs revision bookkeeping
///
/// Holds no locks; correctness relies on the store's revision check, so any
/// number of concurrent calls for the same id converge independently.
#[derive(Debug, Clone, Default)]
pub struct WriteRetryEngine {
    policy: RetryPolicy,
}

impl WriteRetryEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Apply `mutation` to the target document until a put lands.
    ///
    /// `mutation` may run several times, always against the freshest body the
    /// engine has seen (the stored one after a conflict, an empty one when
    /// creating). The returned document carries the committed revision.
    pub async fn write_until_committed<M>(
        &self,
        store: &dyn DocumentStore,
        target: impl Into<WriteTarget>,
        mut mutation: M,
    ) -> Result<Document>
    where
        M: FnMut(&mut Document) + Send,
    {
        let target = target.into();
        let id = target.id().to_string();
        let mut conflicts: u32 = 0;

        let mut step = match target.fast_path() {
            Some(doc) => {
                let mut candidate = doc.clone();
                mutation(&mut candidate);
                WriteStep::Put(candidate)
            }
            None => WriteStep::Reconcile,
        };

        loop {
            debug!("write {}: {} (conflicts so far: {})", id, step, conflicts);
            step = match step {
                WriteStep::Put(candidate) => match store.put(&candidate).await {
                    Ok(resp) => return Ok(committed(candidate, resp)),
                    Err(err) if err.is_conflict() => {
                        self.after_conflict(&id, &mut conflicts).await?;
                        WriteStep::Reconcile
                    }
                    Err(err) if err.is_not_found() => WriteStep::Create,
                    Err(err) => return Err(err.into()),
                },
                WriteStep::Reconcile => match store.get(&id).await {
                    Ok(current) => WriteStep::Put(target.rebase(current, &mut mutation)),
                    Err(err) if err.is_not_found() => WriteStep::Create,
                    Err(err) => return Err(err.into()),
                },
                WriteStep::Create => {
                    let candidate = target.rebase(Document::new(id.as_str()), &mut mutation);
                    match store.put(&candidate).await {
                        Ok(resp) => {
                            debug!("write {}: created new document", id);
                            return Ok(committed(candidate, resp));
                        }
                        Err(err) if err.is_conflict() => {
                            self.after_conflict(&id, &mut conflicts).await?;
                            WriteStep::Reconcile
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            };
        }
    }

    async fn after_conflict(&self, id: &str, conflicts: &mut u32) -> Result<()> {
        *conflicts += 1;
        if !self.policy.allows(*conflicts) {
            warn!("write {}: giving up after {} conflicts", id, conflicts);
            return Err(SessionError::RetriesExhausted {
                id: id.to_string(),
                attempts: *conflicts - 1,
            });
        }

        debug!("write {}: conflict, retrying", id);
        let delay = self.policy.backoff_for(*conflicts);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

fn committed(mut doc: Document, resp: PutResponse) -> Document {
    doc.id = resp.id;
    doc.rev = Some(resp.rev);
    doc
}
