use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use revgate_storage::{Document, IndexCatalog, StoreHandle};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::gate::ReadinessGate;
use crate::provision::IndexProvisioner;
use crate::writer::{WriteRetryEngine, WriteTarget};

/// One handle lifetime: the handle plus the gate its provisioning resolves
struct Epoch {
    id: u64,
    handle: StoreHandle,
    gate: ReadinessGate,
    opened_at: DateTime<Utc>,
}

impl Epoch {
    fn new(id: u64, handle: StoreHandle) -> Self {
        Self {
            id,
            handle,
            gate: ReadinessGate::new(id),
            opened_at: Utc::now(),
        }
    }
}

struct SessionInner {
    session_id: Uuid,
    active: RwLock<Arc<Epoch>>,
    provisioner: IndexProvisioner,
    engine: WriteRetryEngine,
    /// Serializes swaps so no two epochs provision at once
    swap_lock: tokio::sync::Mutex<()>,
}

impl SessionInner {
    fn current(&self) -> Arc<Epoch> {
        self.active.read().clone()
    }

    fn start_provisioning(&self, epoch: Arc<Epoch>) {
        let provisioner = self.provisioner.clone();
        let session_id = self.session_id;

        tokio::spawn(async move {
            let outcome = provisioner.provision(epoch.id, epoch.handle.clone()).await;
            let resolution = match outcome {
                Ok(_) => {
                    info!(%session_id, "Epoch {} is ready", epoch.id);
                    Ok(epoch.handle.clone())
                }
                Err(failure) => {
                    warn!(
                        %session_id,
                        "Epoch {} failed: indexes {:?} could not be installed",
                        epoch.id,
                        failure.failed_indexes()
                    );
                    Err(Arc::new(failure))
                }
            };
            epoch.gate.resolve(resolution);
        });
    }
}

/// Stable accessor for the active store handle
///
/// Owns the current epoch (handle + readiness gate). Every operation waits for
/// the active epoch's indexes before touching the store; `swap_handle`
/// replaces the epoch without invalidating clones of the session.
///
/// Must be opened from within a tokio runtime: provisioning runs on spawned
/// tasks.
#[derive(Clone)]
pub struct StoreSession {
    inner: Arc<SessionInner>,
}

impl StoreSession {
    /// Open a session on `handle` and start provisioning `catalog` against it
    pub fn open(handle: StoreHandle, catalog: IndexCatalog, config: &SessionConfig) -> Self {
        let session_id = Uuid::new_v4();
        let epoch = Arc::new(Epoch::new(1, handle));

        let inner = Arc::new(SessionInner {
            session_id,
            active: RwLock::new(epoch.clone()),
            provisioner: IndexProvisioner::new(Arc::new(catalog)),
            engine: WriteRetryEngine::new(config.retry_policy()),
            swap_lock: tokio::sync::Mutex::new(()),
        });

        info!(%session_id, "Opening store session");
        inner.start_provisioning(epoch);
        Self { inner }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    /// Id of the active epoch (1 for the initial handle, +1 per swap)
    pub fn epoch(&self) -> u64 {
        self.inner.current().id
    }

    /// Gate of the active epoch
    pub fn current_gate(&self) -> ReadinessGate {
        self.inner.current().gate.clone()
    }

    pub fn catalog(&self) -> &IndexCatalog {
        self.inner.provisioner.catalog()
    }

    pub fn engine(&self) -> &WriteRetryEngine {
        &self.inner.engine
    }

    /// Active handle once all indexes are installed, or the install errors
    pub async fn ready(&self) -> Result<StoreHandle> {
        self.current_gate().wait().await
    }

    pub async fn write_until_committed<M>(
        &self,
        target: impl Into<WriteTarget>,
        mutation: M,
    ) -> Result<Document>
    where
        M: FnMut(&mut Document) + Send,
    {
        let handle = self.ready().await?;
        self.inner
            .engine
            .write_until_committed(handle.as_ref(), target, mutation)
            .await
    }

    pub async fn set_fields_eventually(
        &self,
        target: impl Into<WriteTarget>,
        updates: Map<String, Value>,
    ) -> Result<Document> {
        let handle = self.ready().await?;
        self.inner
            .engine
            .set_fields_eventually(handle.as_ref(), target, updates)
            .await
    }

    pub async fn set_field_eventually(
        &self,
        target: impl Into<WriteTarget>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Document> {
        let handle = self.ready().await?;
        self.inner
            .engine
            .set_field_eventually(handle.as_ref(), target, key, value)
            .await
    }

    /// Replace the active handle and provision indexes against it.
    ///
    /// The candidate is probed with `info()` first; an unreachable candidate
    /// is rejected and the current epoch stays untouched. Otherwise the swap
    /// waits for the current epoch to settle (ready or failed), installs the
    /// new epoch and returns its gate.
    pub async fn swap_handle(&self, candidate: StoreHandle) -> Result<ReadinessGate> {
        let info = candidate.info().await.map_err(|err| {
            warn!(
                session_id = %self.inner.session_id,
                "Rejecting handle swap, candidate unreachable: {}", err
            );
            SessionError::Unreachable(err)
        })?;

        let _swap = self.inner.swap_lock.lock().await;
        let current = self.inner.current();
        current.gate.settled().await;

        let next = Arc::new(Epoch::new(current.id + 1, candidate));
        *self.inner.active.write() = next.clone();
        info!(
            session_id = %self.inner.session_id,
            "Swapped to store '{}' ({} docs): epoch {} -> {} (epoch {} served {}ms)",
            info.db_name,
            info.doc_count,
            current.id,
            next.id,
            current.id,
            (next.opened_at - current.opened_at).num_milliseconds()
        );

        self.inner.start_provisioning(next.clone());
        Ok(next.gate.clone())
    }
}
