use std::fmt;
use std::sync::Arc;

use revgate_storage::StoreHandle;
use tokio::sync::watch;

use crate::error::{Result, SessionError};
use crate::provision::ProvisionFailure;

/// Resolution state of one epoch's readiness gate
#[derive(Clone)]
pub enum GateState {
    Pending,
    Ready(StoreHandle),
    Failed(Arc<ProvisionFailure>),
}

impl GateState {
    pub fn is_pending(&self) -> bool {
        matches!(self, GateState::Pending)
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            GateState::Pending => "pending",
            GateState::Ready(_) => "ready",
            GateState::Failed(_) => "failed",
        }
    }
}

impl fmt::Debug for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Failed(failure) => {
                write!(f, "Failed({} errors)", failure.errors.len())
            }
            other => f.write_str(other.state_name()),
        }
    }
}

/// Single-assignment readiness signal for one epoch
///
/// Transitions `Pending -> Ready` or `Pending -> Failed` exactly once; later
/// resolutions are ignored. Clones share the same underlying signal.
#[derive(Clone)]
pub struct ReadinessGate {
    epoch: u64,
    tx: Arc<watch::Sender<GateState>>,
}

impl ReadinessGate {
    pub(crate) fn new(epoch: u64) -> Self {
        let (tx, _rx) = watch::channel(GateState::Pending);
        Self {
            epoch,
            tx: Arc::new(tx),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Snapshot of the current state
    pub fn state(&self) -> GateState {
        self.tx.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        !self.tx.borrow().is_pending()
    }

    /// Returns false if the gate had already been resolved.
    pub(crate) fn resolve(
        &self,
        outcome: std::result::Result<StoreHandle, Arc<ProvisionFailure>>,
    ) -> bool {
        let next = match outcome {
            Ok(handle) => GateState::Ready(handle),
            Err(failure) => GateState::Failed(failure),
        };

        self.tx.send_if_modified(move |state| {
            if state.is_pending() {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Wait for the epoch to resolve and return its handle
    pub async fn wait(&self) -> Result<StoreHandle> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(|state| !state.is_pending())
            .await
            .map_err(|_| SessionError::GateClosed(self.epoch))?;

        match &*state {
            GateState::Ready(handle) => Ok(handle.clone()),
            GateState::Failed(failure) => Err(SessionError::Provisioning(failure.clone())),
            GateState::Pending => Err(SessionError::GateClosed(self.epoch)),
        }
    }

    /// Wait for the epoch to resolve, whatever the outcome
    pub async fn settled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|state| !state.is_pending()).await;
    }
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("epoch", &self.epoch)
            .field("state", &*self.tx.borrow())
            .finish()
    }
}
