use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use revgate_storage::{
    DocumentStore, IndexCatalog, IndexDefinition, Revision, StoreError, StoreHandle,
};
use thiserror::Error;
use tracing::{debug, error, info};

/// Outcome of a single successful install attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Design document written by this attempt
    Installed(Revision),
    /// Design document already in the store (create collided)
    AlreadyPresent,
}

/// Hard failure installing one index
#[derive(Debug, Error)]
#[error("index '{index}': {error}")]
pub struct IndexInstallError {
    pub index: String,
    #[source]
    pub error: StoreError,
}

/// Failed epoch: at least one index could not be installed
#[derive(Debug)]
pub struct ProvisionFailure {
    pub epoch: u64,
    pub total: usize,
    /// Indexes that succeeded (installed or already present)
    pub installed: usize,
    pub errors: Vec<IndexInstallError>,
}

impl ProvisionFailure {
    pub fn failed_indexes(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.index.as_str()).collect()
    }
}

/// Successful epoch
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub epoch: u64,
    pub installed: Vec<String>,
    pub already_present: Vec<String>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl ProvisionReport {
    pub fn total(&self) -> usize {
        self.installed.len() + self.already_present.len()
    }
}

/// Fan-in aggregator: one `record` per finished install
struct ProvisionTally {
    epoch: u64,
    total: usize,
    installed: Vec<String>,
    already_present: Vec<String>,
    errors: Vec<IndexInstallError>,
}

impl ProvisionTally {
    fn new(epoch: u64, total: usize) -> Self {
        Self {
            epoch,
            total,
            installed: Vec::with_capacity(total),
            already_present: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn successes(&self) -> usize {
        self.installed.len() + self.already_present.len()
    }

    fn is_complete(&self) -> bool {
        self.successes() + self.errors.len() == self.total
    }

    fn record(&mut self, index: String, outcome: Result<InstallOutcome, StoreError>) {
        match outcome {
            Ok(InstallOutcome::Installed(rev)) => {
                debug!("Epoch {}: index {} installed ({})", self.epoch, index, rev);
                self.installed.push(index);
            }
            Ok(InstallOutcome::AlreadyPresent) => {
                debug!(
                    "Epoch {}: index {} already exists, therefore ignoring",
                    self.epoch, index
                );
                self.already_present.push(index);
            }
            Err(error) => {
                error!("Epoch {}: error installing index {}: {}", self.epoch, index, error);
                self.errors.push(IndexInstallError { index, error });
            }
        }
    }

    fn finish(self, elapsed_ms: u64) -> Result<ProvisionReport, ProvisionFailure> {
        if self.errors.is_empty() {
            info!(
                "Epoch {}: all {} indexes are now installed ({} new) in {}ms",
                self.epoch,
                self.total,
                self.installed.len(),
                elapsed_ms
            );
            Ok(ProvisionReport {
                epoch: self.epoch,
                installed: self.installed,
                already_present: self.already_present,
                duration_ms: elapsed_ms,
                finished_at: Utc::now(),
            })
        } else {
            let installed = self.successes();
            error!(
                "Epoch {}: {} of {} indexes failed to install",
                self.epoch,
                self.errors.len(),
                self.total
            );
            Err(ProvisionFailure {
                epoch: self.epoch,
                total: self.total,
                installed,
                errors: self.errors,
            })
        }
    }
}

/// Installs every index of a catalog against a store handle
///
/// Each definition gets exactly one attempt, all attempts run concurrently,
/// and a hard failure never cancels the others.
#[derive(Debug, Clone)]
pub struct IndexProvisioner {
    catalog: Arc<IndexCatalog>,
}

impl IndexProvisioner {
    pub fn new(catalog: Arc<IndexCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &IndexCatalog {
        &self.catalog
    }

    /// Write one design document, treating a create collision as success
    pub async fn install_index(
        store: &dyn DocumentStore,
        definition: &IndexDefinition,
    ) -> Result<InstallOutcome, StoreError> {
        let design = definition.design_document();
        debug!("Installing index {} as {}", definition.name, design.id);

        match store.put(&design).await {
            Ok(resp) => Ok(InstallOutcome::Installed(resp.rev)),
            Err(err) if err.is_conflict() => Ok(InstallOutcome::AlreadyPresent),
            Err(err) => Err(err),
        }
    }

    /// Install the whole catalog against `handle`
    pub async fn provision(
        &self,
        epoch: u64,
        handle: StoreHandle,
    ) -> Result<ProvisionReport, ProvisionFailure> {
        let start = Instant::now();
        let total = self.catalog.len();
        info!("Epoch {}: there are {} indexes to install", epoch, total);

        let mut tally = ProvisionTally::new(epoch, total);

        let mut pending: FuturesUnordered<_> = self
            .catalog
            .iter()
            .map(|definition| {
                let definition = definition.clone();
                let index = definition.name.clone();
                let store = handle.clone();
                let task = tokio::spawn(async move {
                    Self::install_index(store.as_ref(), &definition).await
                });
                async move { (index, task.await) }
            })
            .collect();

        while let Some((index, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|join_err| {
                Err(StoreError::database(format!(
                    "install task for index {} panicked: {}",
                    index, join_err
                )))
            });
            tally.record(index, outcome);
        }

        debug_assert!(tally.is_complete());
        tally.finish(start.elapsed().as_millis() as u64)
    }
}
