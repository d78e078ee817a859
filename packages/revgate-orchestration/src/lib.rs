/*
 * Revgate Orchestration - store session coordination
 *
 * Client-side layer in front of a revision-checked document store.
 *
 * Architecture:
 * - Readiness Gate (single-assignment, one per epoch)
 * - Index Provisioning (fan-out/fan-in, idempotent installs)
 * - Write Retry Engine (conflict-driven read-modify-write loop)
 * - Field Setter (revision-oblivious updates)
 * - Store Session (active handle, handle swap)
 */

// Public modules
pub mod config;
pub mod error;
pub mod gate;
pub mod provision;
pub mod retry;
pub mod session;
pub mod setter;
pub mod telemetry;
pub mod writer;

// Re-exports
pub use config::{ConfigError, LoggingConfig, RetryConfig, SessionConfig};
pub use error::{ErrorCategory, Result, SessionError};
pub use gate::{GateState, ReadinessGate};
pub use provision::{
    IndexInstallError, IndexProvisioner, InstallOutcome, ProvisionFailure, ProvisionReport,
};
pub use retry::RetryPolicy;
pub use session::StoreSession;
pub use telemetry::init_tracing;
pub use writer::{WriteRetryEngine, WriteTarget};
