//! Infrastructure layer - Store adapters
//!
//! - `memory`: in-process adapter with fault injection (tests, local runs)

pub mod memory;

pub use memory::InMemoryDocumentStore;
