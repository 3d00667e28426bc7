//! Storage backends for classified record persistence
//!
//! Trait-based abstraction over the durable store. The ingestion pipeline
//! treats it as an opaque append-only gateway; dashboards read back through
//! the same trait.
//!
//! ## Backends
//!
//! - **SQLite** (default, feature `storage-sqlite`): embedded database
//! - **In-Memory**: ring buffers, for tests or running without persistence

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{BackendHealth, StorageBackend};
pub use error::{StorageError, StorageResult};
