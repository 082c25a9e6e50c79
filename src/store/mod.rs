//! Persistent key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! circuit breaker
//!     → KeyValueStore::get(marker_key)   (every status query)
//!     → KeyValueStore::set(marker_key)   (probe failure)
//!     → KeyValueStore::remove(marker_key) (marker expired)
//!
//! memory.rs: process-local map, shared by cloning (tests, single process)
//! file.rs:   one file per key in a directory, visible to every process
//! ```
//!
//! # Design Decisions
//! - String values only; callers own serialization
//! - Single-key reads and writes are the only atomicity guarantee
//! - Last writer wins, no versioning

pub mod file;
pub mod memory;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors that can occur while touching the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage could not be read or written.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable string storage shared between concurrently running instances.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
