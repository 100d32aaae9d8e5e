//! In-memory storage backend.
//!
//! Holds every table behind a single `tokio::sync::RwLock`, so each write
//! operation (including the appointment slot check) is atomic. Intended for
//! development and tests; nothing survives a restart.

mod storage;

pub use storage::InMemoryStorage;
