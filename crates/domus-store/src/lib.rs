//! Domus Store: SQLite matters, documents, scans and findings, plus a
//! filesystem blob store for uploaded bytes.

pub mod blob;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use blob::{BlobStore, FsBlobStore};
pub use sqlite::SqliteStore;
pub use types::*;
