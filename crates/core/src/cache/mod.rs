//! SQLite-backed storage for versioned response stores.
//!
//! Every deployment version owns one named store. All stores live in a
//! single database accessed asynchronously via tokio-rusqlite:
//!
//! - Request identities hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for overlapping reads and writes
//! - Whole-store deletion cascading to entries

pub mod activation;
pub mod connection;
pub mod hash;
pub mod migrations;
pub mod naming;
pub mod store;

pub use crate::Error;

pub use connection::CacheStorage;
pub use naming::StoreName;
pub use store::{RequestKey, Snapshot, Store};
