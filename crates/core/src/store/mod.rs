//! SQLite-backed partitioned store for response snapshots.
//!
//! Persistent key-value store with async access via tokio-rusqlite:
//!
//! - Snapshots keyed by sha256 cache key within a named partition
//! - Partitions as generation-tagged buckets, deleted whole
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! Every write is a single atomic key replacement executed on the
//! connection's background thread, so readers never observe a partially
//! written snapshot.

pub mod connection;
pub mod key;
pub mod migrations;
pub mod partitions;
pub mod snapshots;

pub use crate::Error;

pub use connection::StoreDb;
pub use key::compute_cache_key;
pub use partitions::PartitionHandle;
pub use snapshots::ResponseSnapshot;
