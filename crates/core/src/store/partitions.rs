//! Partition lifecycle operations.
//!
//! A partition is a named bucket of snapshots carrying a generation tag in
//! its name. Partitions are opened (created if absent), enumerated, and
//! deleted whole; deletion is the only way snapshots are destroyed in bulk.

use super::connection::StoreDb;
use crate::Error;
use tokio_rusqlite::params;

/// Handle to an open partition.
///
/// Holding a handle guarantees the partition row exists; it does not pin
/// the partition against deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionHandle {
    name: String,
}

impl PartitionHandle {
    pub(crate) fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl StoreDb {
    /// Open a partition by name, creating it if it doesn't exist.
    pub async fn open_partition(&self, name: &str) -> Result<PartitionHandle, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("partition name cannot be empty".into()));
        }

        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(PartitionHandle::new(name))
    }

    /// Look up an existing partition without creating it.
    ///
    /// Read paths use this so that a lookup never materializes a
    /// partition; partitions come into being at install or on first write.
    pub async fn find_partition(&self, name: &str) -> Result<Option<PartitionHandle>, Error> {
        let owned = name.to_string();
        let exists: bool = self
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![owned],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)?;

        Ok(exists.then(|| PartitionHandle::new(name)))
    }

    /// Enumerate all partition names, ordered by name.
    pub async fn list_partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and every snapshot it holds.
    ///
    /// Returns true if a partition of that name existed.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![owned])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
