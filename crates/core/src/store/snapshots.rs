//! Snapshot read/write operations.
//!
//! A snapshot is an immutable capture of a response at the moment it was
//! stored. Writes are UPSERTs: a newer fetch replaces the whole row, never
//! mutates it in place.

use super::connection::StoreDb;
use super::partitions::PartitionHandle;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// An immutable captured response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    /// URL the response was fetched from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, if present.
    pub content_type: Option<String>,
    /// Response header pairs.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Vec<u8>,
    /// RFC3339 timestamp of when the snapshot was stored.
    pub stored_at: String,
}

impl ResponseSnapshot {
    /// Capture a response, stamping it with the current time.
    pub fn new(url: &str, status: u16, content_type: Option<String>, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            url: url.to_string(),
            status,
            content_type,
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// True for 2xx statuses. Only successful responses are ever persisted.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl StoreDb {
    /// Insert or replace a snapshot under a key.
    ///
    /// The replacement is a single atomic statement: a concurrent read
    /// sees either the old snapshot or the new one, never a mix.
    pub async fn put_snapshot(
        &self, partition: &PartitionHandle, key: &str, snapshot: &ResponseSnapshot,
    ) -> Result<(), Error> {
        let partition = partition.name().to_string();
        let key = key.to_string();
        let snapshot = snapshot.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                upsert(conn, &partition, &key, &snapshot)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of snapshots to a named partition in one transaction,
    /// creating the partition row if absent.
    ///
    /// All-or-nothing: if any row fails, the transaction rolls back and no
    /// partition row survives either. Used by precache install.
    pub async fn put_batch(
        &self, partition_name: &str, entries: Vec<(String, ResponseSnapshot)>,
    ) -> Result<PartitionHandle, Error> {
        if partition_name.is_empty() {
            return Err(Error::InvalidInput("partition name cannot be empty".into()));
        }

        let partition = partition_name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, created_at],
                )?;
                for (key, snapshot) in &entries {
                    upsert(&tx, &partition, key, snapshot)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(PartitionHandle::new(partition_name))
    }

    /// Get a snapshot by key.
    ///
    /// Returns None if the key is absent; a miss is never an error.
    pub async fn get_snapshot(&self, partition: &PartitionHandle, key: &str) -> Result<Option<ResponseSnapshot>, Error> {
        let partition = partition.name().to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let result = conn.query_row(
                    "SELECT url, status, content_type, headers_json, body, stored_at
                     FROM snapshots WHERE partition = ?1 AND key = ?2",
                    params![partition, key],
                    |row| {
                        let headers_json: String = row.get(3)?;
                        Ok(ResponseSnapshot {
                            url: row.get(0)?,
                            status: row.get::<_, i64>(1)? as u16,
                            content_type: row.get(2)?,
                            headers: serde_json::from_str(&headers_json).unwrap_or_default(),
                            body: row.get(4)?,
                            stored_at: row.get(5)?,
                        })
                    },
                );

                match result {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Count the snapshots a partition holds.
    pub async fn count_snapshots(&self, partition: &PartitionHandle) -> Result<u64, Error> {
        let partition = partition.name().to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM snapshots WHERE partition = ?1",
                    params![partition],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

fn upsert(conn: &rusqlite::Connection, partition: &str, key: &str, snapshot: &ResponseSnapshot) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&snapshot.headers)
        .map_err(|e| Error::InvalidInput(format!("unserializable headers: {e}")))?;
    conn.execute(
        "INSERT INTO snapshots (partition, key, url, status, content_type, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(partition, key) DO UPDATE SET
            url = excluded.url,
            status = excluded.status,
            content_type = excluded.content_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition,
            key,
            &snapshot.url,
            snapshot.status as i64,
            &snapshot.content_type,
            headers_json,
            &snapshot.body,
            &snapshot.stored_at,
        ],
    )?;
    Ok(())
}
