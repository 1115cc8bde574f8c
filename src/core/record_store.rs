/*!
Persistent storage for per-module last-updated records
*/

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{StoreError, StoreResult};

/// One row per course module, refreshed in place on every qualifying event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub cmid: i64,
    pub courseid: i64,
    pub lasttimeupdated: i64,
    /// JSON event detail; present only when `jsonformat` was enabled at
    /// write time.
    pub other: Option<String>,
}

/// Owns the connection to the log table and every statement touching it.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open (or create) the store at the given path.
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self { conn };
        store.initialize_schema()?;
        info!("Record store opened at {:?}", path.as_ref());
        Ok(store)
    }

    /// In-memory store, used by the test suites.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS lastupdated_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cmid INTEGER NOT NULL UNIQUE,
                courseid INTEGER NOT NULL,
                lasttimeupdated INTEGER NOT NULL,
                other TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_log_courseid ON lastupdated_log(courseid);
            CREATE INDEX IF NOT EXISTS idx_log_lasttimeupdated ON lastupdated_log(lasttimeupdated);
        "#,
        )?;

        Ok(())
    }

    /// Refresh the record for a module, inserting it on first sight.
    ///
    /// Update-first keeps the row id stable across refreshes. If the insert
    /// fallback loses a race with a concurrent writer, the unique constraint
    /// fires and the row that writer created is updated instead.
    pub async fn upsert(
        &self,
        cmid: i64,
        courseid: i64,
        lasttimeupdated: i64,
        other: Option<&str>,
    ) -> StoreResult<()> {
        if self.try_update(cmid, courseid, lasttimeupdated, other)? {
            debug!("Refreshed record for course module {}", cmid);
            return Ok(());
        }

        match self.try_insert(cmid, courseid, lasttimeupdated, other) {
            Ok(()) => {
                debug!("Created record for course module {}", cmid);
                Ok(())
            }
            Err(e) if StoreError::is_constraint_violation(&e) => {
                if self.try_update(cmid, courseid, lasttimeupdated, other)? {
                    Ok(())
                } else {
                    Err(StoreError::WriteConflict { cmid })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn try_update(
        &self,
        cmid: i64,
        courseid: i64,
        lasttimeupdated: i64,
        other: Option<&str>,
    ) -> SqliteResult<bool> {
        let changed = self.conn.execute(
            "UPDATE lastupdated_log
             SET courseid = ?2, lasttimeupdated = ?3, other = ?4
             WHERE cmid = ?1",
            (cmid, courseid, lasttimeupdated, other),
        )?;
        Ok(changed > 0)
    }

    fn try_insert(
        &self,
        cmid: i64,
        courseid: i64,
        lasttimeupdated: i64,
        other: Option<&str>,
    ) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO lastupdated_log (cmid, courseid, lasttimeupdated, other)
             VALUES (?1, ?2, ?3, ?4)",
            (cmid, courseid, lasttimeupdated, other),
        )?;
        Ok(())
    }

    /// Get the record for a module, if it has one.
    pub async fn get(&self, cmid: i64) -> StoreResult<Option<EventRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT cmid, courseid, lasttimeupdated, other
                 FROM lastupdated_log WHERE cmid = ?1",
                [cmid],
                |row| {
                    Ok(EventRecord {
                        cmid: row.get(0)?,
                        courseid: row.get(1)?,
                        lasttimeupdated: row.get(2)?,
                        other: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// All records, oldest row first.
    pub async fn all(&self) -> StoreResult<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT cmid, courseid, lasttimeupdated, other
             FROM lastupdated_log ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(EventRecord {
                cmid: row.get(0)?,
                courseid: row.get(1)?,
                lasttimeupdated: row.get(2)?,
                other: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    pub async fn count(&self) -> StoreResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM lastupdated_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remove the record for one module. Missing records are a no-op.
    pub async fn delete_module(&self, cmid: i64) -> StoreResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM lastupdated_log WHERE cmid = ?1", [cmid])?;
        debug!("Deleted {} record(s) for course module {}", deleted, cmid);
        Ok(deleted)
    }

    /// Remove every record belonging to a course in one statement.
    pub async fn delete_course(&self, courseid: i64) -> StoreResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM lastupdated_log WHERE courseid = ?1", [courseid])?;
        debug!("Deleted {} record(s) for course {}", deleted, courseid);
        Ok(deleted)
    }

    /// Remove records last updated strictly before the cutoff timestamp.
    pub async fn delete_older_than(&self, cutoff: i64) -> StoreResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM lastupdated_log WHERE lasttimeupdated < ?1",
            [cutoff],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_inserts_then_updates_in_place() {
        let store = RecordStore::open_in_memory().await.unwrap();
        store.upsert(5, 1, 100, None).await.unwrap();
        store.upsert(5, 1, 200, Some(r#"{"name":"quiz"}"#)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let record = store.get(5).await.unwrap().unwrap();
        assert_eq!(record.lasttimeupdated, 200);
        assert_eq!(record.other.as_deref(), Some(r#"{"name":"quiz"}"#));
    }

    #[tokio::test]
    async fn insert_race_falls_back_to_update() {
        let store = RecordStore::open_in_memory().await.unwrap();
        // Simulate the losing side of the race: the row already exists when
        // the insert fires.
        store.try_insert(9, 2, 100, None).unwrap();
        let err = store.try_insert(9, 2, 150, None).unwrap_err();
        assert!(StoreError::is_constraint_violation(&err));

        // The public upsert converges on the latest write regardless.
        store.upsert(9, 2, 150, None).await.unwrap();
        assert_eq!(store.get(9).await.unwrap().unwrap().lasttimeupdated, 150);
    }

    #[tokio::test]
    async fn delete_older_than_is_strict() {
        let store = RecordStore::open_in_memory().await.unwrap();
        store.upsert(1, 1, 99, None).await.unwrap();
        store.upsert(2, 1, 100, None).await.unwrap();
        store.upsert(3, 1, 101, None).await.unwrap();

        let deleted = store.delete_older_than(100).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = store.all().await.unwrap();
        assert_eq!(
            remaining.iter().map(|r| r.cmid).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }
}
