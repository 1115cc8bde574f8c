/*!
Scheduled cleanup of expired log records
*/

use std::io::Write;

use chrono::Utc;
use tracing::{info, warn};

use crate::core::{config::RetentionConfig, error::StoreResult, record_store::RecordStore};

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Completion notice expected by operators watching the scheduler output.
const COMPLETION_NOTICE: &str =
    " Deleted old log records from last_viewed_course_module log store.";

/// Deletes records older than the configured lifetime. Stateless between
/// runs; each sweep is a function of the clock and the current record set.
pub struct CleanupTask {
    loglifetime_days: u32,
}

impl CleanupTask {
    pub fn new(retention: &RetentionConfig) -> Self {
        Self {
            loglifetime_days: retention.loglifetime_days,
        }
    }

    /// Run one sweep against the wall clock and the operator console.
    pub async fn execute(&self, records: &RecordStore) -> StoreResult<usize> {
        self.execute_at(records, Utc::now().timestamp(), &mut std::io::stdout())
            .await
    }

    /// Run one sweep with an explicit clock and output sink.
    ///
    /// A lifetime of 0 keeps everything. The completion notice is written
    /// whether or not anything was deleted; only storage failures propagate.
    pub async fn execute_at<W: Write>(
        &self,
        records: &RecordStore,
        now: i64,
        out: &mut W,
    ) -> StoreResult<usize> {
        let deleted = if self.loglifetime_days == 0 {
            0
        } else {
            let cutoff = now - i64::from(self.loglifetime_days) * SECS_PER_DAY;
            records.delete_older_than(cutoff).await?
        };

        if deleted > 0 {
            info!("Cleanup task removed {} expired record(s)", deleted);
        }

        if let Err(e) = writeln!(out, "{COMPLETION_NOTICE}") {
            warn!("Could not write cleanup completion notice: {}", e);
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RetentionConfig;

    fn retention(days: u32) -> RetentionConfig {
        RetentionConfig {
            loglifetime_days: days,
            sweep_interval_secs: 3600,
        }
    }

    #[tokio::test]
    async fn zero_lifetime_keeps_everything_but_still_reports() {
        let records = RecordStore::open_in_memory().await.unwrap();
        records.upsert(1, 1, 0, None).await.unwrap();

        let task = CleanupTask::new(&retention(0));
        let mut out = Vec::new();
        let deleted = task.execute_at(&records, 1_000_000_000, &mut out).await.unwrap();

        assert_eq!(deleted, 0);
        assert_eq!(records.count().await.unwrap(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            " Deleted old log records from last_viewed_course_module log store.\n"
        );
    }

    #[tokio::test]
    async fn cutoff_spares_records_inside_the_lifetime() {
        let records = RecordStore::open_in_memory().await.unwrap();
        let now = 1_000_000_000;
        records.upsert(1, 1, now - 2 * SECS_PER_DAY, None).await.unwrap();
        records.upsert(2, 1, now - SECS_PER_DAY / 2, None).await.unwrap();

        let task = CleanupTask::new(&retention(1));
        let mut out = Vec::new();
        let deleted = task.execute_at(&records, now, &mut out).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(records.get(1).await.unwrap().is_none());
        assert!(records.get(2).await.unwrap().is_some());
    }
}
