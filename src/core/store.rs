/*!
Store facade that routes committed host events to the record handlers
*/

use tracing::{debug, info, warn};

use crate::core::{
    config::StoreConfig,
    error::{StoreError, StoreResult},
    event_system::{CourseEvent, EventKind},
    record_store::RecordStore,
};

/// Entry point the host event bus calls once per committed event.
pub struct Store {
    config: StoreConfig,
    records: RecordStore,
}

impl Store {
    /// Open the record store at the configured path and wire it up.
    pub async fn new(config: StoreConfig) -> StoreResult<Self> {
        let records = RecordStore::open(&config.store.db_path).await?;
        info!(
            "Log store initialized (enabled: {}, jsonformat: {})",
            config.store.enabled, config.store.jsonformat
        );
        Ok(Self { config, records })
    }

    /// Build a store around an already-open record store.
    pub fn from_parts(config: StoreConfig, records: RecordStore) -> Self {
        Self { config, records }
    }

    /// Whether the store is active. A disabled store ignores every event.
    pub fn is_logging(&self) -> bool {
        self.config.store.enabled
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Handle one committed event.
    ///
    /// Malformed events are logged and dropped so the dispatch loop keeps
    /// running; storage and write-conflict errors surface to the caller.
    pub async fn handle(&self, event: &CourseEvent) -> StoreResult<()> {
        if !self.is_logging() {
            return Ok(());
        }

        let result = match event.kind {
            EventKind::ModuleCreated | EventKind::ModuleUpdated => {
                self.upsert_module(event).await
            }
            EventKind::ModuleDeleted => self.delete_module(event).await,
            EventKind::CourseDeleted => self.delete_course(event).await,
            EventKind::CourseViewed => {
                // Course views do not touch module records.
                debug!("Ignoring course_viewed event for course {}", event.courseid);
                Ok(())
            }
        };

        match result {
            Err(StoreError::MalformedEvent(reason)) => {
                warn!("Dropping malformed {:?} event: {}", event.kind, reason);
                Ok(())
            }
            other => other,
        }
    }

    async fn upsert_module(&self, event: &CourseEvent) -> StoreResult<()> {
        let cmid = event.require_cmid()?;
        let other = self.serialize_payload(event)?;
        self.records
            .upsert(cmid, event.courseid, event.timecreated, other.as_deref())
            .await
    }

    async fn delete_module(&self, event: &CourseEvent) -> StoreResult<()> {
        let cmid = event.require_cmid()?;
        self.records.delete_module(cmid).await?;
        Ok(())
    }

    async fn delete_course(&self, event: &CourseEvent) -> StoreResult<()> {
        let deleted = self.records.delete_course(event.courseid).await?;
        if deleted > 0 {
            debug!("Course {} deletion removed {} record(s)", event.courseid, deleted);
        }
        Ok(())
    }

    /// Serialize the event detail when JSON payloads are enabled, otherwise
    /// store nothing.
    fn serialize_payload(&self, event: &CourseEvent) -> StoreResult<Option<String>> {
        if !self.config.store.jsonformat {
            return Ok(None);
        }
        match &event.other {
            Some(value) => serde_json::to_string(value)
                .map(Some)
                .map_err(|e| StoreError::MalformedEvent(format!("unserializable detail: {e}"))),
            None => Ok(None),
        }
    }
}
