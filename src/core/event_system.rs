/*!
Event types delivered by the host platform after commit
*/

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::Stream;
use tracing::{error, warn};

use crate::core::error::{StoreError, StoreResult};

/// Discriminator for the course and module events the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CourseViewed,
    ModuleCreated,
    ModuleUpdated,
    ModuleDeleted,
    CourseDeleted,
}

/// A single event as handed over by the host event bus, already committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEvent {
    pub kind: EventKind,
    /// Course module id; absent on course-level events.
    #[serde(default)]
    pub cmid: Option<i64>,
    /// Owning course.
    pub courseid: i64,
    /// Unix timestamp the event was committed at.
    pub timecreated: i64,
    /// Extra event detail, stored verbatim when JSON payloads are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<serde_json::Value>,
}

impl CourseEvent {
    pub fn module_created(cmid: i64, courseid: i64, timecreated: i64) -> Self {
        Self {
            kind: EventKind::ModuleCreated,
            cmid: Some(cmid),
            courseid,
            timecreated,
            other: None,
        }
    }

    pub fn module_updated(cmid: i64, courseid: i64, timecreated: i64) -> Self {
        Self {
            kind: EventKind::ModuleUpdated,
            cmid: Some(cmid),
            courseid,
            timecreated,
            other: None,
        }
    }

    pub fn module_deleted(cmid: i64, courseid: i64, timecreated: i64) -> Self {
        Self {
            kind: EventKind::ModuleDeleted,
            cmid: Some(cmid),
            courseid,
            timecreated,
            other: None,
        }
    }

    pub fn course_deleted(courseid: i64, timecreated: i64) -> Self {
        Self {
            kind: EventKind::CourseDeleted,
            cmid: None,
            courseid,
            timecreated,
            other: None,
        }
    }

    pub fn course_viewed(courseid: i64, timecreated: i64) -> Self {
        Self {
            kind: EventKind::CourseViewed,
            cmid: None,
            courseid,
            timecreated,
            other: None,
        }
    }

    /// Attach extra event detail.
    pub fn with_other(mut self, other: serde_json::Value) -> Self {
        self.other = Some(other);
        self
    }

    /// The module id, required for module-level events.
    pub fn require_cmid(&self) -> StoreResult<i64> {
        self.cmid.ok_or_else(|| {
            StoreError::MalformedEvent(format!("{:?} event without cmid", self.kind))
        })
    }
}

/// Reads newline-delimited JSON events from the host side of the bus.
pub struct EventFeed<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> EventFeed<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Turn the feed into a stream of parsed events. Lines that do not
    /// parse are logged and dropped so one bad event cannot stall the bus.
    pub fn into_stream(self) -> impl Stream<Item = CourseEvent> {
        let mut lines = self.reader.lines();

        async_stream::stream! {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<CourseEvent>(line) {
                            Ok(event) => yield event,
                            Err(e) => warn!("Dropping unparseable event: {}", e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Event feed read error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn event_kind_uses_snake_case_wire_names() {
        let event: CourseEvent = serde_json::from_str(
            r#"{"kind":"module_updated","cmid":7,"courseid":3,"timecreated":1700000000}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventKind::ModuleUpdated);
        assert_eq!(event.cmid, Some(7));
        assert!(event.other.is_none());
    }

    #[test]
    fn require_cmid_flags_missing_field() {
        let event: CourseEvent = serde_json::from_str(
            r#"{"kind":"module_created","courseid":3,"timecreated":1700000000}"#,
        )
        .unwrap();
        assert!(matches!(
            event.require_cmid(),
            Err(StoreError::MalformedEvent(_))
        ));
    }

    #[tokio::test]
    async fn feed_skips_blank_and_bad_lines() {
        let input = concat!(
            r#"{"kind":"module_created","cmid":1,"courseid":2,"timecreated":10}"#,
            "\n\n",
            "not json\n",
            r#"{"kind":"course_deleted","courseid":2,"timecreated":11}"#,
            "\n",
        );
        let feed = EventFeed::new(input.as_bytes());
        let events: Vec<CourseEvent> = feed.into_stream().collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::ModuleCreated);
        assert_eq!(events[1].kind, EventKind::CourseDeleted);
    }
}
