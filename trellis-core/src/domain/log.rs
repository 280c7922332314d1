//! Log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tail value meaning "all available history".
pub const TAIL_ALL: i64 = -1;

/// One log line produced by a service.
///
/// `timestamp` is absent only when the provider cannot supply one; such
/// entries are never excluded by time-window filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLogEntry {
    pub service_name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub msg: String,
}

impl ServiceLogEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(service_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            timestamp: Some(Utc::now()),
            msg: msg.into(),
        }
    }
}

/// A caller-supplied log request, with defaults already merged.
///
/// Built from a schema-validated parameter value by
/// [`LogQuery::from_validated`](crate::actions::service_logs); providers
/// receive it fully defaulted and never see raw parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogQuery {
    pub service_name: String,
    /// Keep the stream open for new entries until cancelled.
    pub follow: bool,
    /// At most this many of the most recent historical entries, or
    /// [`TAIL_ALL`] for everything.
    pub tail: i64,
    /// Entries strictly older than this instant are excluded.
    pub start_time: Option<DateTime<Utc>>,
}

impl LogQuery {
    /// Creates a query for a service with the declared defaults
    /// (`follow = false`, `tail = TAIL_ALL`, no start time).
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            follow: false,
            tail: TAIL_ALL,
            start_time: None,
        }
    }

    /// Whether the query bounds the historical window.
    pub fn has_tail(&self) -> bool {
        self.tail >= 0
    }

    /// Applies the `start_time` window to an entry.
    ///
    /// Entries without a timestamp always pass; with no `start_time`
    /// everything passes.
    pub fn includes(&self, entry: &ServiceLogEntry) -> bool {
        match (self.start_time, entry.timestamp) {
            (Some(start), Some(ts)) => ts >= start,
            _ => true,
        }
    }
}
