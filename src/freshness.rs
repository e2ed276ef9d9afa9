//! Message-set freshness tracking.
//!
//! The server keeps one process-wide watermark: the timestamp of the most
//! recent successful write to the message set. Clients hold a cursor (the
//! timestamp of their last completed full fetch) and poll by comparing the
//! two. The comparison is coarse: any write invalidates the whole set, and
//! clients re-fetch everything rather than diffing.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Request header carrying the client's cursor on poll checks.
pub const LAST_UPDATE_HEADER: &str = "last-update";

/// Timestamp of the last write to the message set.
///
/// Monotonically non-decreasing. Writers race benignly: concurrent
/// `advance` calls settle on some writer's "now" via `fetch_max`, and any
/// value close to the present is an acceptable upper bound for triggering
/// a refetch. Readers never block.
#[derive(Debug)]
pub struct Watermark {
    last_write_micros: AtomicI64,
}

impl Watermark {
    /// Create a watermark stamped at process start.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a watermark with an explicit initial timestamp.
    pub fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            last_write_micros: AtomicI64::new(instant.timestamp_micros()),
        }
    }

    /// Record a successful write to the message set.
    ///
    /// Called by every successful create, update, or delete. The watermark
    /// never moves backwards, even under concurrent writers.
    pub fn advance(&self) {
        let now = Utc::now().timestamp_micros();
        self.last_write_micros.fetch_max(now, Ordering::AcqRel);
    }

    /// Has the message set changed since the given cursor?
    ///
    /// Pure comparison, no side effects.
    pub fn has_changed_since(&self, cursor: DateTime<Utc>) -> bool {
        self.last_write_micros.load(Ordering::Acquire) > cursor.timestamp_micros()
    }

    /// The timestamp of the most recent write.
    pub fn last_write(&self) -> DateTime<Utc> {
        let micros = self.last_write_micros.load(Ordering::Acquire);
        DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a client-supplied cursor value.
///
/// A missing or unparsable cursor is treated as the Unix epoch: the client
/// has never seen anything, so the poll check conservatively reports
/// updates rather than starving it of data.
pub fn parse_cursor(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Format a cursor for the `Last-Update` header.
pub fn format_cursor(cursor: DateTime<Utc>) -> String {
    cursor.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Result of a poll check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    /// Whether the message set changed since the client's cursor.
    pub has_updates: bool,
    /// Server time of this check. Informational; clients stamp their
    /// cursor at local refetch-completion time instead.
    pub last_check: DateTime<Utc>,
}
