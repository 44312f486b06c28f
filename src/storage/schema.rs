//! Measurement record and its on-disk row format
//!
//! The log is a comma-separated text file:
//!
//! ```text
//! Id,CurrentValue,Date
//! 1,272,2024-05-01 12:00:03
//! 2,55.5,2024-05-01 12:00:04
//! ```
//!
//! Timestamps are local wall-clock time with second precision.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// First line of every log file
pub const HEADER: &str = "Id,CurrentValue,Date";

/// Format of the `Date` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One value update for one server at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub entity_id: EntityId,
    pub value: f64,
    pub timestamp: NaiveDateTime,
}

impl MeasurementRecord {
    pub fn new(entity_id: EntityId, value: f64, timestamp: NaiveDateTime) -> Self {
        Self {
            entity_id,
            value,
            timestamp,
        }
    }

    /// Record stamped with the current local time, truncated to whole seconds
    /// so it survives a write/read cycle unchanged.
    pub fn now(entity_id: EntityId, value: f64) -> Self {
        let now = Local::now().naive_local();
        let timestamp = now.with_nanosecond(0).unwrap_or(now);
        Self::new(entity_id, value, timestamp)
    }

    /// Render as a log row (without line terminator).
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{}",
            self.entity_id,
            self.value,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }

    /// Parse a single log row.
    pub fn from_row(row: &str) -> Result<Self, String> {
        let mut fields = row.trim_end().split(',');
        let (Some(id), Some(value), Some(date), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(format!("expected 3 fields in {row:?}"));
        };

        let entity_id = id
            .trim()
            .parse::<EntityId>()
            .map_err(|e| format!("invalid id {id:?}: {e}"))?;
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid value {value:?}: {e}"))?;
        let timestamp = NaiveDateTime::parse_from_str(date.trim(), TIMESTAMP_FORMAT)
            .map_err(|e| format!("invalid date {date:?}: {e}"))?;

        Ok(Self::new(entity_id, value, timestamp))
    }
}
