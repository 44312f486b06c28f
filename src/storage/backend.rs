//! Measurement store trait definition
//!
//! This module defines the `MeasurementStore` trait that all
//! measurement log implementations must implement.

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::MeasurementRecord;
use crate::entity::EntityId;

/// Number of records returned by a history query when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Trait for append-only measurement logs
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared by every
/// ingestion worker.
///
/// ## Atomicity
///
/// `append` must never persist a partial record, even when called
/// concurrently from several tasks.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Append a single record, creating the log if needed
    async fn append(&self, record: MeasurementRecord) -> StorageResult<()>;

    /// Read every record in append order
    async fn load_all(&self) -> StorageResult<Vec<MeasurementRecord>>;

    /// The last `limit` records for one server, returned oldest first
    ///
    /// Reads the whole log, which is fine for the expected log sizes.
    async fn recent_for_entity(
        &self,
        entity_id: EntityId,
        limit: usize,
    ) -> StorageResult<Vec<MeasurementRecord>> {
        let records = self.load_all().await?;
        Ok(select_recent(records, entity_id, limit))
    }

    /// Short human-readable description (e.g. "CSV log at ./Logs/Log.txt")
    fn describe(&self) -> String;

    /// Release resources
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Pick the `limit` most recent records of `entity_id` and return them oldest first.
///
/// Records with identical timestamps keep their append order.
pub fn select_recent(
    records: Vec<MeasurementRecord>,
    entity_id: EntityId,
    limit: usize,
) -> Vec<MeasurementRecord> {
    // newest append first, so the stable sort breaks timestamp ties towards later appends
    let mut matching: Vec<_> = records
        .into_iter()
        .rev()
        .filter(|r| r.entity_id == entity_id)
        .collect();
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    matching.truncate(limit);
    matching.reverse();
    matching
}
