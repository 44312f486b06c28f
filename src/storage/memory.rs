//! In-memory measurement log (no persistence)
//!
//! Used when no log file is configured and in tests. Same query semantics
//! as the file-backed log, but all data is lost on restart.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::backend::MeasurementStore;
use super::error::StorageResult;
use super::schema::MeasurementRecord;

#[derive(Default)]
pub struct MemoryLog {
    records: RwLock<Vec<MeasurementRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MeasurementStore for MemoryLog {
    async fn append(&self, record: MeasurementRecord) -> StorageResult<()> {
        trace!("in-memory log: appending {}", record.to_row());
        self.records.write().await.push(record);
        Ok(())
    }

    async fn load_all(&self) -> StorageResult<Vec<MeasurementRecord>> {
        Ok(self.records.read().await.clone())
    }

    fn describe(&self) -> String {
        "in-memory log".to_string()
    }
}
