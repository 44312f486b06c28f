//! Measurement log backends
//!
//! Every value update received by the ingestion service is appended to a
//! measurement log, which can later be read back for recent-history queries.
//!
//! ## Backends
//!
//! - **CSV file** (default): append-only text file with an `Id,CurrentValue,Date` header
//! - **In-Memory** (fallback): no persistence, for testing or when disabled in config
//!
//! ## Usage
//!
//! ```no_run
//! use network_service::storage::{MeasurementStore, csv_log::CsvLog, schema::MeasurementRecord};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let log = CsvLog::new("./Logs/Log.txt");
//!     log.append(MeasurementRecord::now(1, 272.0)).await?;
//!     let history = log.recent_for_entity(1, 5).await?;
//!     println!("{history:?}");
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod backend;
pub mod csv_log;
pub mod error;
pub mod memory;
pub mod schema;

pub use backend::{DEFAULT_HISTORY_LIMIT, MeasurementStore};
pub use error::{CorruptionKind, StorageError, StorageResult};
pub use schema::MeasurementRecord;

use crate::config::StorageConfig;

/// Build the measurement log described by the configuration
pub fn open(config: &StorageConfig) -> Arc<dyn MeasurementStore> {
    match config {
        StorageConfig::None => Arc::new(memory::MemoryLog::new()),
        StorageConfig::Csv { path } => Arc::new(csv_log::CsvLog::new(path.clone())),
    }
}
