//! File-backed measurement log
//!
//! Every append opens the file, writes one complete row (plus the header when
//! the file is new), flushes and closes it again. A short-lived mutex keeps
//! concurrent appends from interleaving; it is never held between calls.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace};

use super::backend::MeasurementStore;
use super::error::{CorruptionKind, StorageError, StorageResult};
use super::schema::{HEADER, MeasurementRecord};

pub struct CsvLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLog {
    /// Create a log handle. The file itself is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!("using measurement log at {}", path.display());
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn malformed(&self, line: usize, reason: impl Into<String>) -> StorageError {
        StorageError::LogCorruption {
            path: self.path.clone(),
            kind: CorruptionKind::MalformedRow {
                line,
                reason: reason.into(),
            },
        }
    }

    /// Decode the full file contents, header included.
    fn parse(&self, content: &str) -> StorageResult<Vec<MeasurementRecord>> {
        let mut lines = content.lines().enumerate();

        match lines.next() {
            None => return Ok(Vec::new()),
            Some((_, header)) if header.trim_end() == HEADER => {}
            Some((_, header)) => {
                return Err(self.malformed(1, format!("unexpected header {header:?}")));
            }
        }

        let mut records = Vec::new();
        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let record = MeasurementRecord::from_row(line).map_err(|e| self.malformed(index + 1, e))?;
            records.push(record);
        }

        Ok(records)
    }
}

#[async_trait]
impl MeasurementStore for CsvLog {
    #[instrument(skip(self, record), fields(entity = record.entity_id))]
    async fn append(&self, record: MeasurementRecord) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let has_content = match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let mut chunk = String::new();
        if !has_content {
            trace!("creating measurement log {}", self.path.display());
            chunk.push_str(HEADER);
            chunk.push('\n');
        }
        chunk.push_str(&record.to_row());
        chunk.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(chunk.as_bytes()).await?;
        file.flush().await?;

        trace!("appended {}", record.to_row());
        Ok(())
    }

    async fn load_all(&self) -> StorageResult<Vec<MeasurementRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::LogCorruption {
                    path: self.path.clone(),
                    kind: CorruptionKind::Missing,
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.parse(&content)
    }

    fn describe(&self) -> String {
        format!("CSV log at {}", self.path.display())
    }
}
