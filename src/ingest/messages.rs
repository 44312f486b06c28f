//! Message types for controlling the ingestion actor

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::oneshot;

/// Commands that can be sent to the IngestActor
#[derive(Debug)]
pub enum IngestCommand {
    /// Get ingestion statistics
    GetStats {
        respond_to: oneshot::Sender<IngestStats>,
    },

    /// Stop accepting connections
    ///
    /// Connections that were already accepted are processed to completion.
    Shutdown,
}

/// Ingestion statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Connections accepted since startup
    pub accepted: u64,

    /// Count queries answered
    pub count_queries: u64,

    /// Value updates applied to a known server
    pub updates_applied: u64,

    /// Well-formed updates for ids that are not registered
    pub unknown_entities: u64,

    /// Messages that matched neither request form
    pub dropped: u64,
}

/// Counters shared between the accept loop and its connection workers
#[derive(Debug, Default)]
pub(crate) struct IngestCounters {
    pub accepted: AtomicU64,
    pub count_queries: AtomicU64,
    pub updates_applied: AtomicU64,
    pub unknown_entities: AtomicU64,
    pub dropped: AtomicU64,
}

impl IngestCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestStats {
        IngestStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            count_queries: self.count_queries.load(Ordering::Relaxed),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            unknown_entities: self.unknown_entities.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
