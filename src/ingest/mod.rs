//! Ingestion of live metric updates from the metering simulator
//!
//! - [`protocol`]: request classification (count query, value update, noise)
//! - [`listener`]: the accept loop actor and its [`IngestHandle`]
//! - [`messages`]: commands and statistics of the actor

pub mod listener;
pub mod messages;
pub mod protocol;

pub use listener::IngestHandle;
pub use messages::IngestStats;
