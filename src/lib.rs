//! Network monitoring service
//!
//! Keeps a registry of monitored servers, ingests live metric values from a
//! metering simulator over TCP, appends every value to a measurement log and
//! maintains a user-arranged topology of servers placed on slots and wired
//! together with connections.

pub mod config;
pub mod entity;
pub mod error;
pub mod ingest;
pub mod registry;
pub mod state;
pub mod storage;
pub mod topology;
pub mod util;

pub use entity::{Entity, EntityId, EntityType, ExpectedRange, NewEntity, ValueStatus};
pub use error::{NetworkError, NetworkResult};
pub use state::{NetworkState, ValueUpdate};
