//! Monitored server records
//!
//! An [`Entity`] is one monitored server: a name, an IPv4 address, a type
//! and the latest metric value reported by the simulator. Entities are owned
//! by the [`EntityRegistry`](crate::registry::EntityRegistry); everything else
//! refers to them by [`EntityId`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};

/// Registry-assigned identifier, starting at 1 and never reused
pub type EntityId = u64;

/// Dotted quad with every octet in 0-255 (up to three digits, leading zeros allowed)
static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(25[0-5]|2[0-4]\d|[01]?\d\d?)$")
        .expect("IPv4 pattern is a valid regex")
});

/// Kind of monitored server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Web,
    File,
    Database,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Web, EntityType::File, EntityType::Database];
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Web => "Web",
            EntityType::File => "File",
            EntityType::Database => "Database",
        };
        f.write_str(name)
    }
}

impl FromStr for EntityType {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NetworkError::validation("type", format!("unknown server type {s:?}")))
    }
}

/// A monitored server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    /// IPv4 address in dotted-quad notation
    pub address: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Latest value received from the simulator (0 until the first update)
    pub current_value: f64,
}

/// Fields supplied when registering a new server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewEntity {
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl NewEntity {
    pub fn new(name: impl Into<String>, address: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            entity_type,
        }
    }

    /// Check the user-supplied fields before an id is assigned.
    pub fn validate(&self) -> NetworkResult<()> {
        if self.name.trim().is_empty() {
            return Err(NetworkError::validation("name", "server name is required"));
        }

        if self.address.is_empty() {
            return Err(NetworkError::validation("address", "IP address is required"));
        }

        if !is_valid_ipv4(&self.address) {
            return Err(NetworkError::validation(
                "address",
                "IP address must be in format xxx.xxx.xxx.xxx",
            ));
        }

        Ok(())
    }
}

pub fn is_valid_ipv4(address: &str) -> bool {
    IPV4_PATTERN.is_match(address)
}

/// Whether a reported value lies inside the expected operating band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueStatus {
    Normal,
    OutOfRange,
}

/// Inclusive band of values considered healthy
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ExpectedRange {
    #[serde(default = "default_low")]
    pub low: f64,
    #[serde(default = "default_high")]
    pub high: f64,
}

impl ExpectedRange {
    pub fn classify(&self, value: f64) -> ValueStatus {
        if value < self.low || value > self.high {
            ValueStatus::OutOfRange
        } else {
            ValueStatus::Normal
        }
    }
}

impl Default for ExpectedRange {
    fn default() -> Self {
        Self {
            low: default_low(),
            high: default_high(),
        }
    }
}

fn default_low() -> f64 {
    45.0
}

fn default_high() -> f64 {
    75.0
}

/// Group servers by their type, keeping the relative order inside each group.
///
/// Only types that actually occur are present in the result.
pub fn group_by_type(entities: impl IntoIterator<Item = Entity>) -> BTreeMap<EntityType, Vec<Entity>> {
    let mut groups: BTreeMap<EntityType, Vec<Entity>> = BTreeMap::new();
    for entity in entities {
        groups.entry(entity.entity_type).or_default().push(entity);
    }
    groups
}
