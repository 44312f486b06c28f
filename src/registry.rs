//! Canonical set of monitored servers
//!
//! The registry owns every [`Entity`] and its own id counter. It knows nothing
//! about the topology; deleting a server that is placed on a slot is cascaded
//! by [`NetworkState`](crate::state::NetworkState).
//!
//! Changes are published on a broadcast channel:
//!
//! - [`RegistryEvent::EntitiesChanged`] with the full list after every create/delete
//! - [`RegistryEvent::ValueChanged`] after every value update

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::entity::{Entity, EntityId, ExpectedRange, NewEntity, ValueStatus};
use crate::error::{NetworkError, NetworkResult};

/// Notification published by the registry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// The set of servers changed (create or delete); carries the full current list
    EntitiesChanged { entities: Vec<Entity> },

    /// A server received a new metric value
    ValueChanged {
        id: EntityId,
        value: f64,
        status: ValueStatus,
    },
}

pub struct EntityRegistry {
    /// Servers in insertion order
    entities: Vec<Entity>,

    /// Next id to hand out; only ever increases
    next_id: EntityId,

    expected_range: ExpectedRange,

    event_tx: broadcast::Sender<RegistryEvent>,
}

impl EntityRegistry {
    pub fn new(event_tx: broadcast::Sender<RegistryEvent>, expected_range: ExpectedRange) -> Self {
        Self {
            entities: Vec::new(),
            next_id: 1,
            expected_range,
            event_tx,
        }
    }

    /// Validate and register a new server, assigning the next id.
    pub fn create(&mut self, new: NewEntity) -> NetworkResult<Entity> {
        new.validate()?;

        let id = self.next_id;
        self.next_id += 1;

        let entity = Entity {
            id,
            name: new.name,
            address: new.address,
            entity_type: new.entity_type,
            current_value: 0.0,
        };
        debug!("registered server {} ({}, {})", id, entity.name, entity.entity_type);

        self.entities.push(entity.clone());
        self.publish_entities();

        Ok(entity)
    }

    /// Remove a server. Unknown ids are ignored.
    pub fn delete(&mut self, id: EntityId) -> Option<Entity> {
        let Some(position) = self.entities.iter().position(|e| e.id == id) else {
            trace!("delete of unknown server {id} ignored");
            return None;
        };

        let removed = self.entities.remove(position);
        debug!("removed server {} ({})", id, removed.name);
        self.publish_entities();

        Some(removed)
    }

    /// Set the current value of a server and publish the change.
    pub fn update_value(&mut self, id: EntityId, value: f64) -> NetworkResult<Entity> {
        let status = self.expected_range.classify(value);
        let entity = self
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(NetworkError::NotFound(id))?;

        entity.current_value = value;
        let updated = entity.clone();

        if status == ValueStatus::OutOfRange {
            warn!(
                "server {} ({}) reported {} outside of expected range {}-{}",
                id, updated.name, value, self.expected_range.low, self.expected_range.high
            );
        }

        self.publish(RegistryEvent::ValueChanged { id, value, status });

        Ok(updated)
    }

    pub fn lookup(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.lookup(id).is_some()
    }

    /// All servers in insertion order
    pub fn list_all(&self) -> Vec<Entity> {
        self.entities.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn publish_entities(&self) {
        self.publish(RegistryEvent::EntitiesChanged {
            entities: self.entities.clone(),
        });
    }

    fn publish(&self, event: RegistryEvent) {
        // no subscribers is fine, the control layer may not be attached yet
        if self.event_tx.send(event).is_err() {
            trace!("no receivers for registry event");
        }
    }
}
