//! Shared state used by the ingestion workers and the control layer
//!
//! Registry and topology live behind a single `RwLock`, so every mutation is
//! serialized and every read sees a consistent snapshot. Measurement log I/O
//! happens outside the lock.
//!
//! ```text
//!  ingestion workers ─┐                      ┌─► RegistryEvent  (broadcast)
//!                     ├─► NetworkState ──────┤
//!  control layer ─────┘   (RwLock<Inner>)    └─► TopologyEvent  (broadcast)
//!                               │
//!                               └─► MeasurementStore (append, history)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, instrument, trace};

use crate::entity::{Entity, EntityId, EntityType, ExpectedRange, NewEntity, group_by_type};
use crate::error::{NetworkError, NetworkResult};
use crate::registry::{EntityRegistry, RegistryEvent};
use crate::storage::{MeasurementRecord, MeasurementStore};
use crate::topology::{
    Connection, LastAction, Rejection, SlotId, TopologyEvent, TopologyGraph, TopologySnapshot,
};

/// Capacity of the notification channels
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outcome of a value update received from the simulator
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUpdate {
    /// The server after the update
    pub entity: Entity,

    /// Slot the server is placed on, if any
    pub slot: Option<SlotId>,

    /// Whether the measurement log accepted the record
    pub persisted: bool,
}

struct Inner {
    registry: EntityRegistry,
    topology: TopologyGraph,
}

#[derive(Clone)]
pub struct NetworkState {
    inner: Arc<RwLock<Inner>>,
    store: Arc<dyn MeasurementStore>,
    registry_tx: broadcast::Sender<RegistryEvent>,
    topology_tx: broadcast::Sender<TopologyEvent>,
}

impl NetworkState {
    pub fn new(
        slot_count: usize,
        expected_range: ExpectedRange,
        store: Arc<dyn MeasurementStore>,
    ) -> Self {
        let (registry_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (topology_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        debug!("measurement log: {}", store.describe());

        let inner = Inner {
            registry: EntityRegistry::new(registry_tx.clone(), expected_range),
            topology: TopologyGraph::new(slot_count, topology_tx.clone()),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            store,
            registry_tx,
            topology_tx,
        }
    }

    pub fn subscribe_registry(&self) -> broadcast::Receiver<RegistryEvent> {
        self.registry_tx.subscribe()
    }

    pub fn subscribe_topology(&self) -> broadcast::Receiver<TopologyEvent> {
        self.topology_tx.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn MeasurementStore> {
        &self.store
    }

    // ========================================================================
    // Registry operations
    // ========================================================================

    pub async fn create_entity(&self, new: NewEntity) -> NetworkResult<Entity> {
        self.inner.write().await.registry.create(new)
    }

    /// Delete a server, clearing its slot and connections first.
    ///
    /// Unknown ids are ignored.
    #[instrument(skip(self))]
    pub async fn delete_entity(&self, id: EntityId) -> Option<Entity> {
        let mut inner = self.inner.write().await;
        if !inner.registry.contains(id) {
            return None;
        }

        if let Some(slot) = inner.topology.remove_entity(id) {
            debug!("server {id} was removed from slot {slot}");
        }
        inner.registry.delete(id)
    }

    /// Apply a value received from the simulator and append it to the log.
    ///
    /// The slot refresh is announced once the record is in the log. A failing
    /// log append is reported but does not fail the update.
    #[instrument(skip(self))]
    pub async fn apply_update(&self, id: EntityId, value: f64) -> NetworkResult<ValueUpdate> {
        let entity = self.inner.write().await.registry.update_value(id, value)?;

        let persisted = match self.store.append(MeasurementRecord::now(id, value)).await {
            Ok(()) => true,
            Err(e) => {
                error!("failed to log value update for server {id}: {e}");
                false
            }
        };

        let slot = self.inner.read().await.topology.refresh(&entity);

        trace!("server {id} updated to {value}");
        Ok(ValueUpdate {
            entity,
            slot,
            persisted,
        })
    }

    pub async fn entity(&self, id: EntityId) -> Option<Entity> {
        self.inner.read().await.registry.lookup(id).cloned()
    }

    pub async fn entities(&self) -> Vec<Entity> {
        self.inner.read().await.registry.list_all()
    }

    pub async fn entity_count(&self) -> usize {
        self.inner.read().await.registry.len()
    }

    /// Servers that are not placed on any slot, in registry order
    pub async fn unplaced(&self) -> Vec<Entity> {
        let inner = self.inner.read().await;
        inner
            .registry
            .iter()
            .filter(|e| !inner.topology.is_placed(e.id))
            .cloned()
            .collect()
    }

    pub async fn unplaced_by_type(&self) -> BTreeMap<EntityType, Vec<Entity>> {
        group_by_type(self.unplaced().await)
    }

    /// Last `limit` logged values of a server, oldest first.
    ///
    /// A log that has not been written yet yields an empty history.
    pub async fn recent_history(
        &self,
        id: EntityId,
        limit: usize,
    ) -> NetworkResult<Vec<MeasurementRecord>> {
        match self.store.recent_for_entity(id, limit).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_missing() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Topology operations
    // ========================================================================

    pub async fn place(&self, id: EntityId, slot: SlotId) -> NetworkResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.registry.contains(id) {
            return Err(NetworkError::NotFound(id));
        }
        Ok(inner.topology.place_new(id, slot)?)
    }

    pub async fn move_entity(&self, id: EntityId, from: SlotId, to: SlotId) -> NetworkResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.registry.contains(id) {
            return Err(NetworkError::NotFound(id));
        }
        Ok(inner.topology.move_between_slots(id, from, to)?)
    }

    pub async fn connect(&self, a: SlotId, b: SlotId) -> NetworkResult<Connection> {
        Ok(self.inner.write().await.topology.connect(a, b)?)
    }

    /// Empty a slot; returns the server that was on it.
    pub async fn clear(&self, slot: SlotId) -> NetworkResult<EntityId> {
        Ok(self.inner.write().await.topology.clear(slot)?)
    }

    /// Empty whichever slot the server is placed on; returns that slot.
    pub async fn clear_entity(&self, id: EntityId) -> NetworkResult<SlotId> {
        let mut inner = self.inner.write().await;
        if !inner.registry.contains(id) {
            return Err(NetworkError::NotFound(id));
        }
        let slot = inner
            .topology
            .slot_of(id)
            .ok_or(Rejection::NotPlaced(id))?;
        inner.topology.clear(slot)?;
        Ok(slot)
    }

    pub async fn undo(&self) -> Option<LastAction> {
        self.inner.write().await.topology.undo()
    }

    pub async fn last_action(&self) -> LastAction {
        self.inner.read().await.topology.last_action()
    }

    pub async fn topology(&self) -> TopologySnapshot {
        self.inner.read().await.topology.snapshot()
    }
}
