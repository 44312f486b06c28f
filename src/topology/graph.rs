//! Slot table, connection list and the operations that edit them
//!
//! ## Invariants
//!
//! - a slot holds at most one server, a server sits on at most one slot
//! - every connection joins two distinct occupied slots
//! - no two connections join the same unordered pair of slots
//!
//! Every successful mutation replaces the undo journal entry and publishes a
//! [`TopologyEvent`]. Declined actions leave both the graph and the journal
//! untouched.

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use super::undo::{LastAction, MovedConnection, SavedConnection, UndoEntry, UndoJournal};
use super::{Connection, Rejection, SlotId, TopologyEvent, TopologySnapshot};
use crate::entity::{Entity, EntityId};

pub struct TopologyGraph {
    /// Occupant per slot; the length is fixed at construction
    slots: Vec<Option<EntityId>>,

    /// Connections in creation order
    connections: Vec<Connection>,

    journal: UndoJournal,

    event_tx: broadcast::Sender<TopologyEvent>,
}

impl TopologyGraph {
    pub fn new(slot_count: usize, event_tx: broadcast::Sender<TopologyEvent>) -> Self {
        debug!("creating topology with {slot_count} slots");
        Self {
            slots: vec![None; slot_count],
            connections: Vec::new(),
            journal: UndoJournal::new(),
            event_tx,
        }
    }

    /// Put an unplaced server onto an empty slot.
    pub fn place_new(&mut self, entity: EntityId, slot: SlotId) -> Result<(), Rejection> {
        if let Some(occupant) = self.check_slot(slot)? {
            return Err(Rejection::SlotOccupied { slot, occupant });
        }
        if let Some(current) = self.slot_of(entity) {
            return Err(Rejection::AlreadyPlaced {
                entity,
                slot: current,
            });
        }

        self.slots[slot] = Some(entity);
        trace!("placed server {entity} on slot {slot}");

        self.journal.record(UndoEntry::Place { entity, slot });
        self.publish(TopologyEvent::Placed { entity, slot });
        Ok(())
    }

    /// Relocate a placed server to an empty slot, dragging its connections along.
    pub fn move_between_slots(
        &mut self,
        entity: EntityId,
        from: SlotId,
        to: SlotId,
    ) -> Result<(), Rejection> {
        let source = self.check_slot(from)?;
        let target = self.check_slot(to)?;

        if source != Some(entity) {
            return Err(Rejection::NotInSlot { entity, slot: from });
        }
        if from == to {
            return Err(Rejection::SameSlot(from));
        }
        if let Some(occupant) = target {
            return Err(Rejection::SlotOccupied { slot: to, occupant });
        }

        let mut moved = Vec::new();
        for (index, connection) in self.connections.iter_mut().enumerate() {
            if connection.touches(from) {
                moved.push(MovedConnection {
                    index,
                    before: *connection,
                });
                *connection = connection.repointed(from, to);
            }
        }

        self.slots[from] = None;
        self.slots[to] = Some(entity);
        trace!(
            "moved server {entity} from slot {from} to slot {to} ({} connections)",
            moved.len()
        );

        self.journal.record(UndoEntry::Move {
            entity,
            from,
            to,
            moved,
        });
        self.publish(TopologyEvent::Moved { entity, from, to });
        Ok(())
    }

    /// Connect two occupied slots.
    pub fn connect(&mut self, a: SlotId, b: SlotId) -> Result<Connection, Rejection> {
        let first = self.check_slot(a)?;
        let second = self.check_slot(b)?;

        if a == b {
            return Err(Rejection::SelfConnection(a));
        }
        if first.is_none() {
            return Err(Rejection::SlotEmpty(a));
        }
        if second.is_none() {
            return Err(Rejection::SlotEmpty(b));
        }
        if self.is_connected(a, b) {
            return Err(Rejection::DuplicateConnection { a, b });
        }

        let connection = Connection::new(a, b);
        self.connections.push(connection);
        trace!("connected {connection}");

        self.journal.record(UndoEntry::Connect { connection });
        self.publish(TopologyEvent::Connected { connection });
        Ok(connection)
    }

    /// Empty a slot, returning its server to the unplaced pool.
    pub fn clear(&mut self, slot: SlotId) -> Result<EntityId, Rejection> {
        let entity = self.check_slot(slot)?.ok_or(Rejection::SlotEmpty(slot))?;

        let saved = self.detach(slot);
        trace!(
            "cleared slot {slot} (server {entity}, {} connections)",
            saved.len()
        );

        let removed = saved.iter().map(|s| s.connection).collect();
        self.journal.record(UndoEntry::Clear {
            entity,
            slot,
            saved,
        });
        self.publish(TopologyEvent::Cleared {
            entity,
            slot,
            removed,
        });
        Ok(entity)
    }

    /// Reverse the last recorded mutation.
    ///
    /// Returns the kind of action that was undone, or `None` if there was
    /// nothing to undo. The journal is empty afterwards either way.
    pub fn undo(&mut self) -> Option<LastAction> {
        let entry = self.journal.take();
        let action = entry.action();

        let applied = match entry {
            UndoEntry::None => {
                trace!("nothing to undo");
                return None;
            }
            UndoEntry::Place { entity, slot } => self.undo_place(entity, slot),
            UndoEntry::Move {
                entity,
                from,
                to,
                moved,
            } => self.undo_move(entity, from, to, &moved),
            UndoEntry::Connect { connection } => self.undo_connect(connection),
            UndoEntry::Clear {
                entity,
                slot,
                saved,
            } => self.undo_clear(entity, slot, &saved),
        };

        if !applied {
            warn!("discarding stale {action:?} undo entry");
            return None;
        }

        debug!("undid last {action:?}");
        self.publish(TopologyEvent::Undone { action });
        Some(action)
    }

    /// Drop a deleted server from the topology.
    ///
    /// Behaves like [`clear`](Self::clear) but is not undoable. A pending undo
    /// entry is discarded when the removal changes the topology or the entry
    /// refers to the removed server.
    pub fn remove_entity(&mut self, entity: EntityId) -> Option<SlotId> {
        let slot = self.slot_of(entity);

        if !self.journal.is_empty() && (slot.is_some() || self.journal.peek().references(entity, slot)) {
            debug!(
                "discarding pending {:?} undo entry after removal of server {entity}",
                self.journal.last_action()
            );
            self.journal.invalidate();
        }

        let slot = slot?;
        let saved = self.detach(slot);
        debug!("removed deleted server {entity} from slot {slot}");

        self.publish(TopologyEvent::Cleared {
            entity,
            slot,
            removed: saved.into_iter().map(|s| s.connection).collect(),
        });
        Some(slot)
    }

    /// Announce a value change so the slot showing `entity` can be redrawn.
    pub fn refresh(&self, entity: &Entity) -> Option<SlotId> {
        let slot = self.slot_of(entity.id);
        self.publish(TopologyEvent::EntityRefreshed {
            slot,
            entity: entity.clone(),
        });
        slot
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn occupant(&self, slot: SlotId) -> Option<EntityId> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn slot_of(&self, entity: EntityId) -> Option<SlotId> {
        self.slots.iter().position(|s| *s == Some(entity))
    }

    pub fn is_placed(&self, entity: EntityId) -> bool {
        self.slot_of(entity).is_some()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connections_of(&self, slot: SlotId) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.touches(slot))
            .copied()
            .collect()
    }

    pub fn is_connected(&self, a: SlotId, b: SlotId) -> bool {
        self.connections.iter().any(|c| c.links(a, b))
    }

    pub fn last_action(&self) -> LastAction {
        self.journal.last_action()
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            slots: self.slots.clone(),
            connections: self.connections.clone(),
            last_action: self.journal.last_action(),
        }
    }

    fn check_slot(&self, slot: SlotId) -> Result<Option<EntityId>, Rejection> {
        self.slots
            .get(slot)
            .copied()
            .ok_or(Rejection::SlotOutOfRange(slot))
    }

    /// Empty `slot` and remove every connection touching it, remembering positions.
    fn detach(&mut self, slot: SlotId) -> Vec<SavedConnection> {
        let mut saved = Vec::new();
        let mut kept = Vec::with_capacity(self.connections.len());

        for (index, connection) in self.connections.drain(..).enumerate() {
            if connection.touches(slot) {
                saved.push(SavedConnection { index, connection });
            } else {
                kept.push(connection);
            }
        }

        self.connections = kept;
        self.slots[slot] = None;
        saved
    }

    fn undo_place(&mut self, entity: EntityId, slot: SlotId) -> bool {
        if self.occupant(slot) != Some(entity) {
            return false;
        }

        let removed = self.detach(slot);
        debug_assert!(removed.is_empty(), "a placement cannot have connections yet");
        true
    }

    fn undo_move(
        &mut self,
        entity: EntityId,
        from: SlotId,
        to: SlotId,
        moved: &[MovedConnection],
    ) -> bool {
        if self.occupant(to) != Some(entity) || self.check_slot(from) != Ok(None) {
            return false;
        }

        self.slots[to] = None;
        self.slots[from] = Some(entity);
        for m in moved {
            if let Some(connection) = self.connections.get_mut(m.index) {
                *connection = m.before;
            }
        }
        true
    }

    fn undo_connect(&mut self, connection: Connection) -> bool {
        let Some(position) = self.connections.iter().position(|c| *c == connection) else {
            return false;
        };

        self.connections.remove(position);
        self.publish(TopologyEvent::Disconnected { connection });
        true
    }

    fn undo_clear(&mut self, entity: EntityId, slot: SlotId, saved: &[SavedConnection]) -> bool {
        if self.check_slot(slot) != Ok(None) || self.is_placed(entity) {
            return false;
        }

        self.slots[slot] = Some(entity);
        // ascending saved positions, so each insert lands where it was
        for s in saved {
            let index = s.index.min(self.connections.len());
            self.connections.insert(index, s.connection);
        }
        true
    }

    fn publish(&self, event: TopologyEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("no receivers for topology event");
        }
    }
}
