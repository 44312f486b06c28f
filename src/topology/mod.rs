//! Placement of servers onto a fixed pool of slots, and the connections between them
//!
//! ```text
//!   slot 0        slot 1        slot 2
//! ┌────────┐    ┌────────┐    ┌────────┐
//! │ web-1  │────│ file-2 │    │ (empty)│
//! └────────┘    └────────┘    └────────┘
//! ```
//!
//! - [`graph::TopologyGraph`] owns the slot table, the connection list and the undo journal
//! - [`undo::UndoJournal`] remembers the last mutation so it can be reversed once
//!
//! Entities are referenced by id only; the registry stays their sole owner.

use std::fmt;

use serde::Serialize;

use crate::entity::{Entity, EntityId};

pub mod graph;
pub mod undo;

pub use graph::TopologyGraph;
pub use undo::{LastAction, UndoEntry, UndoJournal};

/// Index of a slot in the fixed pool
pub type SlotId = usize;

/// Size of the slot pool when not configured otherwise
pub const DEFAULT_SLOT_COUNT: usize = 12;

/// Edge between two occupied slots
///
/// Stored with a direction, compared without one for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Connection {
    pub from: SlotId,
    pub to: SlotId,
}

impl Connection {
    pub fn new(from: SlotId, to: SlotId) -> Self {
        Self { from, to }
    }

    pub fn touches(&self, slot: SlotId) -> bool {
        self.from == slot || self.to == slot
    }

    /// `true` if this connection links `a` and `b` in either direction
    pub fn links(&self, a: SlotId, b: SlotId) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// Copy of this connection with every `old` endpoint replaced by `new`
    pub fn repointed(&self, old: SlotId, new: SlotId) -> Self {
        let swap = |slot| if slot == old { new } else { slot };
        Self {
            from: swap(self.from),
            to: swap(self.to),
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Reason a topology action was declined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The slot id is outside the pool
    SlotOutOfRange(SlotId),

    /// The target slot already holds a server
    SlotOccupied { slot: SlotId, occupant: EntityId },

    /// The slot holds no server
    SlotEmpty(SlotId),

    /// The server already sits on another slot
    AlreadyPlaced { entity: EntityId, slot: SlotId },

    /// The server is not on the slot it is supposed to move from
    NotInSlot { entity: EntityId, slot: SlotId },

    /// Source and target of a move are the same slot
    SameSlot(SlotId),

    /// A slot cannot be connected to itself
    SelfConnection(SlotId),

    /// The two slots are already connected
    DuplicateConnection { a: SlotId, b: SlotId },

    /// The server is not placed on any slot
    NotPlaced(EntityId),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SlotOutOfRange(slot) => write!(f, "slot {} does not exist", slot),
            Rejection::SlotOccupied { slot, occupant } => {
                write!(f, "slot {} is occupied by server {}", slot, occupant)
            }
            Rejection::SlotEmpty(slot) => write!(f, "slot {} is empty", slot),
            Rejection::AlreadyPlaced { entity, slot } => {
                write!(f, "server {} is already placed on slot {}", entity, slot)
            }
            Rejection::NotInSlot { entity, slot } => {
                write!(f, "server {} is not on slot {}", entity, slot)
            }
            Rejection::SameSlot(slot) => write!(f, "server is already on slot {}", slot),
            Rejection::SelfConnection(slot) => write!(f, "slot {} cannot connect to itself", slot),
            Rejection::DuplicateConnection { a, b } => {
                write!(f, "slots {} and {} are already connected", a, b)
            }
            Rejection::NotPlaced(entity) => write!(f, "server {} is not placed", entity),
        }
    }
}

/// Notification published by the topology graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TopologyEvent {
    Placed {
        entity: EntityId,
        slot: SlotId,
    },
    Moved {
        entity: EntityId,
        from: SlotId,
        to: SlotId,
    },
    Connected {
        connection: Connection,
    },
    Disconnected {
        connection: Connection,
    },
    /// A slot was emptied, dropping every connection that touched it
    Cleared {
        entity: EntityId,
        slot: SlotId,
        removed: Vec<Connection>,
    },
    /// The last action was reversed; the whole topology should be redrawn
    Undone {
        action: LastAction,
    },
    /// A server's value changed; `slot` is where it is drawn, if anywhere
    EntityRefreshed {
        slot: Option<SlotId>,
        entity: Entity,
    },
}

/// Consistent copy of the topology for readers outside the state lock
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySnapshot {
    /// Occupant of every slot, indexed by slot id
    pub slots: Vec<Option<EntityId>>,
    pub connections: Vec<Connection>,
    pub last_action: LastAction,
}

impl TopologySnapshot {
    pub fn occupant(&self, slot: SlotId) -> Option<EntityId> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn slot_of(&self, entity: EntityId) -> Option<SlotId> {
        self.slots.iter().position(|s| *s == Some(entity))
    }

    pub fn is_connected(&self, a: SlotId, b: SlotId) -> bool {
        self.connections.iter().any(|c| c.links(a, b))
    }
}
