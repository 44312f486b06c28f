//! Single-step undo journal for topology edits
//!
//! Only the most recent mutation is kept. Recording a new one overwrites it,
//! applying it (see [`TopologyGraph::undo`](super::TopologyGraph::undo))
//! resets the journal to [`UndoEntry::None`].

use serde::Serialize;

use super::{Connection, SlotId};
use crate::entity::EntityId;

/// Kind of the last recorded topology mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastAction {
    #[default]
    None,
    Place,
    Move,
    Connect,
    Clear,
}

/// Connection endpoint state captured before a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovedConnection {
    /// Position in the connection list
    pub index: usize,
    /// The connection as it was before the move
    pub before: Connection,
}

/// Connection removed by a clear, with its former position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedConnection {
    pub index: usize,
    pub connection: Connection,
}

/// Everything needed to reverse the last topology mutation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UndoEntry {
    #[default]
    None,
    Place {
        entity: EntityId,
        slot: SlotId,
    },
    Move {
        entity: EntityId,
        from: SlotId,
        to: SlotId,
        moved: Vec<MovedConnection>,
    },
    Connect {
        connection: Connection,
    },
    Clear {
        entity: EntityId,
        slot: SlotId,
        saved: Vec<SavedConnection>,
    },
}

impl UndoEntry {
    pub fn action(&self) -> LastAction {
        match self {
            UndoEntry::None => LastAction::None,
            UndoEntry::Place { .. } => LastAction::Place,
            UndoEntry::Move { .. } => LastAction::Move,
            UndoEntry::Connect { .. } => LastAction::Connect,
            UndoEntry::Clear { .. } => LastAction::Clear,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, UndoEntry::None)
    }

    /// Does reversing this entry depend on `entity`, or on anything attached to `slot`?
    pub fn references(&self, entity: EntityId, slot: Option<SlotId>) -> bool {
        let on_slot = |s: SlotId| slot == Some(s);
        let touches = |c: &Connection| slot.is_some_and(|s| c.touches(s));

        match self {
            UndoEntry::None => false,
            UndoEntry::Place { entity: e, slot: s } => *e == entity || on_slot(*s),
            UndoEntry::Move {
                entity: e,
                from,
                to,
                moved,
            } => {
                *e == entity
                    || on_slot(*from)
                    || on_slot(*to)
                    || moved.iter().any(|m| touches(&m.before))
            }
            UndoEntry::Connect { connection } => touches(connection),
            UndoEntry::Clear {
                entity: e,
                slot: s,
                saved,
            } => *e == entity || on_slot(*s) || saved.iter().any(|c| touches(&c.connection)),
        }
    }
}

#[derive(Debug, Default)]
pub struct UndoJournal {
    entry: UndoEntry,
}

impl UndoJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was recorded before
    pub fn record(&mut self, entry: UndoEntry) {
        self.entry = entry;
    }

    /// Remove and return the stored entry, leaving `None` behind
    pub fn take(&mut self) -> UndoEntry {
        std::mem::take(&mut self.entry)
    }

    pub fn peek(&self) -> &UndoEntry {
        &self.entry
    }

    pub fn last_action(&self) -> LastAction {
        self.entry.action()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn invalidate(&mut self) {
        self.entry = UndoEntry::None;
    }
}
