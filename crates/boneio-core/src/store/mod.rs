// ── Entity store ──
//
// Holds the current `EntityTables` behind a watch channel. Subscribers are
// woken only when an update actually changes a table.

mod table;
mod tables;

use boneio_api::StateUpdate;
use tokio::sync::watch;
use tracing::debug;

pub use table::{Entity, EntityTable};
pub use tables::EntityTables;

/// Reactive container for one consumer's view of device state.
#[derive(Debug)]
pub struct EntityStore {
    tables: watch::Sender<EntityTables>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        let (tables, _) = watch::channel(EntityTables::default());
        Self { tables }
    }

    /// Fold `update` in. Returns `true` if subscribers were notified.
    pub fn apply(&self, update: &StateUpdate) -> bool {
        self.tables.send_if_modified(|tables| {
            let next = tables.apply(update);
            if next.ptr_eq(tables) {
                false
            } else {
                *tables = next;
                true
            }
        })
    }

    /// Reset every table to empty in one step.
    pub fn clear(&self) {
        let cleared = self.tables.send_if_modified(|tables| {
            if tables.is_empty() {
                false
            } else {
                *tables = EntityTables::default();
                true
            }
        });
        if cleared {
            debug!("entity tables cleared");
        }
    }

    /// The current tables.
    pub fn snapshot(&self) -> EntityTables {
        self.tables.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EntityTables> {
        self.tables.subscribe()
    }
}
