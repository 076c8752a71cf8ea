// ── Entity table ──
//
// Immutable, arrival-ordered map from entity key to entity. Updates return a
// new table; a no-op update returns a table sharing the same storage so
// consumers can skip work with a pointer comparison.

use std::sync::Arc;

use boneio_api::{CoverState, InputState, OutputState, SensorState};
use indexmap::IndexMap;

/// An entity the reducer can key and compare.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Stable identifier within its table.
    fn key(&self) -> &str;

    /// Whether `other` carries the same observable state. Timestamps and
    /// unrecognised fields do not count.
    fn same_state(&self, other: &Self) -> bool;
}

impl Entity for OutputState {
    fn key(&self) -> &str {
        OutputState::key(self)
    }

    fn same_state(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Entity for InputState {
    fn key(&self) -> &str {
        InputState::key(self)
    }

    fn same_state(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Entity for SensorState {
    fn key(&self) -> &str {
        SensorState::key(self)
    }

    fn same_state(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Entity for CoverState {
    fn key(&self) -> &str {
        CoverState::key(self)
    }

    fn same_state(&self, other: &Self) -> bool {
        self.state == other.state
            && self.position == other.position
            && self.tilt == other.tilt
            && self.current_operation == other.current_operation
    }
}

/// Ordered, keyed, structurally shared collection of one entity kind.
#[derive(Debug)]
pub struct EntityTable<T> {
    entries: Arc<IndexMap<String, Arc<T>>>,
}

impl<T> Clone for EntityTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for EntityTable<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(IndexMap::new()),
        }
    }
}

impl<T: Entity> EntityTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `entity`.
    ///
    /// - unknown key: appended at the end
    /// - known key, same state: `self` returned unchanged (shared storage)
    /// - known key, new state: replaced at its existing position
    #[must_use]
    pub fn upsert(&self, entity: T) -> Self {
        match self.entries.get_full(entity.key()) {
            Some((_, _, existing)) if existing.same_state(&entity) => self.clone(),
            Some((index, _, _)) => {
                let mut next = (*self.entries).clone();
                if let Some((_, slot)) = next.get_index_mut(index) {
                    *slot = Arc::new(entity);
                }
                Self {
                    entries: Arc::new(next),
                }
            }
            None => {
                let mut next = (*self.entries).clone();
                next.insert(entity.key().to_owned(), Arc::new(entity));
                Self {
                    entries: Arc::new(next),
                }
            }
        }
    }
}

impl<T> EntityTable<T> {
    pub fn get(&self, key: &str) -> Option<&Arc<T>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entities in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether both tables share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<'a, T> IntoIterator for &'a EntityTable<T> {
    type Item = &'a Arc<T>;
    type IntoIter = indexmap::map::Values<'a, String, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    use super::*;

    fn output(id: &str, state: &str) -> OutputState {
        OutputState {
            id: Some(id.into()),
            name: id.to_uppercase(),
            state: state.into(),
            output_type: Some("switch".into()),
            expander_id: None,
            pin: None,
            timestamp: None,
            extra: Map::new(),
        }
    }

    fn cover(id: &str, position: i64, tilt: i64) -> CoverState {
        CoverState {
            id: Some(id.into()),
            name: id.into(),
            state: "open".into(),
            position,
            tilt,
            current_operation: "idle".into(),
            kind: Some("venetian".into()),
            timestamp: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn unknown_key_appends_in_order() {
        let table = EntityTable::new()
            .upsert(output("relay1", "ON"))
            .upsert(output("relay2", "OFF"))
            .upsert(output("relay3", "OFF"));

        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["relay1", "relay2", "relay3"]);
    }

    #[test]
    fn unchanged_state_shares_storage() {
        let table = EntityTable::new().upsert(output("relay1", "ON"));
        let mut repeat = output("relay1", "ON");
        repeat.timestamp = Some(1_700_000_000.0);

        let next = table.upsert(repeat);

        assert!(next.ptr_eq(&table));
        assert!(Arc::ptr_eq(next.get("relay1").unwrap(), table.get("relay1").unwrap()));
    }

    #[test]
    fn changed_state_replaces_in_place() {
        let table = EntityTable::new()
            .upsert(output("relay1", "ON"))
            .upsert(output("relay2", "OFF"));

        let next = table.upsert(output("relay1", "OFF"));

        assert!(!next.ptr_eq(&table));
        assert_eq!(next.len(), 2);
        assert_eq!(next.keys().collect::<Vec<_>>(), vec!["relay1", "relay2"]);
        assert_eq!(next.get("relay1").unwrap().state, "OFF");
        // The old snapshot is untouched.
        assert_eq!(table.get("relay1").unwrap().state, "ON");
        // Untouched entries are shared between snapshots.
        assert!(Arc::ptr_eq(next.get("relay2").unwrap(), table.get("relay2").unwrap()));
    }

    #[test]
    fn each_key_at_most_once() {
        let mut table = EntityTable::new();
        for state in ["ON", "OFF", "ON", "ON", "OFF"] {
            table = table.upsert(output("relay1", state));
        }
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("relay1").unwrap().state, "OFF");
    }

    #[test]
    fn cover_compares_position_and_tilt() {
        let table = EntityTable::new().upsert(cover("blind", 40, 10));

        assert!(table.upsert(cover("blind", 40, 10)).ptr_eq(&table));
        assert!(!table.upsert(cover("blind", 41, 10)).ptr_eq(&table));
        assert!(!table.upsert(cover("blind", 40, 90)).ptr_eq(&table));

        let mut moving = cover("blind", 40, 10);
        moving.current_operation = "opening".into();
        assert!(!table.upsert(moving).ptr_eq(&table));
    }
}
