// ── Entity tables and the reducer ──

use boneio_api::{CoverState, InputState, OutputState, SensorState, StateUpdate};
use tracing::trace;

use super::table::EntityTable;

/// Every table the console tracks, as one immutable snapshot.
#[derive(Debug, Clone, Default)]
pub struct EntityTables {
    pub outputs: EntityTable<OutputState>,
    pub inputs: EntityTable<InputState>,
    /// Native and modbus sensors share one table.
    pub sensors: EntityTable<SensorState>,
    pub covers: EntityTable<CoverState>,
}

impl EntityTables {
    /// Fold one update into the tables. Pure: `self` is never modified.
    ///
    /// Unknown kinds and no-op updates return tables that share storage
    /// with `self`; see [`ptr_eq`](Self::ptr_eq).
    #[must_use]
    pub fn apply(&self, update: &StateUpdate) -> Self {
        let mut next = self.clone();
        match update {
            StateUpdate::Output(s) => next.outputs = self.outputs.upsert(s.clone()),
            StateUpdate::Input(s) => next.inputs = self.inputs.upsert(s.clone()),
            StateUpdate::Sensor(s) | StateUpdate::ModbusSensor(s) => {
                next.sensors = self.sensors.upsert(s.clone());
            }
            StateUpdate::Cover(s) => next.covers = self.covers.upsert(s.clone()),
            StateUpdate::Unknown { kind, .. } => trace!(kind, "ignoring unknown entity kind"),
        }
        next
    }

    /// Whether every table shares storage with `other`.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.outputs.ptr_eq(&other.outputs)
            && self.inputs.ptr_eq(&other.inputs)
            && self.sensors.ptr_eq(&other.sensors)
            && self.covers.ptr_eq(&other.covers)
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
            && self.inputs.is_empty()
            && self.sensors.is_empty()
            && self.covers.is_empty()
    }

    /// Total number of entities across all tables.
    pub fn len(&self) -> usize {
        self.outputs.len() + self.inputs.len() + self.sensors.len() + self.covers.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn frame(text: &str) -> StateUpdate {
        StateUpdate::from_json(text).unwrap()
    }

    #[test]
    fn relay_on_on_off_scenario() {
        let on = frame(r#"{"type":"output","data":{"id":"relay1","name":"Relay 1","state":"ON"}}"#);
        let off = frame(r#"{"type":"output","data":{"id":"relay1","name":"Relay 1","state":"OFF"}}"#);

        let t0 = EntityTables::default();
        let t1 = t0.apply(&on);
        assert_eq!(t1.outputs.len(), 1);
        assert_eq!(t1.outputs.get("relay1").unwrap().state, "ON");

        let t2 = t1.apply(&on);
        assert!(t2.ptr_eq(&t1));

        let t3 = t2.apply(&off);
        assert!(!t3.outputs.ptr_eq(&t2.outputs));
        assert_eq!(t3.outputs.len(), 1);
        assert_eq!(t3.outputs.get("relay1").unwrap().state, "OFF");
    }

    #[test]
    fn dispatches_by_kind() {
        let tables = EntityTables::default()
            .apply(&frame(r#"{"type":"input","data":{"name":"IN_01","state":"pressed"}}"#))
            .apply(&frame(r#"{"type":"sensor","data":{"id":"temp","name":"Temp","state":21.5,"unit":"°C"}}"#))
            .apply(&frame(r#"{"type":"modbus_sensor","data":{"id":"sdm_v","name":"Voltage","state":230.1}}"#))
            .apply(&frame(r#"{"type":"cover","data":{"id":"blind","name":"Blind","state":"closed","position":0}}"#));

        assert_eq!(tables.inputs.len(), 1);
        assert_eq!(tables.sensors.keys().collect::<Vec<_>>(), vec!["temp", "sdm_v"]);
        assert_eq!(tables.covers.len(), 1);
        assert!(tables.outputs.is_empty());
        assert_eq!(tables.len(), 4);
    }

    #[test]
    fn unknown_kind_leaves_tables_untouched() {
        let tables = EntityTables::default()
            .apply(&frame(r#"{"type":"output","data":{"id":"relay1","name":"R","state":"ON"}}"#));
        let next = tables.apply(&frame(r#"{"type":"host_stats","data":{"cpu":12}}"#));
        assert!(next.ptr_eq(&tables));
    }

    #[test]
    fn change_in_one_table_shares_the_others() {
        let tables = EntityTables::default()
            .apply(&frame(r#"{"type":"output","data":{"id":"relay1","name":"R","state":"ON"}}"#))
            .apply(&frame(r#"{"type":"input","data":{"name":"IN_01","state":"released"}}"#));
        let next = tables.apply(&frame(r#"{"type":"input","data":{"name":"IN_01","state":"pressed"}}"#));

        assert!(next.outputs.ptr_eq(&tables.outputs));
        assert!(!next.inputs.ptr_eq(&tables.inputs));
    }
}
