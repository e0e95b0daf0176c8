//! End-of-run state snapshots.
//!
//! A [`SimSnapshot`] captures every entity's state and the craft event log
//! at a tick boundary. It encodes to a compact binary form via `bitcode`
//! with a versioned header, for handing results to verification tooling.
//! Snapshots are read-only records; a simulation is not resumed from one.

use crate::config::SimConfig;
use crate::drill::DrillState;
use crate::entity::{BeltState, Entity};
use crate::event::CraftEvent;
use crate::inserter::InserterState;
use crate::machine::MachineState;
use crate::sim::Simulation;
use serde::{Deserialize, Serialize};

/// Magic number identifying a clocksim snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xC10C_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

/// Header prepended to every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Ticks completed when the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version != FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Observable state of a simulation at a tick boundary. Entities appear in
/// slot order within each list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub header: SnapshotHeader,
    pub config: SimConfig,
    pub machines: Vec<MachineState>,
    pub inserters: Vec<InserterState>,
    pub drills: Vec<DrillState>,
    pub belts: Vec<BeltState>,
    /// Events still buffered in the log; drained events are not included.
    pub craft_events: Vec<CraftEvent>,
    pub state_hash: u64,
}

impl SimSnapshot {
    pub fn capture(sim: &Simulation) -> Self {
        let mut snapshot = Self {
            header: SnapshotHeader::new(sim.tick()),
            config: sim.config().clone(),
            machines: Vec::new(),
            inserters: Vec::new(),
            drills: Vec::new(),
            belts: Vec::new(),
            craft_events: sim.craft_events().iter().cloned().collect(),
            state_hash: sim.state_hash().finish(),
        };
        for (_, entity) in sim.entities() {
            match entity {
                Entity::Machine(unit) => snapshot.machines.push(unit.state.clone()),
                Entity::Inserter(unit) => snapshot.inserters.push(unit.state.clone()),
                Entity::Drill(unit) => snapshot.drills.push(unit.state.clone()),
                Entity::Belt(belt) => snapshot.belts.push(belt.clone()),
            }
        }
        snapshot
    }

    pub fn encode(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, DeserializeError> {
        let snapshot: Self =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;
        Ok(snapshot)
    }
}

impl Simulation {
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot::capture(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::ratio;
    use crate::sim::InserterSpec;
    use crate::test_utils::*;

    fn small_factory() -> Simulation {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        let belt = sim.add_belt();
        let m = sim.add_machine("gear", gear_rates(ratio(9, 10))).unwrap();
        let out = sim.add_belt();
        sim.add_inserter(belt, m, InserterSpec::new().stack_size(2)).unwrap();
        sim.add_inserter(m, out, InserterSpec::new().filter(gear())).unwrap();
        sim.seed_items(belt, iron_plate(), 40).unwrap();
        sim
    }

    #[test]
    fn snapshot_survives_encoding() {
        let mut sim = small_factory();
        sim.run(500).unwrap();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.header.tick, 500);
        assert_eq!(snapshot.machines.len(), 1);
        assert_eq!(snapshot.inserters.len(), 2);
        assert_eq!(snapshot.belts.len(), 2);
        assert!(!snapshot.craft_events.is_empty());

        let bytes = snapshot.encode().unwrap();
        let decoded = SimSnapshot::decode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.machines[0].crafting_progress, snapshot.machines[0].crafting_progress);
    }

    #[test]
    fn bad_header_rejected() {
        let mut snapshot = Simulation::new(SimConfig::default()).unwrap().snapshot();
        snapshot.header.magic = 0xDEAD_BEEF;
        let bytes = snapshot.encode().unwrap();
        assert!(matches!(
            SimSnapshot::decode(&bytes),
            Err(DeserializeError::InvalidMagic(0xDEAD_BEEF))
        ));

        snapshot.header = SnapshotHeader::new(0);
        snapshot.header.version = FORMAT_VERSION + 1;
        let bytes = snapshot.encode().unwrap();
        assert!(matches!(
            SimSnapshot::decode(&bytes),
            Err(DeserializeError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            SimSnapshot::decode(&[1, 2, 3]),
            Err(DeserializeError::Decode(_))
        ));
    }

    #[test]
    fn identical_runs_snapshot_identically() {
        let mut a = small_factory();
        let mut b = small_factory();
        a.run(300).unwrap();
        b.run(300).unwrap();
        assert_eq!(a.snapshot().state_hash, b.snapshot().state_hash);
        assert_eq!(a.snapshot().encode().unwrap(), b.snapshot().encode().unwrap());
    }
}
