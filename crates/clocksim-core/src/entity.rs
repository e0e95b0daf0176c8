//! Simulated entities: per-kind state paired with its mode state machine.

use crate::drill::{DrillContext, DrillMode, DrillState};
use crate::error::SimError;
use crate::event::CraftEventLog;
use crate::fsm::ModeStateMachine;
use crate::id::EntityId;
use crate::inserter::{InserterContext, InserterMode, InserterState, Sink, SinkKind, Source};
use crate::inventory::InventoryState;
use crate::log::LogSink;
use crate::machine::{MachineContext, MachineMode, MachineState};
use crate::rational::Ticks;
use serde::{Deserialize, Serialize};

/// A conveyor end. Its inventory tallies everything delivered to it and is
/// never limited; it can also serve as an inserter source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltState {
    pub id: EntityId,
    pub inventory: InventoryState,
}

#[derive(Debug)]
pub struct MachineUnit {
    pub state: MachineState,
    pub(crate) fsm: ModeStateMachine<MachineMode>,
}

impl MachineUnit {
    pub(crate) fn context<'a>(
        state: &'a mut MachineState,
        events: &'a mut CraftEventLog,
        log: &'a mut dyn LogSink,
        tick: Ticks,
    ) -> MachineContext<'a> {
        MachineContext {
            state,
            events,
            tick,
            log,
        }
    }

    pub(crate) fn step(
        &mut self,
        events: &mut CraftEventLog,
        log: &mut dyn LogSink,
        tick: Ticks,
    ) -> Result<(), SimError> {
        let mut ctx = Self::context(&mut self.state, events, log, tick);
        self.fsm.execute_for_tick(&mut ctx)
    }

    pub(crate) fn force(
        &mut self,
        mode: MachineMode,
        events: &mut CraftEventLog,
        log: &mut dyn LogSink,
        tick: Ticks,
    ) -> Result<(), SimError> {
        let mut ctx = Self::context(&mut self.state, events, log, tick);
        self.fsm.force_transition_to(mode, &mut ctx)
    }

    pub fn transition_count(&self) -> u64 {
        self.fsm.transition_count()
    }
}

#[derive(Debug)]
pub struct InserterUnit {
    pub state: InserterState,
    pub source: EntityId,
    pub sink: EntityId,
    pub(crate) fsm: ModeStateMachine<InserterMode>,
}

impl InserterUnit {
    pub(crate) fn step(
        &mut self,
        source: Source<'_>,
        sink: Sink<'_>,
        log: &mut dyn LogSink,
        tick: Ticks,
    ) -> Result<(), SimError> {
        let mut ctx = InserterContext {
            state: &mut self.state,
            source,
            sink,
            tick,
            log,
        };
        self.fsm.execute_for_tick(&mut ctx)
    }

    pub(crate) fn force(
        &mut self,
        mode: InserterMode,
        source: Source<'_>,
        sink: Sink<'_>,
        log: &mut dyn LogSink,
        tick: Ticks,
    ) -> Result<(), SimError> {
        let mut ctx = InserterContext {
            state: &mut self.state,
            source,
            sink,
            tick,
            log,
        };
        self.fsm.force_transition_to(mode, &mut ctx)
    }

    pub fn transition_count(&self) -> u64 {
        self.fsm.transition_count()
    }
}

#[derive(Debug)]
pub struct DrillUnit {
    pub state: DrillState,
    pub(crate) fsm: ModeStateMachine<DrillMode>,
}

impl DrillUnit {
    pub(crate) fn step(&mut self, log: &mut dyn LogSink, tick: Ticks) -> Result<(), SimError> {
        let mut ctx = DrillContext {
            state: &mut self.state,
            tick,
            log,
        };
        self.fsm.execute_for_tick(&mut ctx)
    }

    pub(crate) fn force(
        &mut self,
        mode: DrillMode,
        log: &mut dyn LogSink,
        tick: Ticks,
    ) -> Result<(), SimError> {
        let mut ctx = DrillContext {
            state: &mut self.state,
            tick,
            log,
        };
        self.fsm.force_transition_to(mode, &mut ctx)
    }

    pub fn transition_count(&self) -> u64 {
        self.fsm.transition_count()
    }
}

#[derive(Debug)]
pub enum Entity {
    Machine(MachineUnit),
    Inserter(InserterUnit),
    Drill(DrillUnit),
    Belt(BeltState),
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Machine(_) => "machine",
            Entity::Inserter(_) => "inserter",
            Entity::Drill(_) => "drill",
            Entity::Belt(_) => "belt",
        }
    }

    pub fn inventory(&self) -> &InventoryState {
        match self {
            Entity::Machine(unit) => &unit.state.inventory,
            Entity::Inserter(unit) => &unit.state.inventory,
            Entity::Drill(unit) => &unit.state.inventory,
            Entity::Belt(belt) => &belt.inventory,
        }
    }

    /// What an inserter may pick up from this entity. A machine only gives
    /// up its recipe's products; an inserter's hand is not a source.
    pub(crate) fn source(&mut self, id: EntityId) -> Result<Source<'_>, SimError> {
        match self {
            Entity::Machine(unit) => {
                let MachineState {
                    inventory, rates, ..
                } = &mut unit.state;
                Ok(Source::machine_output(inventory, &rates.products))
            }
            Entity::Drill(unit) => Ok(Source::open(&mut unit.state.inventory)),
            Entity::Belt(belt) => Ok(Source::open(&mut belt.inventory)),
            Entity::Inserter(_) => Err(SimError::EntityKindMismatch {
                entity: id,
                expected: "machine, drill or belt",
            }),
        }
    }

    pub(crate) fn sink(&mut self, id: EntityId) -> Result<Sink<'_>, SimError> {
        match self {
            Entity::Machine(unit) => Ok(Sink {
                kind: SinkKind::Machine,
                inventory: &mut unit.state.inventory,
            }),
            Entity::Belt(belt) => Ok(Sink {
                kind: SinkKind::Belt,
                inventory: &mut belt.inventory,
            }),
            Entity::Inserter(_) | Entity::Drill(_) => Err(SimError::EntityKindMismatch {
                entity: id,
                expected: "machine or belt",
            }),
        }
    }

    /// Inventory the caller may seed before a run. Inserter hands are
    /// excluded since they must mirror `held`.
    pub(crate) fn seedable_inventory(&mut self, id: EntityId) -> Result<&mut InventoryState, SimError> {
        match self {
            Entity::Machine(unit) => Ok(&mut unit.state.inventory),
            Entity::Drill(unit) => Ok(&mut unit.state.inventory),
            Entity::Belt(belt) => Ok(&mut belt.inventory),
            Entity::Inserter(_) => Err(SimError::EntityKindMismatch {
                entity: id,
                expected: "machine, drill or belt",
            }),
        }
    }
}
