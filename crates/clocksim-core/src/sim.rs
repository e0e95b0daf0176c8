//! Step-driven simulation of a set of entities.
//!
//! Each [`Simulation::step`] advances the global tick by one and steps every
//! scheduled entity once, in the order given by [`Simulation::set_order`]
//! (insertion order by default). Entities that share an inventory, like an
//! inserter and its source, therefore always interact in the same order, so
//! a run is a pure function of its setup.
//!
//! Any [`SimError`] returned from a step is fatal: the simulation is left
//! mid-tick and must not be stepped again.

use crate::config::SimConfig;
use crate::drill::{DrillMode, DrillState, drill_state_machine};
use crate::entity::{BeltState, DrillUnit, Entity, InserterUnit, MachineUnit};
use crate::error::SimError;
use crate::event::CraftEventLog;
use crate::id::{EntityId, ItemTypeId};
use crate::inserter::{
    HandCallback, InserterMode, InserterState, Sink, Source, inserter_state_machine,
};
use crate::inventory::InventoryState;
use crate::log::{LogLevel, LogSink, TracingSink};
use crate::machine::{MachineMode, MachineState, machine_state_machine};
use crate::rate::{BonusProductivityRate, CraftingRate, MachineRates, drill_rates};
use crate::rational::Ticks;
use crate::registry::{Registry, RegistryError};
use num_bigint::BigInt;
use slotmap::SlotMap;
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable counters tracked by the simulation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Ticks completed so far.
    pub tick: Ticks,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed an exact rational: numerator and denominator, length-prefixed.
    pub fn write_ratio(&mut self, v: &crate::rational::Ratio) {
        self.write_bigint(v.numer());
        self.write_bigint(v.denom());
    }

    fn write_bigint(&mut self, v: &BigInt) {
        let bytes = v.to_signed_bytes_le();
        self.write_u64(bytes.len() as u64);
        self.write(&bytes);
    }

    pub fn write_inventory(&mut self, inventory: &InventoryState) {
        for (item, quantity) in inventory.iter() {
            self.write_u32(item.0);
            self.write_u64(quantity);
        }
        // Separator so adjacent inventories cannot alias.
        self.write_u32(u32::MAX);
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Inserter setup
// ---------------------------------------------------------------------------

/// Parameters for [`Simulation::add_inserter`].
pub struct InserterSpec {
    pub stack_size: u32,
    pub swing_ticks: u32,
    pub filter: Option<ItemTypeId>,
    pub on_hand_change: Option<HandCallback>,
}

impl Default for InserterSpec {
    fn default() -> Self {
        Self {
            stack_size: 1,
            swing_ticks: 1,
            filter: None,
            on_hand_change: None,
        }
    }
}

impl fmt::Debug for InserterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InserterSpec")
            .field("stack_size", &self.stack_size)
            .field("swing_ticks", &self.swing_ticks)
            .field("filter", &self.filter)
            .field("on_hand_change", &self.on_hand_change.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl InserterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack_size(mut self, stack_size: u32) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn swing_ticks(mut self, swing_ticks: u32) -> Self {
        self.swing_ticks = swing_ticks;
        self
    }

    pub fn filter(mut self, item: ItemTypeId) -> Self {
        self.filter = Some(item);
        self
    }

    pub fn on_hand_change(mut self, callback: HandCallback) -> Self {
        self.on_hand_change = Some(callback);
        self
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

pub struct Simulation {
    entities: SlotMap<EntityId, Entity>,
    order: Vec<EntityId>,
    events: CraftEventLog,
    config: SimConfig,
    log: Box<dyn LogSink>,
    sim_state: SimState,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.sim_state.tick)
            .field("entities", &self.entities.len())
            .field("order", &self.order)
            .field("events", &self.events)
            .field("config", &self.config)
            .finish()
    }
}

impl Simulation {
    /// A simulation that logs through `tracing`.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Self::with_log_sink(config, Box::new(TracingSink))
    }

    pub fn with_log_sink(config: SimConfig, log: Box<dyn LogSink>) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            entities: SlotMap::with_key(),
            order: Vec::new(),
            events: CraftEventLog::new(),
            config,
            log,
            sim_state: SimState::default(),
        })
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Add a machine crafting `recipe` at `rates`. It starts in `Working`.
    pub fn add_machine(
        &mut self,
        recipe: impl Into<String>,
        rates: MachineRates,
    ) -> Result<EntityId, SimError> {
        let fsm = machine_state_machine(MachineMode::Working, self.config.record_craft_events)?;
        let recipe = recipe.into();
        let id = self.entities.insert_with_key(|id| {
            Entity::Machine(MachineUnit {
                state: MachineState::new(id, recipe, rates),
                fsm,
            })
        });
        self.order.push(id);
        Ok(id)
    }

    /// Add a machine from static metadata. Every product's output is limited
    /// to one stack.
    pub fn add_machine_from_registry(
        &mut self,
        registry: &Registry,
        recipe: &str,
        machine: &str,
    ) -> Result<EntityId, SimError> {
        let recipe_def = registry.recipe(recipe)?;
        let machine_def = registry.machine(machine)?;
        let rates = MachineRates::for_recipe(recipe_def, machine_def)?;
        let limits: Vec<_> = rates
            .products
            .iter()
            .map(|(item, _)| (*item, u64::from(registry.stack_size(*item))))
            .collect();
        let id = self.add_machine(recipe_def.name.clone(), rates)?;
        let unit = self.machine_unit_mut(id)?;
        for (item, limit) in limits {
            unit.state.inventory.set_limit(item, limit);
        }
        Ok(id)
    }

    /// Add a drill mining `resource`. It starts in `Working`.
    pub fn add_drill(
        &mut self,
        resource: ItemTypeId,
        rate: CraftingRate,
        bonus: BonusProductivityRate,
        output_limit: u64,
    ) -> Result<EntityId, SimError> {
        let fsm = drill_state_machine(DrillMode::Working)?;
        let id = self.entities.insert_with_key(|id| {
            Entity::Drill(DrillUnit {
                state: DrillState::new(id, resource, rate, bonus, output_limit),
                fsm,
            })
        });
        self.order.push(id);
        Ok(id)
    }

    /// Add a drill from static metadata, buffering one stack of output.
    pub fn add_drill_from_registry(
        &mut self,
        registry: &Registry,
        drill: &str,
        resource: &str,
    ) -> Result<EntityId, SimError> {
        let drill_def = registry.drill(drill)?;
        let resource_id = registry
            .item_id(resource)
            .ok_or_else(|| RegistryError::NotFound(resource.to_string()))?;
        let mining_time = registry.mining_time(resource_id)?;
        let (rate, bonus) = drill_rates(drill_def, mining_time)?;
        let limit = u64::from(registry.stack_size(resource_id));
        self.add_drill(resource_id, rate, bonus, limit)
    }

    pub fn add_belt(&mut self) -> EntityId {
        let id = self.entities.insert_with_key(|id| {
            Entity::Belt(BeltState {
                id,
                inventory: InventoryState::new(),
            })
        });
        self.order.push(id);
        id
    }

    /// Add an inserter moving items from `source` to `sink`. The sink must
    /// be a machine or a belt; the source any entity but an inserter.
    pub fn add_inserter(
        &mut self,
        source: EntityId,
        sink: EntityId,
        spec: InserterSpec,
    ) -> Result<EntityId, SimError> {
        if spec.stack_size == 0 {
            return Err(SimError::InvalidConfig(
                "inserter stack size must be positive".to_string(),
            ));
        }
        if source == sink {
            return Err(SimError::SelfLinkedInserter(source));
        }
        self.entity_mut(source)?.source(source)?;
        self.entity_mut(sink)?.sink(sink)?;

        let fsm = inserter_state_machine(InserterMode::Idle, spec.on_hand_change)?;
        let belt_drop_per_tick = self.config.belt_drop_per_tick;
        let id = self.entities.insert_with_key(|id| {
            let mut state = InserterState::new(id, spec.stack_size, spec.swing_ticks);
            state.filter = spec.filter;
            state.belt_drop_per_tick = belt_drop_per_tick;
            Entity::Inserter(InserterUnit {
                state,
                source,
                sink,
                fsm,
            })
        });
        self.order.push(id);
        Ok(id)
    }

    /// Put items into a machine, drill or belt before the first tick.
    pub fn seed_items(
        &mut self,
        id: EntityId,
        item: ItemTypeId,
        quantity: u64,
    ) -> Result<(), SimError> {
        self.ensure_not_started()?;
        self.entity_mut(id)?.seedable_inventory(id)?.add_quantity(item, quantity)
    }

    /// Cap `item` in an entity's inventory before the first tick. Evaluators
    /// read limits to detect full outputs and targets.
    pub fn set_inventory_limit(
        &mut self,
        id: EntityId,
        item: ItemTypeId,
        limit: u64,
    ) -> Result<(), SimError> {
        self.ensure_not_started()?;
        self.entity_mut(id)?.seedable_inventory(id)?.set_limit(item, limit);
        Ok(())
    }

    /// Replace the per-tick stepping order. Entities left out are not
    /// stepped; listing one twice is an error.
    pub fn set_order(&mut self, order: Vec<EntityId>) -> Result<(), SimError> {
        let mut seen = BTreeSet::new();
        for &id in &order {
            if !self.entities.contains_key(id) {
                return Err(SimError::UnknownEntity(id));
            }
            if !seen.insert(id) {
                return Err(SimError::DuplicateEntityInTick(id));
            }
        }
        self.order = order;
        Ok(())
    }

    pub fn set_inserter_enabled(&mut self, id: EntityId, enabled: bool) -> Result<(), SimError> {
        match self.entity_mut(id)? {
            Entity::Inserter(unit) => {
                unit.state.enabled = enabled;
                Ok(())
            }
            _ => Err(kind_mismatch(id, "inserter")),
        }
    }

    pub fn set_drill_enabled(&mut self, id: EntityId, enabled: bool) -> Result<(), SimError> {
        match self.entity_mut(id)? {
            Entity::Drill(unit) => {
                unit.state.enabled = enabled;
                Ok(())
            }
            _ => Err(kind_mismatch(id, "drill")),
        }
    }

    // -----------------------------------------------------------------------
    // Forced transitions
    // -----------------------------------------------------------------------

    /// Switch a machine's mode without consulting its evaluator.
    pub fn force_machine_mode(&mut self, id: EntityId, mode: MachineMode) -> Result<(), SimError> {
        let tick = self.sim_state.tick;
        let Self {
            entities,
            events,
            log,
            ..
        } = self;
        match entities.get_mut(id) {
            Some(Entity::Machine(unit)) => unit.force(mode, events, log.as_mut(), tick),
            Some(_) => Err(kind_mismatch(id, "machine")),
            None => Err(SimError::UnknownEntity(id)),
        }
    }

    pub fn force_inserter_mode(&mut self, id: EntityId, mode: InserterMode) -> Result<(), SimError> {
        let tick = self.sim_state.tick;
        let (unit, source, sink) = inserter_parts(&mut self.entities, id)?;
        unit.force(mode, source, sink, self.log.as_mut(), tick)
    }

    pub fn force_drill_mode(&mut self, id: EntityId, mode: DrillMode) -> Result<(), SimError> {
        let tick = self.sim_state.tick;
        match self.entities.get_mut(id) {
            Some(Entity::Drill(unit)) => unit.force(mode, self.log.as_mut(), tick),
            Some(_) => Err(kind_mismatch(id, "drill")),
            None => Err(SimError::UnknownEntity(id)),
        }
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance one tick.
    pub fn step(&mut self) -> Result<(), SimError> {
        let tick = self.sim_state.tick;
        let Self {
            entities,
            order,
            events,
            log,
            ..
        } = self;
        for &id in order.iter() {
            step_entity(entities, events, log.as_mut(), id, tick)?;
        }
        self.sim_state.tick += 1;
        Ok(())
    }

    /// Advance `ticks` ticks, stopping at the first error.
    pub fn run(&mut self, ticks: Ticks) -> Result<(), SimError> {
        let start = self.sim_state.tick;
        self.log.log(
            LogLevel::Info,
            &format!(
                "running {ticks} ticks from tick {start} over {} entities",
                self.order.len()
            ),
        );
        for _ in 0..ticks {
            self.step()?;
        }
        self.log.log(
            LogLevel::Info,
            &format!(
                "finished at tick {}: {} craft events recorded",
                self.sim_state.tick,
                self.events.total_recorded()
            ),
        );
        Ok(())
    }

    /// Run the configured tick budget.
    pub fn run_budget(&mut self) -> Result<(), SimError> {
        self.run(self.config.tick_budget)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Ticks completed so far.
    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn order(&self) -> &[EntityId] {
        &self.order
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity, SimError> {
        self.entities.get(id).ok_or(SimError::UnknownEntity(id))
    }

    /// Every entity, in slot order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn machine(&self, id: EntityId) -> Result<&MachineState, SimError> {
        match self.entity(id)? {
            Entity::Machine(unit) => Ok(&unit.state),
            _ => Err(kind_mismatch(id, "machine")),
        }
    }

    pub fn inserter(&self, id: EntityId) -> Result<&InserterState, SimError> {
        match self.entity(id)? {
            Entity::Inserter(unit) => Ok(&unit.state),
            _ => Err(kind_mismatch(id, "inserter")),
        }
    }

    pub fn drill(&self, id: EntityId) -> Result<&DrillState, SimError> {
        match self.entity(id)? {
            Entity::Drill(unit) => Ok(&unit.state),
            _ => Err(kind_mismatch(id, "drill")),
        }
    }

    pub fn belt(&self, id: EntityId) -> Result<&BeltState, SimError> {
        match self.entity(id)? {
            Entity::Belt(belt) => Ok(belt),
            _ => Err(kind_mismatch(id, "belt")),
        }
    }

    pub fn inventory(&self, id: EntityId) -> Result<&InventoryState, SimError> {
        Ok(self.entity(id)?.inventory())
    }

    pub fn craft_events(&self) -> &CraftEventLog {
        &self.events
    }

    /// Mutable access for draining or subscribing.
    pub fn craft_events_mut(&mut self) -> &mut CraftEventLog {
        &mut self.events
    }

    /// Deterministic hash of every entity's observable state.
    pub fn state_hash(&self) -> StateHash {
        let mut hash = StateHash::new();
        hash.write_u64(self.sim_state.tick);
        for (_, entity) in self.entities.iter() {
            match entity {
                Entity::Machine(unit) => {
                    let s = &unit.state;
                    hash.write(&[0, s.status.code()]);
                    hash.write_ratio(&s.crafting_progress);
                    hash.write_ratio(&s.bonus_progress);
                    hash.write_u64(s.craft_count);
                    hash.write_u64(s.total_crafted);
                    hash.write_inventory(&s.inventory);
                }
                Entity::Inserter(unit) => {
                    let s = &unit.state;
                    hash.write(&[1, s.status.code(), u8::from(s.enabled)]);
                    match s.held {
                        Some(held) => {
                            hash.write_u32(held.item.0);
                            hash.write_u32(held.quantity);
                        }
                        None => hash.write_u32(u32::MAX),
                    }
                    hash.write_u32(s.swing_progress);
                    hash.write_inventory(&s.inventory);
                }
                Entity::Drill(unit) => {
                    let s = &unit.state;
                    hash.write(&[2, s.status.code(), u8::from(s.enabled)]);
                    hash.write_ratio(&s.mining_progress);
                    hash.write_ratio(&s.bonus_progress);
                    hash.write_u64(s.mined_count);
                    hash.write_u64(s.total_mined);
                    hash.write_inventory(&s.inventory);
                }
                Entity::Belt(belt) => {
                    hash.write(&[3]);
                    hash.write_inventory(&belt.inventory);
                }
            }
        }
        hash
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, SimError> {
        self.entities.get_mut(id).ok_or(SimError::UnknownEntity(id))
    }

    fn machine_unit_mut(&mut self, id: EntityId) -> Result<&mut MachineUnit, SimError> {
        match self.entity_mut(id)? {
            Entity::Machine(unit) => Ok(unit),
            _ => Err(kind_mismatch(id, "machine")),
        }
    }

    fn ensure_not_started(&self) -> Result<(), SimError> {
        match self.sim_state.tick {
            0 => Ok(()),
            tick => Err(SimError::SetupAfterStart(tick)),
        }
    }
}

fn kind_mismatch(entity: EntityId, expected: &'static str) -> SimError {
    SimError::EntityKindMismatch { entity, expected }
}

/// Borrow an inserter together with its source and sink.
fn inserter_parts(
    entities: &mut SlotMap<EntityId, Entity>,
    id: EntityId,
) -> Result<(&mut InserterUnit, Source<'_>, Sink<'_>), SimError> {
    let (source, sink) = match entities.get(id) {
        Some(Entity::Inserter(unit)) => (unit.source, unit.sink),
        Some(_) => return Err(kind_mismatch(id, "inserter")),
        None => return Err(SimError::UnknownEntity(id)),
    };
    let [inserter, source_entity, sink_entity] = entities
        .get_disjoint_mut([id, source, sink])
        .ok_or(SimError::SelfLinkedInserter(source))?;
    let Entity::Inserter(unit) = inserter else {
        return Err(kind_mismatch(id, "inserter"));
    };
    Ok((
        unit,
        source_entity.source(source)?,
        sink_entity.sink(sink)?,
    ))
}

fn step_entity(
    entities: &mut SlotMap<EntityId, Entity>,
    events: &mut CraftEventLog,
    log: &mut dyn LogSink,
    id: EntityId,
    tick: Ticks,
) -> Result<(), SimError> {
    match entities.get_mut(id) {
        Some(Entity::Machine(unit)) => return unit.step(events, log, tick),
        Some(Entity::Drill(unit)) => return unit.step(log, tick),
        Some(Entity::Belt(_)) => return Ok(()),
        Some(Entity::Inserter(_)) => {}
        None => return Err(SimError::UnknownEntity(id)),
    }
    let (unit, source, sink) = inserter_parts(entities, id)?;
    unit.step(source, sink, log, tick)
}
