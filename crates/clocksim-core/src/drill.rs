//! Mining drill modes.
//!
//! A drill is a crafting machine without ingredients: `Working` accumulates
//! exact mining progress and outputs the resource into its own bounded
//! inventory. Unlike machines, a drill keeps partial progress across
//! `OutputFull` and `Disabled` episodes.

use crate::error::SimError;
use crate::fsm::{Mode, ModeContext, ModeStateMachine, ModeTransition, TransitionEvaluator};
use crate::id::{EntityId, ItemTypeId};
use crate::inventory::InventoryState;
use crate::log::LogSink;
use crate::plugin::StatusMirrorPlugin;
use crate::rate::{BonusProductivityRate, CraftingRate};
use crate::rational::{Ratio, Ticks, floor_u64, int, split_whole, whole_to_u64};
use num_traits::Zero;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DrillMode {
    Working,
    OutputFull,
    Disabled,
}

impl DrillMode {
    pub const ALL: [DrillMode; 3] = [DrillMode::Working, DrillMode::OutputFull, DrillMode::Disabled];

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillState {
    pub id: EntityId,
    pub resource: ItemTypeId,
    pub rate: CraftingRate,
    pub bonus: BonusProductivityRate,
    pub inventory: InventoryState,
    pub status: DrillMode,
    pub enabled: bool,
    pub mining_progress: Ratio,
    pub bonus_progress: Ratio,
    /// Whole mining cycles completed, bonus excluded.
    pub mined_count: u64,
    /// Units output, bonus included.
    pub total_mined: u64,
}

impl DrillState {
    pub fn new(
        id: EntityId,
        resource: ItemTypeId,
        rate: CraftingRate,
        bonus: BonusProductivityRate,
        output_limit: u64,
    ) -> Self {
        let mut inventory = InventoryState::new();
        inventory.set_limit(resource, output_limit);
        Self {
            id,
            resource,
            rate,
            bonus,
            inventory,
            status: DrillMode::Working,
            enabled: true,
            mining_progress: Ratio::zero(),
            bonus_progress: Ratio::zero(),
            mined_count: 0,
            total_mined: 0,
        }
    }

    pub fn is_output_full(&self) -> bool {
        self.inventory.is_at_limit(self.resource)
    }

    fn output(&mut self, cycles: u64, amount: &Ratio) -> Result<u64, SimError> {
        let units = floor_u64(&(amount * int(cycles)))
            .ok_or_else(|| SimError::QuantityOutOfRange(format!("{amount} x {cycles}")))?;
        self.inventory.add_quantity(self.resource, units)?;
        self.total_mined = self
            .total_mined
            .checked_add(units)
            .ok_or_else(|| SimError::QuantityOutOfRange("total mined".to_string()))?;
        Ok(units)
    }
}

pub struct DrillContext<'a> {
    pub state: &'a mut DrillState,
    pub tick: Ticks,
    pub log: &'a mut dyn LogSink,
}

impl ModeContext<DrillMode> for DrillContext<'_> {
    fn tick(&self) -> Ticks {
        self.tick
    }

    fn set_status(&mut self, status: DrillMode) {
        self.state.status = status;
    }

    fn logger(&mut self) -> &mut dyn LogSink {
        &mut *self.log
    }
}

impl Mode for DrillMode {
    type Context<'a> = DrillContext<'a>;

    fn execute_for_tick(self, ctx: &mut DrillContext<'_>) -> Result<(), SimError> {
        match self {
            DrillMode::Working => mine(ctx.state),
            DrillMode::OutputFull | DrillMode::Disabled => Ok(()),
        }
    }
}

fn mine(state: &mut DrillState) -> Result<(), SimError> {
    state.mining_progress += &state.rate.crafts_per_tick;
    let (whole, remainder) = split_whole(&state.mining_progress);
    state.mining_progress = remainder;
    let cycles = whole_to_u64(&whole)
        .ok_or_else(|| SimError::QuantityOutOfRange(format!("{whole} mining cycles due")))?;
    if cycles > 0 {
        state.mined_count = state
            .mined_count
            .checked_add(cycles)
            .ok_or_else(|| SimError::QuantityOutOfRange("mined count".to_string()))?;
        let amount = state.rate.amount_per_craft.clone();
        state.output(cycles, &amount)?;
    }

    if state.bonus.is_active() {
        state.bonus_progress += &state.bonus.bonus_crafts_per_tick;
        let (whole, remainder) = split_whole(&state.bonus_progress);
        state.bonus_progress = remainder;
        let bonus = whole_to_u64(&whole)
            .ok_or_else(|| SimError::QuantityOutOfRange(format!("{whole} bonus cycles due")))?;
        if bonus > 0 {
            let amount = state.bonus.amount_per_bonus.clone();
            state.output(bonus, &amount)?;
        }
    }
    Ok(())
}

/// Transition policy for a drill while it is in `from`. Disabling wins
/// over a full output.
#[derive(Debug, Clone, Copy)]
pub struct DrillTransitions {
    from: DrillMode,
}

impl DrillTransitions {
    pub fn from(from: DrillMode) -> Self {
        Self { from }
    }
}

impl TransitionEvaluator<DrillMode> for DrillTransitions {
    fn evaluate(&mut self, ctx: &DrillContext<'_>) -> Option<ModeTransition<DrillMode>> {
        let state = &*ctx.state;
        let (to, reason) = if !state.enabled {
            (DrillMode::Disabled, "disabled")
        } else if state.is_output_full() {
            (DrillMode::OutputFull, "output full")
        } else {
            (DrillMode::Working, "mining")
        };
        (to != self.from).then(|| ModeTransition::to(to, reason))
    }
}

pub fn drill_state_machine(initial: DrillMode) -> Result<ModeStateMachine<DrillMode>, SimError> {
    let mut builder = ModeStateMachine::builder(initial);
    for mode in DrillMode::ALL {
        builder = builder.evaluator(mode, DrillTransitions::from(mode));
    }
    builder.plugin(StatusMirrorPlugin).build()
}
