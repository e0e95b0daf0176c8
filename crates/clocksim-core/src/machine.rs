//! Crafting machine modes.
//!
//! A machine crafts one recipe at an exact rational cadence. `Working`
//! accumulates fractional progress every tick and completes as many whole
//! crafts as the accumulator allows; `IngredientShortage` and `OutputFull`
//! are pure status markers. Entering or leaving `Working` forfeits partial
//! progress.

use crate::error::SimError;
use crate::event::CraftEventLog;
use crate::fsm::{Mode, ModeContext, ModeStateMachine, ModeTransition, TransitionEvaluator};
use crate::id::{EntityId, ItemTypeId};
use crate::inventory::InventoryState;
use crate::log::LogSink;
use crate::plugin::{CraftEventPlugin, StatusMirrorPlugin};
use crate::rate::MachineRates;
use crate::rational::{Ratio, Ticks, floor_u64, int, split_whole, whole_to_u64};
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MachineMode {
    Working,
    IngredientShortage,
    OutputFull,
}

impl MachineMode {
    pub const ALL: [MachineMode; 3] = [
        MachineMode::Working,
        MachineMode::IngredientShortage,
        MachineMode::OutputFull,
    ];

    /// Stable numeric tag, used for state hashing.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Mutable record of one crafting machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    pub id: EntityId,
    pub recipe: String,
    pub rates: MachineRates,
    /// Ingredients and products share one inventory.
    pub inventory: InventoryState,
    pub status: MachineMode,
    pub crafting_progress: Ratio,
    pub bonus_progress: Ratio,
    /// Whole crafts completed (bonus crafts excluded).
    pub craft_count: u64,
    /// Units of the primary product output, bonus included.
    pub total_crafted: u64,
}

impl MachineState {
    pub fn new(id: EntityId, recipe: impl Into<String>, rates: MachineRates) -> Self {
        Self {
            id,
            recipe: recipe.into(),
            rates,
            inventory: InventoryState::new(),
            status: MachineMode::Working,
            crafting_progress: Ratio::zero(),
            bonus_progress: Ratio::zero(),
            craft_count: 0,
            total_crafted: 0,
        }
    }

    /// Crafts the current inventory can pay for; unbounded without ingredients.
    pub fn affordable_crafts(&self) -> u64 {
        self.rates
            .ingredients
            .iter()
            .filter(|(_, amount)| amount.is_positive())
            .map(|(item, amount)| {
                let available = int(self.inventory.quantity(*item));
                floor_u64(&(available / amount)).unwrap_or(u64::MAX)
            })
            .min()
            .unwrap_or(u64::MAX)
    }

    /// Whether every ingredient covers at least one craft.
    pub fn has_ingredients(&self) -> bool {
        self.affordable_crafts() >= 1
    }

    /// Whether any product reached its inventory limit.
    pub fn is_output_blocked(&self) -> bool {
        self.rates
            .products
            .iter()
            .any(|(item, _)| self.inventory.is_at_limit(*item))
    }

    /// Primary product of the recipe.
    pub fn primary_product(&self) -> Option<ItemTypeId> {
        self.rates.products.first().map(|(item, _)| *item)
    }

    fn reset_progress(&mut self) {
        self.crafting_progress = Ratio::zero();
        self.bonus_progress = Ratio::zero();
    }

    /// Add `crafts` worth of every product; returns primary-product units.
    fn output_products(&mut self, crafts: u64) -> Result<u64, SimError> {
        let mut primary = None;
        for (item, amount) in &self.rates.products {
            let quantity = scaled_quantity(amount, crafts)?;
            self.inventory.add_quantity(*item, quantity)?;
            primary.get_or_insert(quantity);
        }
        Ok(primary.unwrap_or(0))
    }

    fn consume_ingredients(&mut self, crafts: u64) -> Result<(), SimError> {
        for (item, amount) in &self.rates.ingredients {
            let quantity = scaled_quantity(amount, crafts)?;
            self.inventory.remove_quantity(*item, quantity)?;
        }
        Ok(())
    }

    fn add_total_crafted(&mut self, units: u64) -> Result<(), SimError> {
        self.total_crafted = self
            .total_crafted
            .checked_add(units)
            .ok_or_else(|| SimError::QuantityOutOfRange("total crafted".to_string()))?;
        Ok(())
    }
}

/// `floor(amount * crafts)` as an integer quantity.
fn scaled_quantity(amount: &Ratio, crafts: u64) -> Result<u64, SimError> {
    floor_u64(&(amount * int(crafts)))
        .ok_or_else(|| SimError::QuantityOutOfRange(format!("{amount} x {crafts}")))
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a machine mode touches during one tick.
pub struct MachineContext<'a> {
    pub state: &'a mut MachineState,
    pub events: &'a mut CraftEventLog,
    pub tick: Ticks,
    pub log: &'a mut dyn LogSink,
}

impl ModeContext<MachineMode> for MachineContext<'_> {
    fn tick(&self) -> Ticks {
        self.tick
    }

    fn set_status(&mut self, status: MachineMode) {
        self.state.status = status;
    }

    fn logger(&mut self) -> &mut dyn LogSink {
        &mut *self.log
    }
}

// ---------------------------------------------------------------------------
// Mode bodies
// ---------------------------------------------------------------------------

impl Mode for MachineMode {
    type Context<'a> = MachineContext<'a>;

    fn on_enter(self, ctx: &mut MachineContext<'_>) {
        if self == MachineMode::Working {
            ctx.state.reset_progress();
        }
    }

    fn on_exit(self, ctx: &mut MachineContext<'_>) {
        if self == MachineMode::Working {
            ctx.state.reset_progress();
        }
    }

    fn execute_for_tick(self, ctx: &mut MachineContext<'_>) -> Result<(), SimError> {
        match self {
            MachineMode::Working => work(ctx.state),
            MachineMode::IngredientShortage | MachineMode::OutputFull => Ok(()),
        }
    }
}

fn work(state: &mut MachineState) -> Result<(), SimError> {
    let affordable = state.affordable_crafts();
    if affordable == 0 {
        state.reset_progress();
        return Ok(());
    }

    state.crafting_progress += &state.rates.crafting.crafts_per_tick;
    let (whole, remainder) = split_whole(&state.crafting_progress);
    let due = whole_to_u64(&whole)
        .ok_or_else(|| SimError::QuantityOutOfRange(format!("{whole} crafts due")))?;
    // Whole crafts the inventory cannot pay for stay in the accumulator.
    let crafts = due.min(affordable);
    state.crafting_progress = remainder + int(due - crafts);

    if crafts > 0 {
        state.consume_ingredients(crafts)?;
        state.craft_count = state
            .craft_count
            .checked_add(crafts)
            .ok_or_else(|| SimError::QuantityOutOfRange("craft count".to_string()))?;
        let units = state.output_products(crafts)?;
        state.add_total_crafted(units)?;
    }

    if state.rates.bonus.is_active() {
        state.bonus_progress += &state.rates.bonus.bonus_crafts_per_tick;
        let (whole, remainder) = split_whole(&state.bonus_progress);
        state.bonus_progress = remainder;
        let bonus = whole_to_u64(&whole)
            .ok_or_else(|| SimError::QuantityOutOfRange(format!("{whole} bonus crafts due")))?;
        if bonus > 0 {
            let units = state.output_products(bonus)?;
            state.add_total_crafted(units)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Transition policy for a machine while it is in `from`.
///
/// Output blockage wins over shortage: a machine with a full output stays in
/// `OutputFull` even if it also lacks ingredients.
#[derive(Debug, Clone, Copy)]
pub struct MachineTransitions {
    from: MachineMode,
}

impl MachineTransitions {
    pub fn from(from: MachineMode) -> Self {
        Self { from }
    }
}

impl TransitionEvaluator<MachineMode> for MachineTransitions {
    fn evaluate(&mut self, ctx: &MachineContext<'_>) -> Option<ModeTransition<MachineMode>> {
        let state = &*ctx.state;
        let (to, reason) = if state.is_output_blocked() {
            (MachineMode::OutputFull, "output full")
        } else if !state.has_ingredients() {
            (MachineMode::IngredientShortage, "missing ingredients")
        } else {
            (MachineMode::Working, "ready to craft")
        };
        (to != self.from).then(|| ModeTransition::to(to, reason))
    }
}

/// The standard machine graph: every mode evaluated by
/// [`MachineTransitions`], status mirrored, craft events optional.
pub fn machine_state_machine(
    initial: MachineMode,
    record_crafts: bool,
) -> Result<ModeStateMachine<MachineMode>, SimError> {
    let mut builder = ModeStateMachine::builder(initial);
    for mode in MachineMode::ALL {
        builder = builder.evaluator(mode, MachineTransitions::from(mode));
    }
    builder = builder.plugin(StatusMirrorPlugin);
    if record_crafts {
        builder = builder.plugin(CraftEventPlugin::new());
    }
    builder.build()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NullSink;
    use crate::rational::ratio;
    use crate::test_utils::*;

    fn tick_working(state: &mut MachineState, events: &mut CraftEventLog, tick: Ticks) {
        let mut sink = NullSink;
        let mut ctx = MachineContext {
            state,
            events,
            tick,
            log: &mut sink,
        };
        MachineMode::Working.execute_for_tick(&mut ctx).unwrap();
    }

    #[test]
    fn zero_ingredients_keep_progress_at_zero() {
        let mut state = MachineState::new(test_entity(), "gear", gear_rates(int(1)));
        let mut events = CraftEventLog::new();
        for tick in 0..500 {
            tick_working(&mut state, &mut events, tick);
            assert!(state.crafting_progress.is_zero());
            assert!(state.bonus_progress.is_zero());
        }
        assert!(state.inventory.is_empty());
        assert_eq!(state.craft_count, 0);
    }

    #[test]
    fn single_tick_can_complete_several_crafts() {
        // 5/2 crafts per tick.
        let rates = MachineRates::from_parts(
            &ratio(1, 150),
            &int(1),
            &int(0),
            vec![(iron_plate(), int(2))],
            vec![(gear(), int(1))],
        )
        .unwrap();
        assert_eq!(rates.crafting.crafts_per_tick, ratio(5, 2));
        let mut state = MachineState::new(test_entity(), "gear", rates);
        state.inventory.add_quantity(iron_plate(), 100).unwrap();
        let mut events = CraftEventLog::new();

        tick_working(&mut state, &mut events, 0);

        assert_eq!(state.craft_count, 2);
        assert_eq!(state.inventory.quantity(iron_plate()), 96);
        assert_eq!(state.inventory.quantity(gear()), 2);
        assert_eq!(state.total_crafted, 2);
        assert_eq!(state.crafting_progress, ratio(1, 2));
    }

    #[test]
    fn rate_just_below_a_whole_number_floors() {
        let gear_machine = |energy: Ratio| {
            let rates = MachineRates::from_parts(
                &energy,
                &int(1),
                &int(0),
                vec![(iron_plate(), int(2))],
                vec![(gear(), int(1))],
            )
            .unwrap();
            let mut state = MachineState::new(test_entity(), "gear", rates);
            state.inventory.add_quantity(iron_plate(), 100).unwrap();
            state
        };

        let mut below = gear_machine(ratio(1_000_000, 179_999_940));
        assert_eq!(below.rates.crafting.crafts_per_tick, ratio(2_999_999, 1_000_000));
        tick_working(&mut below, &mut CraftEventLog::new(), 0);
        assert_eq!(below.craft_count, 2);
        assert_eq!(below.inventory.quantity(iron_plate()), 96);
        assert_eq!(below.crafting_progress, ratio(999_999, 1_000_000));

        let mut exact = gear_machine(ratio(1, 180));
        assert_eq!(exact.rates.crafting.crafts_per_tick, int(3));
        tick_working(&mut exact, &mut CraftEventLog::new(), 0);
        assert_eq!(exact.craft_count, 3);
        assert_eq!(exact.inventory.quantity(gear()), 3);
        assert!(exact.crafting_progress.is_zero());
    }

    #[test]
    fn unaffordable_crafts_stay_in_progress() {
        let rates = MachineRates::from_parts(
            &ratio(1, 180),
            &int(1),
            &int(0),
            vec![(iron_plate(), int(2))],
            vec![(gear(), int(1))],
        )
        .unwrap();
        assert_eq!(rates.crafting.crafts_per_tick, int(3));
        let mut state = MachineState::new(test_entity(), "gear", rates);
        state.inventory.add_quantity(iron_plate(), 5).unwrap();
        let mut events = CraftEventLog::new();

        tick_working(&mut state, &mut events, 0);

        assert_eq!(state.craft_count, 2);
        assert_eq!(state.inventory.quantity(iron_plate()), 1);
        assert_eq!(state.crafting_progress, int(1));
    }

    #[test]
    fn progress_never_drifts_on_recurring_rate() {
        // 200/3 ticks per craft: after 200 ticks exactly 3 crafts, zero remainder.
        let mut state = MachineState::new(test_entity(), "gear", gear_rates(ratio(9, 10)));
        state.inventory.add_quantity(iron_plate(), 1_000).unwrap();
        let mut events = CraftEventLog::new();
        for tick in 0..200 {
            tick_working(&mut state, &mut events, tick);
        }
        assert_eq!(state.craft_count, 3);
        assert!(state.crafting_progress.is_zero());
        assert_eq!(state.inventory.quantity(iron_plate()), 1_000 - 6);
    }

    #[test]
    fn bonus_output_is_free() {
        // One craft per tick, +50% productivity: a bonus every other tick.
        let rates = MachineRates::from_parts(
            &ratio(1, 60),
            &int(1),
            &ratio(1, 2),
            vec![(iron_plate(), int(1))],
            vec![(gear(), int(1))],
        )
        .unwrap();
        let mut state = MachineState::new(test_entity(), "gear", rates);
        state.inventory.add_quantity(iron_plate(), 10).unwrap();
        let mut events = CraftEventLog::new();
        for tick in 0..4 {
            tick_working(&mut state, &mut events, tick);
        }
        assert_eq!(state.craft_count, 4);
        assert_eq!(state.inventory.quantity(iron_plate()), 6);
        assert_eq!(state.inventory.quantity(gear()), 6);
        assert_eq!(state.total_crafted, 6);
        assert!(state.bonus_progress.is_zero());
    }

    #[test]
    fn entering_and_leaving_working_forfeits_progress() {
        let mut state = MachineState::new(test_entity(), "gear", gear_rates(int(1)));
        state.crafting_progress = ratio(1, 3);
        state.bonus_progress = ratio(1, 7);
        let mut events = CraftEventLog::new();
        let mut sink = NullSink;
        let mut ctx = MachineContext {
            state: &mut state,
            events: &mut events,
            tick: 0,
            log: &mut sink,
        };
        MachineMode::Working.on_exit(&mut ctx);
        assert!(ctx.state.crafting_progress.is_zero());
        ctx.state.crafting_progress = ratio(1, 3);
        MachineMode::Working.on_enter(&mut ctx);
        assert!(ctx.state.crafting_progress.is_zero());
        assert!(ctx.state.bonus_progress.is_zero());
    }

    #[test]
    fn status_modes_do_nothing() {
        let mut state = MachineState::new(test_entity(), "gear", gear_rates(int(1)));
        state.inventory.add_quantity(iron_plate(), 10).unwrap();
        let before = state.clone();
        let mut events = CraftEventLog::new();
        let mut sink = NullSink;
        let mut ctx = MachineContext {
            state: &mut state,
            events: &mut events,
            tick: 0,
            log: &mut sink,
        };
        MachineMode::IngredientShortage.execute_for_tick(&mut ctx).unwrap();
        MachineMode::OutputFull.execute_for_tick(&mut ctx).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn evaluator_prefers_output_full() {
        let mut state = MachineState::new(test_entity(), "gear", gear_rates(int(1)));
        state.inventory.set_limit(gear(), 2);
        state.inventory.add_quantity(gear(), 2).unwrap();
        let mut events = CraftEventLog::new();
        let mut sink = NullSink;
        let ctx = MachineContext {
            state: &mut state,
            events: &mut events,
            tick: 0,
            log: &mut sink,
        };
        let t = MachineTransitions::from(MachineMode::Working).evaluate(&ctx).unwrap();
        assert_eq!(t.to, MachineMode::OutputFull);
        assert!(MachineTransitions::from(MachineMode::OutputFull).evaluate(&ctx).is_none());
    }

    #[test]
    fn evaluator_cycles_through_shortage() {
        let mut state = MachineState::new(test_entity(), "gear", gear_rates(int(1)));
        let mut events = CraftEventLog::new();
        let mut sink = NullSink;
        let mut ctx = MachineContext {
            state: &mut state,
            events: &mut events,
            tick: 0,
            log: &mut sink,
        };
        let t = MachineTransitions::from(MachineMode::Working).evaluate(&ctx).unwrap();
        assert_eq!(t.to, MachineMode::IngredientShortage);

        ctx.state.inventory.add_quantity(iron_plate(), 2).unwrap();
        let t = MachineTransitions::from(MachineMode::IngredientShortage)
            .evaluate(&ctx)
            .unwrap();
        assert_eq!(t.to, MachineMode::Working);
        assert!(MachineTransitions::from(MachineMode::Working).evaluate(&ctx).is_none());
    }

    #[test]
    fn standard_machine_graph_covers_every_mode() {
        let fsm = machine_state_machine(MachineMode::Working, true).unwrap();
        assert_eq!(fsm.modes().collect::<Vec<_>>(), MachineMode::ALL.to_vec());
        assert_eq!(fsm.current(), MachineMode::Working);
    }
}
