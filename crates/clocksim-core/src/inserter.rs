//! Inserter modes.
//!
//! An inserter moves items from a source inventory to a sink in a fixed
//! cycle: `Idle -> Pickup -> Swing -> DropOff -> Idle`. `TargetFull` parks a
//! loaded hand in front of a machine that has no room, and `Disabled` parks
//! an empty hand until the inserter is re-enabled.
//!
//! The hand is mirrored in the inserter's own inventory: every unit picked
//! up is added there and every unit dropped is removed again.

use crate::error::SimError;
use crate::fsm::{Mode, ModeContext, ModeStateMachine, ModeTransition, TransitionEvaluator};
use crate::id::{EntityId, ItemTypeId};
use crate::inventory::InventoryState;
use crate::log::LogSink;
use crate::plugin::{HandContentsPlugin, StatusMirrorPlugin};
use crate::rational::{Ratio, Ticks};
use serde::{Deserialize, Serialize};

/// Units a belt accepts from an inserter per tick.
pub const DEFAULT_BELT_DROP_PER_TICK: u32 = 4;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InserterMode {
    Idle,
    Pickup,
    Swing,
    DropOff,
    Disabled,
    TargetFull,
}

impl InserterMode {
    pub const ALL: [InserterMode; 6] = [
        InserterMode::Idle,
        InserterMode::Pickup,
        InserterMode::Swing,
        InserterMode::DropOff,
        InserterMode::Disabled,
        InserterMode::TargetFull,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Contents of an inserter's hand. A plain value, so snapshots never alias
/// the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeldItem {
    pub item: ItemTypeId,
    pub quantity: u32,
}

/// What an inserter drops into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SinkKind {
    /// Accepts a fixed number of units per tick.
    Belt,
    /// Accepts the whole hand at once.
    Machine,
}

/// Mutable record of one inserter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InserterState {
    pub id: EntityId,
    pub stack_size: u32,
    /// Ticks spent in `Swing` before dropping.
    pub swing_ticks: u32,
    /// Only this item is picked up, if set.
    pub filter: Option<ItemTypeId>,
    pub enabled: bool,
    pub held: Option<HeldItem>,
    pub inventory: InventoryState,
    pub status: InserterMode,
    pub swing_progress: u32,
    pub belt_drop_per_tick: u32,
}

impl InserterState {
    pub fn new(id: EntityId, stack_size: u32, swing_ticks: u32) -> Self {
        Self {
            id,
            stack_size,
            swing_ticks,
            filter: None,
            enabled: true,
            held: None,
            inventory: InventoryState::new(),
            status: InserterMode::Idle,
            swing_progress: 0,
            belt_drop_per_tick: DEFAULT_BELT_DROP_PER_TICK,
        }
    }

    pub fn held_quantity(&self) -> u32 {
        self.held.map_or(0, |h| h.quantity)
    }

    pub fn is_hand_full(&self) -> bool {
        self.held_quantity() >= self.stack_size
    }

    /// Item the next pickup would take from `source`, if any.
    pub fn pickable_item(&self, source: &Source<'_>) -> Option<ItemTypeId> {
        let item = match (self.held, self.filter) {
            (Some(held), _) => held.item,
            (None, Some(filter)) => filter,
            (None, None) => source.first_pickable()?,
        };
        (source.allows(item) && source.inventory.has(item, 1)).then_some(item)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// The source side of an inserter for one tick.
///
/// A machine shares one inventory between ingredients and products, so only
/// its recipe's products may be taken from it.
pub struct Source<'a> {
    pub inventory: &'a mut InventoryState,
    /// Items a pickup may take; `None` allows everything.
    pub products: Option<&'a [(ItemTypeId, Ratio)]>,
}

impl<'a> Source<'a> {
    /// A belt or drill output: anything present may be picked up.
    pub fn open(inventory: &'a mut InventoryState) -> Self {
        Self {
            inventory,
            products: None,
        }
    }

    /// A machine: only `products` may be picked up.
    pub fn machine_output(
        inventory: &'a mut InventoryState,
        products: &'a [(ItemTypeId, Ratio)],
    ) -> Self {
        Self {
            inventory,
            products: Some(products),
        }
    }

    pub fn allows(&self, item: ItemTypeId) -> bool {
        self.products
            .is_none_or(|products| products.iter().any(|(product, _)| *product == item))
    }

    /// Lowest item ID present that may be picked up.
    pub fn first_pickable(&self) -> Option<ItemTypeId> {
        self.inventory
            .iter()
            .map(|(item, _)| item)
            .find(|item| self.allows(*item))
    }
}

/// The sink side of an inserter for one tick.
pub struct Sink<'a> {
    pub kind: SinkKind,
    pub inventory: &'a mut InventoryState,
}

impl Sink<'_> {
    /// A machine sink refuses `item` once at its limit; belts never refuse.
    pub fn is_blocked_for(&self, item: ItemTypeId) -> bool {
        self.kind == SinkKind::Machine && self.inventory.is_at_limit(item)
    }
}

pub struct InserterContext<'a> {
    pub state: &'a mut InserterState,
    pub source: Source<'a>,
    pub sink: Sink<'a>,
    pub tick: Ticks,
    pub log: &'a mut dyn LogSink,
}

impl InserterContext<'_> {
    fn sink_blocked(&self) -> bool {
        self.state
            .held
            .is_some_and(|held| self.sink.is_blocked_for(held.item))
    }
}

impl ModeContext<InserterMode> for InserterContext<'_> {
    fn tick(&self) -> Ticks {
        self.tick
    }

    fn set_status(&mut self, status: InserterMode) {
        self.state.status = status;
    }

    fn logger(&mut self) -> &mut dyn LogSink {
        &mut *self.log
    }
}

// ---------------------------------------------------------------------------
// Mode bodies
// ---------------------------------------------------------------------------

impl Mode for InserterMode {
    type Context<'a> = InserterContext<'a>;

    fn on_enter(self, ctx: &mut InserterContext<'_>) {
        if self == InserterMode::Swing {
            ctx.state.swing_progress = 0;
        }
    }

    fn execute_for_tick(self, ctx: &mut InserterContext<'_>) -> Result<(), SimError> {
        match self {
            InserterMode::Pickup => pick_up(ctx),
            InserterMode::Swing => {
                ctx.state.swing_progress = ctx.state.swing_progress.saturating_add(1);
                Ok(())
            }
            InserterMode::DropOff => drop_off(ctx),
            InserterMode::Idle | InserterMode::Disabled | InserterMode::TargetFull => Ok(()),
        }
    }
}

fn pick_up(ctx: &mut InserterContext<'_>) -> Result<(), SimError> {
    let Some(item) = ctx.state.pickable_item(&ctx.source) else {
        return Ok(());
    };
    let held = ctx.state.held_quantity();
    let room = ctx.state.stack_size.saturating_sub(held);
    let take = u64::from(room).min(ctx.source.inventory.quantity(item));
    if take == 0 {
        return Ok(());
    }

    ctx.source.inventory.remove_quantity(item, take)?;
    ctx.state.inventory.add_quantity(item, take)?;
    // `take <= room`, which is a u32.
    let quantity = held + take as u32;
    ctx.state.held = Some(HeldItem { item, quantity });
    Ok(())
}

fn drop_off(ctx: &mut InserterContext<'_>) -> Result<(), SimError> {
    let entity = ctx.state.id;
    let held = ctx.state.held.ok_or(SimError::NoHeldItem { entity })?;

    match ctx.sink.kind {
        SinkKind::Belt => {
            let per_tick = ctx.state.belt_drop_per_tick;
            if held.quantity == 0 {
                return Err(SimError::HeldQuantityUnderflow {
                    entity,
                    held: 0,
                    requested: per_tick,
                });
            }
            // The last drop of a stack may be smaller than the belt rate.
            let drop = per_tick.min(held.quantity);
            let remaining = held
                .quantity
                .checked_sub(drop)
                .ok_or(SimError::HeldQuantityUnderflow {
                    entity,
                    held: held.quantity,
                    requested: drop,
                })?;
            ctx.state.inventory.remove_quantity(held.item, u64::from(drop))?;
            ctx.sink.inventory.add_quantity(held.item, u64::from(drop))?;
            ctx.state.held = (remaining > 0).then_some(HeldItem {
                item: held.item,
                quantity: remaining,
            });
        }
        SinkKind::Machine => {
            let quantity = u64::from(held.quantity);
            ctx.sink.inventory.add_quantity(held.item, quantity)?;
            ctx.state.inventory.remove_quantity(held.item, quantity)?;
            ctx.state.held = None;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Transition policy for an inserter while it is in `from`.
#[derive(Debug, Clone, Copy)]
pub struct InserterTransitions {
    from: InserterMode,
}

impl InserterTransitions {
    pub fn from(from: InserterMode) -> Self {
        Self { from }
    }
}

impl TransitionEvaluator<InserterMode> for InserterTransitions {
    fn evaluate(&mut self, ctx: &InserterContext<'_>) -> Option<ModeTransition<InserterMode>> {
        let state = &*ctx.state;
        match self.from {
            InserterMode::Idle if !state.enabled => {
                Some(ModeTransition::to(InserterMode::Disabled, "disabled"))
            }
            InserterMode::Idle => state
                .pickable_item(&ctx.source)
                .map(|_| ModeTransition::to(InserterMode::Pickup, "source has items")),
            InserterMode::Pickup => state
                .is_hand_full()
                .then(|| ModeTransition::to(InserterMode::Swing, "hand full")),
            InserterMode::Swing if state.swing_progress < state.swing_ticks => None,
            InserterMode::Swing if ctx.sink_blocked() => {
                Some(ModeTransition::to(InserterMode::TargetFull, "target full"))
            }
            InserterMode::Swing => Some(ModeTransition::to(InserterMode::DropOff, "swing done")),
            InserterMode::DropOff if state.held.is_none() => {
                Some(ModeTransition::to(InserterMode::Idle, "hand empty"))
            }
            InserterMode::DropOff => ctx
                .sink_blocked()
                .then(|| ModeTransition::to(InserterMode::TargetFull, "target full")),
            InserterMode::TargetFull if state.held.is_none() => {
                Some(ModeTransition::to(InserterMode::Idle, "hand empty"))
            }
            InserterMode::TargetFull => (!ctx.sink_blocked())
                .then(|| ModeTransition::to(InserterMode::DropOff, "target has room")),
            InserterMode::Disabled => state
                .enabled
                .then(|| ModeTransition::to(InserterMode::Idle, "enabled")),
        }
    }
}

/// Hand-change callback: `(previous, current)`.
pub type HandCallback = Box<dyn FnMut(Option<HeldItem>, Option<HeldItem>)>;

/// The standard inserter graph, with an optional hand-change observer.
pub fn inserter_state_machine(
    initial: InserterMode,
    on_hand_change: Option<HandCallback>,
) -> Result<ModeStateMachine<InserterMode>, SimError> {
    let mut builder = ModeStateMachine::builder(initial);
    for mode in InserterMode::ALL {
        builder = builder.evaluator(mode, InserterTransitions::from(mode));
    }
    builder = builder.plugin(StatusMirrorPlugin);
    if let Some(callback) = on_hand_change {
        builder = builder.plugin(HandContentsPlugin::new(callback));
    }
    builder.build()
}
