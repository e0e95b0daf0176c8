//! Observers attached to a [`ModeStateMachine`](crate::fsm::ModeStateMachine).
//!
//! Plugins see every transition and every tick of one entity but never pick
//! transitions themselves. They run after the mode body, in registration
//! order.

use crate::event::CraftEvent;
use crate::fsm::{Mode, ModeContext, ModeTransition, Plugin};
use crate::inserter::{HandCallback, HeldItem, InserterContext, InserterMode};
use crate::machine::{MachineContext, MachineMode};
use crate::rational::Ticks;
use std::fmt;

// ---------------------------------------------------------------------------
// Status mirror
// ---------------------------------------------------------------------------

/// Copies the new mode onto the entity's visible `status` on every
/// transition. Works for every mode kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusMirrorPlugin;

impl<M: Mode> Plugin<M> for StatusMirrorPlugin {
    fn on_transition(&mut self, _from: M, transition: &ModeTransition<M>, ctx: &mut M::Context<'_>) {
        ctx.set_status(transition.to);
    }
}

// ---------------------------------------------------------------------------
// Hand contents
// ---------------------------------------------------------------------------

/// Reports changes to an inserter's hand once per tick.
///
/// The comparison uses a copy of last tick's hand, so the callback sees
/// `(previous, current)` exactly once per change, whether the item or only
/// the quantity changed.
pub struct HandContentsPlugin {
    previous: Option<HeldItem>,
    callback: HandCallback,
}

impl HandContentsPlugin {
    pub fn new(callback: HandCallback) -> Self {
        Self {
            previous: None,
            callback,
        }
    }
}

impl fmt::Debug for HandContentsPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandContentsPlugin")
            .field("previous", &self.previous)
            .field("callback", &"<fn>")
            .finish()
    }
}

impl Plugin<InserterMode> for HandContentsPlugin {
    fn execute_for_tick(&mut self, ctx: &mut InserterContext<'_>) {
        let current = ctx.state.held;
        if current != self.previous {
            (self.callback)(self.previous, current);
        }
        self.previous = current;
    }
}

// ---------------------------------------------------------------------------
// Craft events
// ---------------------------------------------------------------------------

/// Emits one [`CraftEvent`] per unit increase of a machine's `craft_count`.
#[derive(Debug, Clone, Default)]
pub struct CraftEventPlugin {
    /// Crafts already reported.
    watermark: u64,
    /// First tick of the craft cycle in progress.
    cycle_start: Ticks,
}

impl CraftEventPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }
}

impl Plugin<MachineMode> for CraftEventPlugin {
    fn on_transition(
        &mut self,
        _from: MachineMode,
        transition: &ModeTransition<MachineMode>,
        ctx: &mut MachineContext<'_>,
    ) {
        if transition.to == MachineMode::Working {
            self.cycle_start = ctx.tick;
        }
    }

    fn execute_for_tick(&mut self, ctx: &mut MachineContext<'_>) {
        let count = ctx.state.craft_count;
        if count <= self.watermark {
            return;
        }
        for craft_index in self.watermark..count {
            // Extra crafts finishing on the same tick span only that tick.
            let start = if craft_index == self.watermark {
                self.cycle_start
            } else {
                ctx.tick
            };
            ctx.events.push(CraftEvent {
                machine: ctx.state.id,
                craft_index,
                start,
                end: ctx.tick + 1,
                total_crafted: ctx.state.total_crafted,
            });
        }
        self.watermark = count;
        self.cycle_start = ctx.tick + 1;
    }
}
