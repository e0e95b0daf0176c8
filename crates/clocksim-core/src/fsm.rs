//! Generic mode state machine.
//!
//! One [`ModeStateMachine`] drives one entity. Its three concerns are kept
//! apart:
//!
//! - **Modes** ([`Mode`]) -- what the entity does while a mode is active.
//!   Mode sets are closed enums; the enum value doubles as the status tag
//!   reported to observers and as the key into the transition graph.
//! - **Evaluators** ([`TransitionEvaluator`]) -- when to leave a mode. Every
//!   mode reachable at runtime has exactly one.
//! - **Plugins** ([`Plugin`]) -- side effects observing transitions and ticks.
//!
//! # Tick order
//!
//! [`ModeStateMachine::execute_for_tick`]:
//!
//! 1. Ask the current mode's evaluator for a transition.
//! 2. If it names a different mode: plugin `on_transition` hooks (in
//!    registration order), outgoing mode `on_exit`, outgoing evaluator
//!    `on_exit`, incoming mode `on_enter`, incoming evaluator `on_enter`.
//! 3. Run the (possibly new) current mode's body.
//! 4. Run every plugin's `execute_for_tick`, in registration order.
//!
//! A transition to the current mode is a no-op and fires no hooks.

use crate::error::SimError;
use crate::log::{LogLevel, LogSink};
use crate::rational::Ticks;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Per-tick view the engine and generic plugins need from any entity context.
pub trait ModeContext<M> {
    fn tick(&self) -> Ticks;
    /// Mirror a mode onto the entity's externally visible status.
    fn set_status(&mut self, status: M);
    fn logger(&mut self) -> &mut dyn LogSink;
}

/// A behavioural state of one entity kind.
///
/// `Context<'a>` borrows everything the mode may touch during a single tick:
/// the entity's own state and, for inserters, the source and sink
/// inventories. Nothing outlives the tick.
pub trait Mode: Copy + Ord + fmt::Debug + 'static {
    type Context<'a>: ModeContext<Self>;

    fn on_enter(self, ctx: &mut Self::Context<'_>) {
        let _ = ctx;
    }

    fn on_exit(self, ctx: &mut Self::Context<'_>) {
        let _ = ctx;
    }

    fn execute_for_tick(self, ctx: &mut Self::Context<'_>) -> Result<(), SimError>;
}

/// A requested move to another mode. `reason` is for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTransition<M> {
    pub to: M,
    pub reason: Cow<'static, str>,
}

impl<M> ModeTransition<M> {
    pub fn to(mode: M, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            to: mode,
            reason: reason.into(),
        }
    }
}

/// Decides, once per tick, whether the active mode should change.
pub trait TransitionEvaluator<M: Mode>: fmt::Debug {
    /// `None` means stay in the current mode.
    fn evaluate(&mut self, ctx: &M::Context<'_>) -> Option<ModeTransition<M>>;

    fn on_enter(&mut self, ctx: &mut M::Context<'_>) {
        let _ = ctx;
    }

    fn on_exit(&mut self, ctx: &mut M::Context<'_>) {
        let _ = ctx;
    }
}

/// Side-effect observer attached to a state machine. Both hooks default to
/// no-ops so a plugin only implements what it reacts to.
pub trait Plugin<M: Mode>: fmt::Debug {
    fn on_transition(&mut self, from: M, transition: &ModeTransition<M>, ctx: &mut M::Context<'_>) {
        let _ = (from, transition, ctx);
    }

    fn execute_for_tick(&mut self, ctx: &mut M::Context<'_>) {
        let _ = ctx;
    }
}

// ---------------------------------------------------------------------------
// ModeStateMachine
// ---------------------------------------------------------------------------

/// Runtime for one entity's transition graph.
pub struct ModeStateMachine<M: Mode> {
    current: M,
    evaluators: BTreeMap<M, Box<dyn TransitionEvaluator<M>>>,
    plugins: Vec<Box<dyn Plugin<M>>>,
    transitions: u64,
}

impl<M: Mode> fmt::Debug for ModeStateMachine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeStateMachine")
            .field("current", &self.current)
            .field("modes", &self.evaluators.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins)
            .field("transitions", &self.transitions)
            .finish()
    }
}

impl<M: Mode> ModeStateMachine<M> {
    pub fn builder(initial: M) -> ModeStateMachineBuilder<M> {
        ModeStateMachineBuilder {
            initial,
            evaluators: BTreeMap::new(),
            plugins: Vec::new(),
        }
    }

    /// The active mode.
    pub fn current(&self) -> M {
        self.current
    }

    /// Number of transitions applied so far.
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// Modes with a registered evaluator, in key order.
    pub fn modes(&self) -> impl Iterator<Item = M> + '_ {
        self.evaluators.keys().copied()
    }

    /// Advance this entity by one tick.
    pub fn execute_for_tick(&mut self, ctx: &mut M::Context<'_>) -> Result<(), SimError> {
        let current = self.current;
        let transition = self.evaluator_mut(current)?.evaluate(ctx);
        if let Some(transition) = transition {
            self.apply(transition, ctx)?;
        }

        self.current.execute_for_tick(ctx)?;

        for plugin in &mut self.plugins {
            plugin.execute_for_tick(ctx);
        }
        Ok(())
    }

    /// Switch to `mode` without consulting the evaluator. Runs the same hook
    /// sequence as an evaluated transition; forcing the current mode is a
    /// no-op.
    pub fn force_transition_to(&mut self, mode: M, ctx: &mut M::Context<'_>) -> Result<(), SimError> {
        self.apply(ModeTransition::to(mode, "forced"), ctx)
    }

    fn apply(&mut self, transition: ModeTransition<M>, ctx: &mut M::Context<'_>) -> Result<(), SimError> {
        let from = self.current;
        let to = transition.to;
        if to == from {
            return Ok(());
        }
        if !self.evaluators.contains_key(&to) {
            return Err(missing_evaluator(to));
        }

        let line = format!("tick {}: {from:?} -> {to:?} ({})", ctx.tick(), transition.reason);
        ctx.logger().log(LogLevel::Debug, &line);

        for plugin in &mut self.plugins {
            plugin.on_transition(from, &transition, ctx);
        }
        from.on_exit(ctx);
        self.evaluator_mut(from)?.on_exit(ctx);

        self.current = to;
        self.transitions += 1;

        to.on_enter(ctx);
        self.evaluator_mut(to)?.on_enter(ctx);
        Ok(())
    }

    fn evaluator_mut(&mut self, mode: M) -> Result<&mut Box<dyn TransitionEvaluator<M>>, SimError> {
        self.evaluators
            .get_mut(&mode)
            .ok_or_else(|| missing_evaluator(mode))
    }
}

fn missing_evaluator<M: fmt::Debug>(mode: M) -> SimError {
    SimError::MissingEvaluator {
        mode: format!("{mode:?}"),
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects the transition graph and plugins for a [`ModeStateMachine`].
pub struct ModeStateMachineBuilder<M: Mode> {
    initial: M,
    evaluators: BTreeMap<M, Box<dyn TransitionEvaluator<M>>>,
    plugins: Vec<Box<dyn Plugin<M>>>,
}

impl<M: Mode> ModeStateMachineBuilder<M> {
    /// Register the evaluator consulted while `mode` is active. A second
    /// registration for the same mode replaces the first.
    pub fn evaluator(mut self, mode: M, evaluator: impl TransitionEvaluator<M> + 'static) -> Self {
        self.evaluators.insert(mode, Box::new(evaluator));
        self
    }

    /// Append a plugin. Plugins run in registration order.
    pub fn plugin(mut self, plugin: impl Plugin<M> + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn boxed_plugin(mut self, plugin: Box<dyn Plugin<M>>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Fails if the initial mode has no evaluator. No hooks run at
    /// construction: the entity state must already reflect `initial`.
    pub fn build(self) -> Result<ModeStateMachine<M>, SimError> {
        if !self.evaluators.contains_key(&self.initial) {
            return Err(missing_evaluator(self.initial));
        }
        Ok(ModeStateMachine {
            current: self.initial,
            evaluators: self.evaluators,
            plugins: self.plugins,
            transitions: 0,
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
