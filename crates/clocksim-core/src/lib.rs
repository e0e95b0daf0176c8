//! Clocksim Core -- deterministic tick simulation of factory production lines.
//!
//! Crafting machines, inserters and mining drills are each driven by a
//! generic mode state machine and advanced one tick at a time. All rate
//! arithmetic is exact: progress accumulators are arbitrary-precision
//! rationals, so a craft that takes 200/3 ticks never drifts, no matter how
//! long the run.
//!
//! # Tick order
//!
//! Each call to [`sim::Simulation::step`] visits every scheduled entity once,
//! in the caller-supplied order. For one entity:
//!
//! 1. The current mode's evaluator may pick a transition; if so, plugin and
//!    lifecycle hooks fire in a fixed order.
//! 2. The (possibly new) mode's body runs.
//! 3. Plugins observe the tick (status mirroring, craft events, hand
//!    changes).
//!
//! # Key Types
//!
//! - [`fsm::ModeStateMachine`] -- the generic engine, with
//!   [`fsm::TransitionEvaluator`] and [`fsm::Plugin`] seams.
//! - [`machine::MachineMode`], [`inserter::InserterMode`],
//!   [`drill::DrillMode`] -- the concrete mode sets.
//! - [`rate::CraftingRate`] and [`rate::BonusProductivityRate`] -- exact
//!   cadences derived from static metadata in [`registry::Registry`].
//! - [`inventory::InventoryState`] -- per-entity item counts.
//! - [`event::CraftEventLog`] -- time-ordered craft records.
//! - [`snapshot::SimSnapshot`] -- versioned binary snapshot via bitcode.

pub mod config;
pub mod drill;
pub mod entity;
pub mod error;
pub mod event;
pub mod fsm;
pub mod id;
pub mod inserter;
pub mod inventory;
pub mod log;
pub mod machine;
pub mod plugin;
pub mod rate;
pub mod rational;
pub mod registry;
pub mod sim;
pub mod snapshot;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
