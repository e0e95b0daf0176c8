//! Craft event recording.
//!
//! [`CraftEventPlugin`](crate::plugin::CraftEventPlugin) appends one
//! [`CraftEvent`] per completed craft to the simulation's [`CraftEventLog`].
//! The log is append-only and ordered by occurrence: entities are stepped in
//! a fixed order, so two runs of the same setup produce identical logs.
//!
//! Passive listeners registered with [`CraftEventLog::subscribe`] see each
//! event as it is pushed. They are read-only and cannot affect the run.

use crate::id::EntityId;
use crate::rational::Ticks;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One completed craft of one machine.
///
/// The event names the machine rather than holding its state. Consumers read
/// the live state through [`Simulation::machine`](crate::sim::Simulation::machine)
/// with `event.machine`; `total_crafted` keeps the one counter that changes
/// after the craft completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CraftEvent {
    pub machine: EntityId,
    /// Zero-based, per machine.
    pub craft_index: u64,
    /// First tick of the craft cycle.
    pub start: Ticks,
    /// Exclusive: the completion tick plus one.
    pub end: Ticks,
    /// The machine's `total_crafted` after the completing tick.
    pub total_crafted: u64,
}

impl CraftEvent {
    /// The half-open tick interval `[start, end)`.
    pub fn ticks(&self) -> Range<Ticks> {
        self.start..self.end
    }

    /// Tick on which the craft completed.
    pub fn completed_at(&self) -> Ticks {
        self.end.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type CraftListener = Box<dyn FnMut(&CraftEvent)>;

/// Time-ordered record of every craft in a run.
#[derive(Default)]
pub struct CraftEventLog {
    events: Vec<CraftEvent>,
    listeners: Vec<CraftListener>,
    /// Events handed out by `drain` so far.
    drained: u64,
}

impl fmt::Debug for CraftEventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CraftEventLog")
            .field("events", &self.events.len())
            .field("listeners", &self.listeners.len())
            .field("drained", &self.drained)
            .finish()
    }
}

impl CraftEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and notify listeners in registration order.
    pub fn push(&mut self, event: CraftEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
        self.events.push(event);
    }

    /// Register a passive listener. It sees only events pushed afterwards.
    pub fn subscribe(&mut self, listener: CraftListener) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total events ever pushed, including drained ones.
    pub fn total_recorded(&self) -> u64 {
        self.drained + self.events.len() as u64
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &CraftEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[CraftEvent] {
        &self.events
    }

    pub fn for_machine(&self, machine: EntityId) -> impl Iterator<Item = &CraftEvent> {
        self.events.iter().filter(move |e| e.machine == machine)
    }

    /// Crafts that completed within `[start, end)`.
    pub fn crafts_between(&self, start: Ticks, end: Ticks) -> impl Iterator<Item = &CraftEvent> {
        self.events
            .iter()
            .filter(move |e| (start..end).contains(&e.completed_at()))
    }

    /// Take every buffered event, oldest first. Listeners are kept.
    pub fn drain(&mut self) -> Vec<CraftEvent> {
        let events = std::mem::take(&mut self.events);
        self.drained += events.len() as u64;
        events
    }
}
