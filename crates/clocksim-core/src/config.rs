//! Run configuration.

use crate::error::SimError;
use crate::inserter::DEFAULT_BELT_DROP_PER_TICK;
use crate::rational::Ticks;
use serde::{Deserialize, Serialize};

/// Ticks in one minute of game time.
pub const DEFAULT_TICK_BUDGET: Ticks = 3_600;

/// Knobs for one simulation run. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks executed by [`Simulation::run_budget`](crate::sim::Simulation::run_budget).
    pub tick_budget: Ticks,
    /// Attach a craft-event recorder to every machine.
    pub record_craft_events: bool,
    /// Units a belt accepts from an inserter per tick.
    pub belt_drop_per_tick: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_budget: DEFAULT_TICK_BUDGET,
            record_craft_events: true,
            belt_drop_per_tick: DEFAULT_BELT_DROP_PER_TICK,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.tick_budget == 0 {
            return Err(SimError::InvalidConfig("tick_budget must be positive".to_string()));
        }
        if self.belt_drop_per_tick == 0 {
            return Err(SimError::InvalidConfig(
                "belt_drop_per_tick must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_tick_budget(mut self, ticks: Ticks) -> Self {
        self.tick_budget = ticks;
        self
    }

    pub fn without_craft_events(mut self) -> Self {
        self.record_craft_events = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        assert_eq!(config.belt_drop_per_tick, 4);
        assert!(config.record_craft_events);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_budget_or_belt_rate_rejected() {
        let err = SimConfig::default().with_tick_budget(0).validate().unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));

        let config = SimConfig {
            belt_drop_per_tick: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
