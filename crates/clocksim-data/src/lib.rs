//! Data-source adapter for `clocksim-core`.
//!
//! Reads item, recipe, machine and drill metadata plus the run's
//! [`SimConfig`](clocksim_core::config::SimConfig) from a directory of RON,
//! TOML or JSON files and resolves names into core IDs.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GameData, load_game_data};
