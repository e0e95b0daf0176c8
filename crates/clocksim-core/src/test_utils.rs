//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`. Item IDs match
//! the registration order of [`test_registry`].

use crate::id::{EntityId, ItemTypeId};
use crate::rate::MachineRates;
use crate::rational::{Ratio, int, ratio};
use crate::registry::{RecipeEntry, Registry, RegistryBuilder};
use slotmap::SlotMap;

// ===========================================================================
// Item constructors
// ===========================================================================

pub fn iron_ore() -> ItemTypeId {
    ItemTypeId(0)
}
pub fn iron_plate() -> ItemTypeId {
    ItemTypeId(1)
}
pub fn gear() -> ItemTypeId {
    ItemTypeId(2)
}
pub fn copper_plate() -> ItemTypeId {
    ItemTypeId(3)
}
pub fn copper_cable() -> ItemTypeId {
    ItemTypeId(4)
}

/// A valid entity key, for states built outside a simulation.
pub fn test_entity() -> EntityId {
    let mut keys: SlotMap<EntityId, ()> = SlotMap::with_key();
    keys.insert(())
}

// ===========================================================================
// Rates
// ===========================================================================

/// 2 iron plates -> 1 gear, 1 s of work, no productivity.
pub fn gear_rates(crafting_speed: Ratio) -> MachineRates {
    MachineRates::from_parts(
        &int(1),
        &crafting_speed,
        &int(0),
        vec![(iron_plate(), int(2))],
        vec![(gear(), int(1))],
    )
    .unwrap()
}

/// 1 copper plate -> 2 cables, 1/2 s of work.
pub fn cable_rates(crafting_speed: Ratio, productivity: Ratio) -> MachineRates {
    MachineRates::from_parts(
        &ratio(1, 2),
        &crafting_speed,
        &productivity,
        vec![(copper_plate(), int(1))],
        vec![(copper_cable(), int(2))],
    )
    .unwrap()
}

// ===========================================================================
// Registry
// ===========================================================================

/// A small vanilla-like registry: iron and copper chains, three
/// assemblers and one drill.
pub fn test_registry() -> Registry {
    let mut b = RegistryBuilder::new();
    let ore = b.register_resource("iron-ore", 50, int(1));
    let plate = b.register_item("iron-plate", 100);
    let gear = b.register_item("iron-gear-wheel", 100);
    let copper = b.register_item("copper-plate", 100);
    let cable = b.register_item("copper-cable", 200);

    b.register_recipe(
        "iron-plate",
        ratio(16, 5),
        vec![RecipeEntry::new(ore, int(1))],
        vec![RecipeEntry::new(plate, int(1))],
    );
    b.register_recipe(
        "iron-gear-wheel",
        ratio(1, 2),
        vec![RecipeEntry::new(plate, int(2))],
        vec![RecipeEntry::new(gear, int(1))],
    );
    b.register_recipe(
        "copper-cable",
        ratio(1, 2),
        vec![RecipeEntry::new(copper, int(1))],
        vec![RecipeEntry::new(cable, int(2))],
    );

    b.register_machine("assembling-machine-1", ratio(1, 2), int(0));
    b.register_machine("assembling-machine-2", ratio(3, 4), int(0));
    b.register_machine("assembling-machine-3", ratio(5, 4), ratio(1, 10));
    b.register_drill("electric-mining-drill", ratio(1, 2), int(0));

    b.build().unwrap()
}
