//! Headless run of a small gear line.
//!
//! Ore drill -> inserter -> belt, plus a plate belt -> inserter ->
//! assembler -> inserter -> belt gear line, simulated for one minute of
//! game time. Prints per-entity state and the craft event timeline.
//!
//! Run with: `RUST_LOG=clocksim=debug cargo run -p clocksim-core --example headless_clock`

use clocksim_core::config::SimConfig;
use clocksim_core::rational::{int, ratio, to_fixed64};
use clocksim_core::registry::{RecipeEntry, RegistryBuilder};
use clocksim_core::sim::{InserterSpec, Simulation};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // --- Static metadata ---
    let mut b = RegistryBuilder::new();
    let ore = b.register_resource("iron-ore", 50, int(1));
    let plate = b.register_item("iron-plate", 100);
    let gear = b.register_item("iron-gear-wheel", 100);
    b.register_recipe(
        "iron-gear-wheel",
        ratio(1, 2),
        vec![RecipeEntry::new(plate, int(2))],
        vec![RecipeEntry::new(gear, int(1))],
    );
    b.register_machine("assembling-machine-1", ratio(1, 2), int(0));
    b.register_drill("electric-mining-drill", ratio(1, 2), int(0));
    let registry = b.build()?;

    // --- Entities ---
    let mut sim = Simulation::new(SimConfig::default().with_tick_budget(3_600))?;
    let drill = sim.add_drill_from_registry(&registry, "electric-mining-drill", "iron-ore")?;
    let ore_belt = sim.add_belt();
    sim.add_inserter(drill, ore_belt, InserterSpec::new())?;

    let plates = sim.add_belt();
    let assembler =
        sim.add_machine_from_registry(&registry, "iron-gear-wheel", "assembling-machine-1")?;
    let gears = sim.add_belt();
    sim.add_inserter(plates, assembler, InserterSpec::new().stack_size(4).swing_ticks(20))?;
    sim.add_inserter(
        assembler,
        gears,
        InserterSpec::new().filter(gear).swing_ticks(20),
    )?;
    sim.seed_items(plates, plate, 400)?;

    // --- Run ---
    sim.run_budget()?;

    let machine = sim.machine(assembler)?;
    println!(
        "assembler: {:?}, {} crafts, rate {}, progress {} (~{})",
        machine.status,
        machine.craft_count,
        machine.rates.crafting,
        machine.crafting_progress,
        to_fixed64(&machine.crafting_progress),
    );
    println!(
        "drill: {:?}, {} mined, {} ore on belt",
        sim.drill(drill)?.status,
        sim.drill(drill)?.mined_count,
        sim.belt(ore_belt)?.inventory.quantity(ore),
    );
    println!("gears delivered: {}", sim.belt(gears)?.inventory.quantity(gear));

    for event in sim.craft_events().iter().take(5) {
        println!(
            "  craft #{} on ticks [{}, {})",
            event.craft_index, event.start, event.end
        );
    }

    let bytes = sim.snapshot().encode()?;
    println!(
        "snapshot: {} bytes, state hash {:016x}",
        bytes.len(),
        sim.state_hash().finish()
    );
    Ok(())
}
