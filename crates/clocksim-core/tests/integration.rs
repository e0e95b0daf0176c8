//! End-to-end runs of small production lines.

use clocksim_core::config::SimConfig;
use clocksim_core::drill::DrillMode;
use clocksim_core::id::EntityId;
use clocksim_core::inserter::{HeldItem, InserterMode};
use clocksim_core::machine::MachineMode;
use clocksim_core::rate::MachineRates;
use clocksim_core::rational::{int, ratio};
use clocksim_core::sim::{InserterSpec, Simulation};
use clocksim_core::test_utils::*;
use num_traits::Zero;
use std::cell::RefCell;
use std::rc::Rc;

fn sim() -> Simulation {
    Simulation::new(SimConfig::default()).unwrap()
}

/// belt(plates) -> inserter -> gear machine -> inserter -> belt
struct GearLine {
    sim: Simulation,
    input: EntityId,
    machine: EntityId,
    feeder: EntityId,
    unloader: EntityId,
    output: EntityId,
}

fn gear_line(plates: u64) -> GearLine {
    let mut sim = sim();
    let input = sim.add_belt();
    let machine = sim.add_machine("iron-gear-wheel", gear_rates(ratio(9, 10))).unwrap();
    let output = sim.add_belt();
    let feeder = sim
        .add_inserter(input, machine, InserterSpec::new().stack_size(4).swing_ticks(5))
        .unwrap();
    let unloader = sim
        .add_inserter(
            machine,
            output,
            InserterSpec::new().stack_size(2).swing_ticks(5),
        )
        .unwrap();
    sim.seed_items(input, iron_plate(), plates).unwrap();
    GearLine {
        sim,
        input,
        machine,
        feeder,
        unloader,
        output,
    }
}

// ---------------------------------------------------------------------------
// Exact arithmetic over long runs
// ---------------------------------------------------------------------------

#[test]
fn ten_thousand_ticks_of_recurring_rate_are_exact() {
    let mut sim = sim();
    // 1 s recipe at speed 0.9: 200/3 ticks per craft.
    let m = sim.add_machine("iron-gear-wheel", gear_rates(ratio(9, 10))).unwrap();
    sim.seed_items(m, iron_plate(), 1_000_000).unwrap();

    sim.run(10_000).unwrap();

    let state = sim.machine(m).unwrap();
    assert_eq!(state.rates.crafting.ticks_per_craft, ratio(200, 3));
    assert_eq!(state.craft_count, 150);
    assert!(state.crafting_progress.is_zero());
    // Consumed exactly amount_per_craft * craft_count.
    assert_eq!(state.inventory.quantity(iron_plate()), 1_000_000 - 2 * 150);
    assert_eq!(state.inventory.quantity(gear()), 150);
    assert_eq!(state.total_crafted, 150);
}

#[test]
fn craft_events_end_on_exact_ceilings() {
    let mut sim = sim();
    let m = sim.add_machine("iron-gear-wheel", gear_rates(ratio(9, 10))).unwrap();
    sim.seed_items(m, iron_plate(), 1_000_000).unwrap();
    sim.run(10_000).unwrap();

    let events: Vec<_> = sim.craft_events().for_machine(m).cloned().collect();
    assert_eq!(events.len(), 150);
    let mut previous_end = 0;
    for (k, event) in events.iter().enumerate() {
        let k = k as u64;
        assert_eq!(event.craft_index, k);
        assert_eq!(event.start, previous_end);
        // Craft k completes once (t + 1) * 3/200 >= k + 1.
        assert_eq!(event.end, ((k + 1) * 200).div_ceil(3));
        assert_eq!(event.total_crafted, k + 1);
        previous_end = event.end;
    }
}

#[test]
fn two_crafts_per_tick() {
    let mut sim = sim();
    // 1/2 s at speed 60: half a tick per craft.
    let m = sim.add_machine("copper-cable", cable_rates(int(60), int(0))).unwrap();
    sim.seed_items(m, copper_plate(), 100).unwrap();

    sim.run(10).unwrap();

    let state = sim.machine(m).unwrap();
    assert_eq!(state.craft_count, 20);
    assert_eq!(state.inventory.quantity(copper_plate()), 80);
    assert_eq!(state.inventory.quantity(copper_cable()), 40);
    assert_eq!(sim.craft_events().len(), 20);
}

#[test]
fn productivity_bonus_from_registry_metadata() {
    let registry = test_registry();
    let rates = MachineRates::for_recipe(
        registry.recipe("copper-cable").unwrap(),
        registry.machine("assembling-machine-3").unwrap(),
    )
    .unwrap();
    // 1/2 s at speed 5/4: 24 ticks per craft; +10% is one bonus per 240 ticks.
    assert_eq!(rates.crafting.ticks_per_craft, int(24));
    assert_eq!(rates.bonus.bonus_crafts_per_tick, ratio(1, 240));

    let mut sim = sim();
    let m = sim.add_machine("copper-cable", rates).unwrap();
    sim.seed_items(m, copper_plate(), 1_000).unwrap();
    sim.run(2_400).unwrap();

    let state = sim.machine(m).unwrap();
    assert_eq!(state.craft_count, 100);
    assert_eq!(state.inventory.quantity(copper_plate()), 900);
    assert_eq!(state.inventory.quantity(copper_cable()), 220);
    assert_eq!(state.total_crafted, 220);
}

#[test]
fn machine_without_ingredients_never_accumulates() {
    let mut sim = sim();
    let m = sim.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    for _ in 0..100 {
        sim.step().unwrap();
        let state = sim.machine(m).unwrap();
        assert!(state.crafting_progress.is_zero());
        assert!(state.bonus_progress.is_zero());
    }
    let state = sim.machine(m).unwrap();
    assert_eq!(state.status, MachineMode::IngredientShortage);
    assert_eq!(state.craft_count, 0);
}

#[test]
fn output_full_stops_and_resumes() {
    let registry = test_registry();
    let mut sim = sim();
    // 40 ticks per craft; output capped at one stack of 100 gears.
    let m = sim
        .add_machine_from_registry(&registry, "iron-gear-wheel", "assembling-machine-2")
        .unwrap();
    sim.seed_items(m, iron_plate(), 1_000).unwrap();
    sim.run(4_000).unwrap();

    let state = sim.machine(m).unwrap();
    assert_eq!(state.craft_count, 100);
    assert_eq!(state.status, MachineMode::Working);

    // The blockage is seen on the next evaluation.
    sim.step().unwrap();
    assert_eq!(sim.machine(m).unwrap().status, MachineMode::OutputFull);
    sim.run(1_000).unwrap();
    assert_eq!(sim.machine(m).unwrap().craft_count, 100);
}

// ---------------------------------------------------------------------------
// Inserters
// ---------------------------------------------------------------------------

#[test]
fn belt_drop_is_four_per_tick() {
    let mut sim = sim();
    let m = sim.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    let belt = sim.add_belt();
    let ins = sim
        .add_inserter(m, belt, InserterSpec::new().stack_size(10).filter(gear()))
        .unwrap();
    sim.seed_items(m, gear(), 10).unwrap();

    // Pickup, swing, then drops of 4, 4 and 2.
    sim.run(3).unwrap();
    assert_eq!(sim.inserter(ins).unwrap().held_quantity(), 6);
    sim.step().unwrap();
    assert_eq!(sim.inserter(ins).unwrap().held_quantity(), 2);
    assert_eq!(sim.belt(belt).unwrap().inventory.quantity(gear()), 8);
    sim.step().unwrap();
    assert_eq!(sim.inserter(ins).unwrap().held, None);
    assert_eq!(sim.belt(belt).unwrap().inventory.quantity(gear()), 10);
    sim.step().unwrap();
    assert_eq!(sim.inserter(ins).unwrap().status, InserterMode::Idle);
}

#[test]
fn unfiltered_unloader_takes_only_products() {
    let mut sim = sim();
    let m = sim.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    let belt = sim.add_belt();
    let ins = sim
        .add_inserter(m, belt, InserterSpec::new().stack_size(4))
        .unwrap();
    sim.seed_items(m, iron_plate(), 100).unwrap();

    sim.run(600).unwrap();

    let machine = sim.machine(m).unwrap();
    let unloader = sim.inserter(ins).unwrap();
    let output = &sim.belt(belt).unwrap().inventory;
    assert_eq!(machine.craft_count, 10);
    assert_eq!(output.quantity(iron_plate()), 0);
    assert!(output.quantity(gear()) >= 4);
    assert_ne!(unloader.held.map(|held| held.item), Some(iron_plate()));
    assert_eq!(machine.inventory.quantity(iron_plate()), 100 - 2 * 10);
    assert_eq!(
        output.quantity(gear())
            + u64::from(unloader.held_quantity())
            + machine.inventory.quantity(gear()),
        10
    );
}

#[test]
fn machine_drop_takes_whole_stack() {
    let mut sim = sim();
    let belt = sim.add_belt();
    let m = sim.add_machine("iron-gear-wheel", gear_rates(ratio(1, 100))).unwrap();
    let ins = sim
        .add_inserter(belt, m, InserterSpec::new().stack_size(50))
        .unwrap();
    sim.seed_items(belt, iron_plate(), 50).unwrap();

    sim.run(3).unwrap();

    assert_eq!(sim.inserter(ins).unwrap().held, None);
    assert_eq!(sim.machine(m).unwrap().inventory.quantity(iron_plate()), 50);
    assert!(sim.inserter(ins).unwrap().inventory.is_empty());
}

#[test]
fn full_machine_parks_the_inserter() {
    let mut sim = sim();
    let belt = sim.add_belt();
    // 6000 ticks per craft, so nothing is consumed during the test.
    let m = sim.add_machine("iron-gear-wheel", gear_rates(ratio(1, 100))).unwrap();
    let ins = sim
        .add_inserter(belt, m, InserterSpec::new().stack_size(4))
        .unwrap();
    sim.seed_items(belt, iron_plate(), 100).unwrap();
    sim.set_inventory_limit(m, iron_plate(), 4).unwrap();

    sim.run(20).unwrap();

    let inserter = sim.inserter(ins).unwrap();
    assert_eq!(inserter.status, InserterMode::TargetFull);
    assert_eq!(
        inserter.held,
        Some(HeldItem {
            item: iron_plate(),
            quantity: 4
        })
    );
    assert_eq!(sim.machine(m).unwrap().inventory.quantity(iron_plate()), 4);
    assert_eq!(sim.belt(belt).unwrap().inventory.quantity(iron_plate()), 92);
}

#[test]
fn hand_callback_fires_once_per_change() {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let seen = changes.clone();
    let mut sim = sim();
    let m = sim.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    let belt = sim.add_belt();
    sim.add_inserter(
        m,
        belt,
        InserterSpec::new()
            .stack_size(10)
            .filter(gear())
            .on_hand_change(Box::new(move |prev, cur| seen.borrow_mut().push((prev, cur)))),
    )
    .unwrap();
    sim.seed_items(m, gear(), 10).unwrap();

    sim.run(20).unwrap();

    let quantities: Vec<_> = changes
        .borrow()
        .iter()
        .map(|(prev, cur)| (prev.map(|h| h.quantity), cur.map(|h| h.quantity)))
        .collect();
    assert_eq!(
        quantities,
        vec![
            (None, Some(10)),
            (Some(10), Some(6)),
            (Some(6), Some(2)),
            (Some(2), None),
        ]
    );
}

#[test]
fn disabled_inserter_waits() {
    let mut sim = sim();
    let belt = sim.add_belt();
    let m = sim.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    let ins = sim.add_inserter(belt, m, InserterSpec::new()).unwrap();
    sim.seed_items(belt, iron_plate(), 10).unwrap();
    sim.set_inserter_enabled(ins, false).unwrap();

    sim.run(50).unwrap();
    assert_eq!(sim.inserter(ins).unwrap().status, InserterMode::Disabled);
    assert_eq!(sim.belt(belt).unwrap().inventory.quantity(iron_plate()), 10);

    sim.set_inserter_enabled(ins, true).unwrap();
    sim.run(2).unwrap();
    assert_eq!(sim.inserter(ins).unwrap().status, InserterMode::Pickup);
}

#[test]
fn gear_line_conserves_items() {
    let mut line = gear_line(200);
    line.sim.run(6_000).unwrap();

    let sim = &line.sim;
    let machine = sim.machine(line.machine).unwrap();
    let feeder = sim.inserter(line.feeder).unwrap();
    let unloader = sim.inserter(line.unloader).unwrap();
    let plates_left = sim.belt(line.input).unwrap().inventory.quantity(iron_plate())
        + u64::from(feeder.held_quantity())
        + machine.inventory.quantity(iron_plate());
    assert_eq!(plates_left + 2 * machine.craft_count, 200);

    let gears = sim.belt(line.output).unwrap().inventory.quantity(gear())
        + u64::from(unloader.held_quantity())
        + machine.inventory.quantity(gear());
    assert_eq!(gears, machine.craft_count);
    // First plates land on tick 6; crafting starts on tick 7.
    assert_eq!(machine.craft_count, 89);
    assert_eq!(sim.craft_events().len(), 89);
}

// ---------------------------------------------------------------------------
// Drills
// ---------------------------------------------------------------------------

#[test]
fn drill_feeds_a_belt() {
    let registry = test_registry();
    let mut sim = sim();
    let drill = sim
        .add_drill_from_registry(&registry, "electric-mining-drill", "iron-ore")
        .unwrap();
    let belt = sim.add_belt();
    sim.add_inserter(drill, belt, InserterSpec::new()).unwrap();

    // Mining time 1 s at speed 1/2: one ore per 120 ticks.
    sim.run(1_200).unwrap();

    let state = sim.drill(drill).unwrap();
    assert_eq!(state.mined_count, 10);
    let delivered = sim.belt(belt).unwrap().inventory.quantity(iron_ore());
    assert!(delivered >= 9);
    assert!(delivered + state.inventory.quantity(iron_ore()) <= 10);
}

#[test]
fn disabled_drill_keeps_progress() {
    let registry = test_registry();
    let mut sim = sim();
    let drill = sim
        .add_drill_from_registry(&registry, "electric-mining-drill", "iron-ore")
        .unwrap();
    sim.run(60).unwrap();
    let progress = sim.drill(drill).unwrap().mining_progress.clone();
    assert_eq!(progress, ratio(1, 2));

    sim.set_drill_enabled(drill, false).unwrap();
    sim.run(500).unwrap();
    let state = sim.drill(drill).unwrap();
    assert_eq!(state.status, DrillMode::Disabled);
    assert_eq!(state.mining_progress, progress);

    sim.set_drill_enabled(drill, true).unwrap();
    sim.run(60).unwrap();
    assert_eq!(sim.drill(drill).unwrap().mined_count, 1);
}

#[test]
fn drill_stops_at_output_limit() {
    let registry = test_registry();
    let mut sim = sim();
    let drill = sim
        .add_drill_from_registry(&registry, "electric-mining-drill", "iron-ore")
        .unwrap();
    sim.run(120 * 60).unwrap();
    let state = sim.drill(drill).unwrap();
    assert_eq!(state.mined_count, 50);
    assert_eq!(state.status, DrillMode::OutputFull);
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[test]
fn identical_setups_hash_identically() {
    let mut a = gear_line(100);
    let mut b = gear_line(100);
    for _ in 0..50 {
        a.sim.run(37).unwrap();
        b.sim.run(37).unwrap();
        assert_eq!(a.sim.state_hash(), b.sim.state_hash());
    }
}

#[test]
fn run_budget_uses_config() {
    let mut sim = Simulation::new(SimConfig::default().with_tick_budget(250)).unwrap();
    sim.add_belt();
    sim.run_budget().unwrap();
    assert_eq!(sim.tick(), 250);
}

#[test]
fn craft_events_can_be_disabled_and_observed() {
    let mut quiet = Simulation::new(SimConfig::default().without_craft_events()).unwrap();
    let m = quiet.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    quiet.seed_items(m, iron_plate(), 10).unwrap();
    quiet.run(300).unwrap();
    assert_eq!(quiet.machine(m).unwrap().craft_count, 5);
    assert!(quiet.craft_events().is_empty());

    let count = Rc::new(RefCell::new(0));
    let seen = count.clone();
    let mut loud = sim();
    let m = loud.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    loud.seed_items(m, iron_plate(), 10).unwrap();
    loud.craft_events_mut()
        .subscribe(Box::new(move |_| *seen.borrow_mut() += 1));
    loud.run(300).unwrap();
    assert_eq!(*count.borrow(), 5);
    assert_eq!(loud.craft_events_mut().drain().len(), 5);
    assert!(loud.craft_events().is_empty());
}

#[test]
fn unscheduled_entities_do_not_run() {
    let mut sim = sim();
    let a = sim.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    let b = sim.add_machine("iron-gear-wheel", gear_rates(int(1))).unwrap();
    sim.seed_items(a, iron_plate(), 10).unwrap();
    sim.seed_items(b, iron_plate(), 10).unwrap();
    sim.set_order(vec![b]).unwrap();
    sim.run(60).unwrap();
    assert_eq!(sim.machine(a).unwrap().craft_count, 0);
    assert_eq!(sim.machine(b).unwrap().craft_count, 1);
}
