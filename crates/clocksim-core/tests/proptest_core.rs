//! Property-based tests for exact rates, inventories and determinism.

use clocksim_core::config::SimConfig;
use clocksim_core::error::SimError;
use clocksim_core::id::ItemTypeId;
use clocksim_core::inventory::InventoryState;
use clocksim_core::rate::{CraftingRate, MachineRates};
use clocksim_core::rational::{Ratio, int, parse_decimal, ratio, split_whole};
use clocksim_core::sim::{InserterSpec, Simulation};
use clocksim_core::test_utils::*;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// Positive rational with small numerator and denominator.
fn arb_positive_ratio() -> impl Strategy<Value = Ratio> {
    (1i64..=500, 1i64..=500).prop_map(|(n, d)| ratio(n, d))
}

#[derive(Debug, Clone)]
enum InvOp {
    Add(u32, u64),
    Remove(u32, u64),
}

fn arb_inventory_ops(max_ops: usize) -> impl Strategy<Value = Vec<InvOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..4u32, 0..100u64).prop_map(|(i, q)| InvOp::Add(i, q)),
            (0..4u32, 0..100u64).prop_map(|(i, q)| InvOp::Remove(i, q)),
        ],
        1..=max_ops,
    )
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// ticks_per_craft * crafts_per_tick is exactly one.
    #[test]
    fn rate_product_is_exactly_one(
        speed in arb_positive_ratio(),
        energy in arb_positive_ratio(),
        amount in 1u64..10,
    ) {
        let rate = CraftingRate::new(int(amount), &speed, &energy).unwrap();
        prop_assert_eq!(&rate.ticks_per_craft * &rate.crafts_per_tick, Ratio::one());
        prop_assert_eq!(&rate.amount_per_tick * int(60), rate.amount_per_second.clone());
    }

    /// The floor split reassembles exactly and leaves a remainder in [0, 1).
    #[test]
    fn split_whole_is_exact(n in -10_000i64..10_000, d in 1i64..1_000) {
        let value = ratio(n, d);
        let (whole, rest) = split_whole(&value);
        prop_assert!(!rest.is_negative());
        prop_assert!(rest < Ratio::one());
        prop_assert_eq!(Ratio::from_integer(whole) + rest, value);
    }

    /// Decimal strings parse to the rational they denote.
    #[test]
    fn decimal_strings_are_exact(whole in 0u32..1_000, frac in 0u32..1_000) {
        let text = format!("{whole}.{frac:03}");
        let expected = int(u64::from(whole)) + ratio(i64::from(frac), 1_000);
        prop_assert_eq!(parse_decimal(&text).unwrap(), expected);
    }

    /// A machine with ample input consumes exactly amount * craft_count and
    /// its progress stays in [0, 1).
    #[test]
    fn consumption_never_drifts(
        speed in arb_positive_ratio(),
        energy in arb_positive_ratio(),
        per_craft in 1u64..5,
        ticks in 1u64..2_000,
    ) {
        let rates = MachineRates::from_parts(
            &energy,
            &speed,
            &int(0),
            vec![(iron_plate(), int(per_craft))],
            vec![(gear(), int(1))],
        )
        .unwrap();
        let expected_crafts = {
            let (whole, _) = split_whole(&(&rates.crafting.crafts_per_tick * int(ticks)));
            whole
        };
        let stock = 10_000_000u64;
        let mut sim = Simulation::new(SimConfig::default().without_craft_events()).unwrap();
        let m = sim.add_machine("gear", rates).unwrap();
        sim.seed_items(m, iron_plate(), stock).unwrap();

        // Skip runs that would exhaust the stock.
        prop_assume!(expected_crafts < BigInt::from(stock / per_craft));
        sim.run(ticks).unwrap();

        let state = sim.machine(m).unwrap();
        prop_assert_eq!(BigInt::from(state.craft_count), expected_crafts);
        prop_assert_eq!(
            state.inventory.quantity(iron_plate()),
            stock - per_craft * state.craft_count
        );
        prop_assert_eq!(state.inventory.quantity(gear()), state.craft_count);
        prop_assert!(!state.crafting_progress.is_negative());
        prop_assert!(state.crafting_progress < Ratio::one());
    }

    /// Quantities never go negative; a failed remove leaves the inventory
    /// untouched.
    #[test]
    fn inventory_never_negative(ops in arb_inventory_ops(60)) {
        let mut inv = InventoryState::new();
        for op in ops {
            match op {
                InvOp::Add(item, q) => inv.add_quantity(ItemTypeId(item), q).unwrap(),
                InvOp::Remove(item, q) => {
                    let item = ItemTypeId(item);
                    let before = inv.clone();
                    match inv.remove_quantity(item, q) {
                        Ok(()) => prop_assert_eq!(inv.quantity(item), before.quantity(item) - q),
                        Err(SimError::InventoryUnderflow { available, requested, .. }) => {
                            prop_assert_eq!(available, before.quantity(item));
                            prop_assert_eq!(requested, q);
                            prop_assert_eq!(&inv, &before);
                        }
                        Err(other) => prop_assert!(false, "unexpected error {other}"),
                    }
                }
            }
            prop_assert!(inv.iter().all(|(_, q)| q > 0));
        }
    }

    /// Two runs of the same line hash identically at every checkpoint, and
    /// the unloader never carries ingredients out of the machine.
    #[test]
    fn runs_are_deterministic(
        plates in 0u64..500,
        stack in 1u32..8,
        swing in 0u32..10,
        chunks in proptest::collection::vec(1u64..50, 1..10),
    ) {
        let build = || {
            let mut sim = Simulation::new(SimConfig::default()).unwrap();
            let belt = sim.add_belt();
            let m = sim.add_machine("gear", gear_rates(ratio(3, 4))).unwrap();
            let out = sim.add_belt();
            sim.add_inserter(belt, m, InserterSpec::new().stack_size(stack).swing_ticks(swing)).unwrap();
            sim.add_inserter(m, out, InserterSpec::new()).unwrap();
            sim.seed_items(belt, iron_plate(), plates).unwrap();
            (sim, out)
        };
        let (mut a, out) = build();
        let (mut b, _) = build();
        for ticks in chunks {
            a.run(ticks).unwrap();
            b.run(ticks).unwrap();
            prop_assert_eq!(a.state_hash(), b.state_hash());
            prop_assert_eq!(a.belt(out).unwrap().inventory.quantity(iron_plate()), 0);
        }
        prop_assert_eq!(a.craft_events().len(), b.craft_events().len());
        // Every recorded craft is covered by its machine's count.
        for event in a.craft_events().iter() {
            let machine = a.machine(event.machine).unwrap();
            prop_assert!(event.craft_index < machine.craft_count);
        }
    }
}

#[test]
fn zero_productivity_has_no_bonus() {
    let rates = cable_rates(int(1), Ratio::zero());
    assert!(!rates.bonus.is_active());
    assert!(rates.bonus.bonus_crafts_per_tick.is_zero());
}
