//! Exact crafting and bonus-productivity rates.
//!
//! Every field is a reduced [`Ratio`]. Rates are computed once from static
//! metadata and never change for the lifetime of an entity.

use crate::error::SimError;
use crate::id::ItemTypeId;
use crate::rational::{Ratio, TICKS_PER_SECOND, int, to_f64};
use crate::registry::{DrillDef, MachineDef, RecipeDef};
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Crafting rate
// ---------------------------------------------------------------------------

/// Cadence of a machine crafting one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingRate {
    pub amount_per_craft: Ratio,
    pub ticks_per_craft: Ratio,
    pub crafts_per_tick: Ratio,
    pub amount_per_tick: Ratio,
    pub amount_per_second: Ratio,
}

impl CraftingRate {
    /// `ticks_per_craft = energy_required / crafting_speed * 60`.
    pub fn new(
        amount_per_craft: Ratio,
        crafting_speed: &Ratio,
        energy_required: &Ratio,
    ) -> Result<Self, SimError> {
        if !crafting_speed.is_positive() {
            return Err(SimError::InvalidRate(format!(
                "crafting speed must be positive, got {crafting_speed}"
            )));
        }
        if !energy_required.is_positive() {
            return Err(SimError::InvalidRate(format!(
                "energy required must be positive, got {energy_required}"
            )));
        }
        if amount_per_craft.is_negative() {
            return Err(SimError::InvalidRate(format!(
                "amount per craft must not be negative, got {amount_per_craft}"
            )));
        }

        let ticks_per_craft = energy_required / crafting_speed * int(TICKS_PER_SECOND);
        let crafts_per_tick = ticks_per_craft.recip();
        let amount_per_tick = &amount_per_craft * &crafts_per_tick;
        let amount_per_second = &amount_per_tick * int(TICKS_PER_SECOND);

        Ok(Self {
            amount_per_craft,
            ticks_per_craft,
            crafts_per_tick,
            amount_per_tick,
            amount_per_second,
        })
    }
}

impl fmt::Display for CraftingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks/craft ({:.4}/s)",
            self.ticks_per_craft,
            to_f64(&self.amount_per_second)
        )
    }
}

// ---------------------------------------------------------------------------
// Bonus productivity rate
// ---------------------------------------------------------------------------

/// Cadence of free bonus crafts granted by productivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusProductivityRate {
    pub productivity: Ratio,
    pub bonus_crafts_per_tick: Ratio,
    pub ticks_per_bonus: Ratio,
    pub amount_per_bonus: Ratio,
}

impl BonusProductivityRate {
    /// `productivity` is a fraction: `1/10` grants one bonus craft per ten.
    pub fn new(rate: &CraftingRate, productivity: &Ratio) -> Result<Self, SimError> {
        if productivity.is_negative() {
            return Err(SimError::InvalidRate(format!(
                "productivity must not be negative, got {productivity}"
            )));
        }
        if productivity.is_zero() {
            return Ok(Self::none());
        }

        Ok(Self {
            productivity: productivity.clone(),
            bonus_crafts_per_tick: &rate.crafts_per_tick * productivity,
            ticks_per_bonus: &rate.ticks_per_craft * productivity,
            amount_per_bonus: rate.amount_per_craft.clone(),
        })
    }

    /// No productivity: every field is zero.
    pub fn none() -> Self {
        Self {
            productivity: Ratio::zero(),
            bonus_crafts_per_tick: Ratio::zero(),
            ticks_per_bonus: Ratio::zero(),
            amount_per_bonus: Ratio::zero(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.productivity.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Machine rates
// ---------------------------------------------------------------------------

/// Everything a crafting machine needs per tick for one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRates {
    pub crafting: CraftingRate,
    pub bonus: BonusProductivityRate,
    /// Per-craft amount of every ingredient.
    pub ingredients: Vec<(ItemTypeId, Ratio)>,
    /// Per-craft amount of every product.
    pub products: Vec<(ItemTypeId, Ratio)>,
}

impl MachineRates {
    pub fn for_recipe(recipe: &RecipeDef, machine: &MachineDef) -> Result<Self, SimError> {
        Self::from_parts(
            &recipe.energy_required,
            &machine.crafting_speed,
            &machine.productivity,
            recipe.ingredients.iter().map(|e| (e.item, e.amount.clone())).collect(),
            recipe.products.iter().map(|e| (e.item, e.amount.clone())).collect(),
        )
        .map_err(|err| match err {
            SimError::InvalidRate(why) => {
                SimError::InvalidRate(format!("{} in {}: {why}", recipe.name, machine.name))
            }
            other => other,
        })
    }

    /// The first product's amount drives `amount_per_craft`.
    pub fn from_parts(
        energy_required: &Ratio,
        crafting_speed: &Ratio,
        productivity: &Ratio,
        ingredients: Vec<(ItemTypeId, Ratio)>,
        products: Vec<(ItemTypeId, Ratio)>,
    ) -> Result<Self, SimError> {
        let primary = products
            .first()
            .map(|(_, amount)| amount.clone())
            .ok_or_else(|| SimError::InvalidRate("recipe has no products".to_string()))?;
        let crafting = CraftingRate::new(primary, crafting_speed, energy_required)?;
        let bonus = BonusProductivityRate::new(&crafting, productivity)?;
        Ok(Self {
            crafting,
            bonus,
            ingredients,
            products,
        })
    }
}

/// Mining cadence of a drill: one unit per `mining_time / mining_speed` seconds.
pub fn drill_rates(
    drill: &DrillDef,
    mining_time: &Ratio,
) -> Result<(CraftingRate, BonusProductivityRate), SimError> {
    let rate = CraftingRate::new(Ratio::one(), &drill.mining_speed, mining_time)?;
    let bonus = BonusProductivityRate::new(&rate, &drill.productivity)?;
    Ok((rate, bonus))
}
