//! Serde data file structs for item, recipe, machine and drill metadata.
//!
//! These mirror the on-disk layout. The loader resolves names into core IDs
//! and converts every [`AmountData`] into an exact rational.

use clocksim_core::rational::{ParseRatioError, Ratio, from_f64_decimal, int, parse_decimal};
use serde::Deserialize;

// ===========================================================================
// Quantities
// ===========================================================================

/// A numeric quantity as written in a data file.
///
/// Strings are the lossless form (`"0.9"`, `"200/3"`). Bare numbers are
/// accepted too; floats are read through their shortest decimal form, so
/// `0.9` still means exactly `9/10`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountData {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl AmountData {
    pub fn to_ratio(&self) -> Result<Ratio, ParseRatioError> {
        match self {
            AmountData::Integer(value) => Ok(int(*value)),
            AmountData::Float(value) => from_f64_decimal(*value),
            AmountData::Text(text) => parse_decimal(text),
        }
    }
}

impl From<u64> for AmountData {
    fn from(value: u64) -> Self {
        AmountData::Integer(value)
    }
}

impl From<&str> for AmountData {
    fn from(value: &str) -> Self {
        AmountData::Text(value.to_string())
    }
}

// ===========================================================================
// Items
// ===========================================================================

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default = "default_stack_size")]
    pub stack_size: u32,
    /// Present only on minable resources.
    #[serde(default)]
    pub mining_time: Option<AmountData>,
}

fn default_stack_size() -> u32 {
    50
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe ingredient or product, in short tuple form or full form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecipeEntryData {
    /// Short form: `("item_name", amount)`.
    Short(String, AmountData),
    Full { item: String, amount: AmountData },
}

impl RecipeEntryData {
    pub fn item(&self) -> &str {
        match self {
            RecipeEntryData::Short(item, _) | RecipeEntryData::Full { item, .. } => item,
        }
    }

    pub fn amount(&self) -> &AmountData {
        match self {
            RecipeEntryData::Short(_, amount) | RecipeEntryData::Full { amount, .. } => amount,
        }
    }
}

/// A recipe definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    /// Seconds per craft at crafting speed 1.
    pub energy_required: AmountData,
    #[serde(default)]
    pub ingredients: Vec<RecipeEntryData>,
    pub products: Vec<RecipeEntryData>,
}

// ===========================================================================
// Machines and drills
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MachineData {
    pub name: String,
    pub crafting_speed: AmountData,
    /// Fractional bonus, `"0.1"` for +10%.
    #[serde(default)]
    pub productivity: Option<AmountData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DrillData {
    pub name: String,
    pub mining_speed: AmountData,
    #[serde(default)]
    pub productivity: Option<AmountData>,
}
