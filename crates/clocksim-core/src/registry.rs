//! Static item, recipe, machine and drill metadata.
//!
//! Supplied once by the data source and frozen into a [`Registry`]. The
//! simulation reads it at entity construction time and never mutates it.

use crate::id::*;
use crate::rational::Ratio;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An item type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    pub stack_size: u32,
    /// Seconds to mine one unit at mining speed 1. `None` for non-resources.
    pub mining_time: Option<Ratio>,
}

/// A recipe ingredient or product with its per-craft amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub item: ItemTypeId,
    pub amount: Ratio,
}

impl RecipeEntry {
    pub fn new(item: ItemTypeId, amount: Ratio) -> Self {
        Self { item, amount }
    }
}

/// A recipe definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDef {
    pub name: String,
    /// Seconds per craft at crafting speed 1.
    pub energy_required: Ratio,
    pub ingredients: Vec<RecipeEntry>,
    pub products: Vec<RecipeEntry>,
}

/// A crafting machine prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDef {
    pub name: String,
    pub crafting_speed: Ratio,
    /// Productivity bonus as a fraction (`1/10` = +10%).
    pub productivity: Ratio,
}

/// A mining drill prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillDef {
    pub name: String,
    pub mining_speed: Ratio,
    pub productivity: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemTypeId),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("item is not a minable resource: {0}")]
    NotAResource(String),
}

/// Builder for constructing an immutable [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    machines: Vec<MachineDef>,
    machine_name_to_id: HashMap<String, MachineTypeId>,
    drills: Vec<DrillDef>,
    drill_name_to_id: HashMap<String, DrillTypeId>,
    duplicates: Vec<String>,
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn note_name<I>(map: &mut HashMap<String, I>, duplicates: &mut Vec<String>, name: &str, id: I) {
        if map.insert(name.to_string(), id).is_some() {
            duplicates.push(name.to_string());
        }
    }

    /// Register a plain item type. Returns its ID.
    pub fn register_item(&mut self, name: &str, stack_size: u32) -> ItemTypeId {
        self.push_item(name, stack_size, None)
    }

    /// Register a minable resource. Returns its ID.
    pub fn register_resource(&mut self, name: &str, stack_size: u32, mining_time: Ratio) -> ItemTypeId {
        self.push_item(name, stack_size, Some(mining_time))
    }

    fn push_item(&mut self, name: &str, stack_size: u32, mining_time: Option<Ratio>) -> ItemTypeId {
        let id = ItemTypeId(next_id(self.items.len()));
        self.items.push(ItemDef {
            name: name.to_string(),
            stack_size,
            mining_time,
        });
        Self::note_name(&mut self.item_name_to_id, &mut self.duplicates, name, id);
        id
    }

    /// Register a recipe. Returns its ID.
    pub fn register_recipe(
        &mut self,
        name: &str,
        energy_required: Ratio,
        ingredients: Vec<RecipeEntry>,
        products: Vec<RecipeEntry>,
    ) -> RecipeId {
        let id = RecipeId(next_id(self.recipes.len()));
        self.recipes.push(RecipeDef {
            name: name.to_string(),
            energy_required,
            ingredients,
            products,
        });
        Self::note_name(&mut self.recipe_name_to_id, &mut self.duplicates, name, id);
        id
    }

    /// Register a crafting machine prototype. Returns its ID.
    pub fn register_machine(&mut self, name: &str, crafting_speed: Ratio, productivity: Ratio) -> MachineTypeId {
        let id = MachineTypeId(next_id(self.machines.len()));
        self.machines.push(MachineDef {
            name: name.to_string(),
            crafting_speed,
            productivity,
        });
        Self::note_name(&mut self.machine_name_to_id, &mut self.duplicates, name, id);
        id
    }

    /// Register a mining drill prototype. Returns its ID.
    pub fn register_drill(&mut self, name: &str, mining_speed: Ratio, productivity: Ratio) -> DrillTypeId {
        let id = DrillTypeId(next_id(self.drills.len()));
        self.drills.push(DrillDef {
            name: name.to_string(),
            mining_speed,
            productivity,
        });
        Self::note_name(&mut self.drill_name_to_id, &mut self.duplicates, name, id);
        id
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Finalize into an immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(RegistryError::DuplicateName(name));
        }
        for recipe in &self.recipes {
            for entry in recipe.ingredients.iter().chain(recipe.products.iter()) {
                if entry.item.0 as usize >= self.items.len() {
                    return Err(RegistryError::InvalidItemRef(entry.item));
                }
            }
        }

        Ok(Registry {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
            machines: self.machines,
            machine_name_to_id: self.machine_name_to_id,
            drills: self.drills,
            drill_name_to_id: self.drill_name_to_id,
        })
    }
}

/// Immutable registry. Frozen after [`RegistryBuilder::build`].
#[derive(Debug, Clone)]
pub struct Registry {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    machines: Vec<MachineDef>,
    machine_name_to_id: HashMap<String, MachineTypeId>,
    drills: Vec<DrillDef>,
    drill_name_to_id: HashMap<String, DrillTypeId>,
}

impl Registry {
    pub fn get_item(&self, id: ItemTypeId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn get_recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn get_machine(&self, id: MachineTypeId) -> Option<&MachineDef> {
        self.machines.get(id.0 as usize)
    }

    pub fn get_drill(&self, id: DrillTypeId) -> Option<&DrillDef> {
        self.drills.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn machine_id(&self, name: &str) -> Option<MachineTypeId> {
        self.machine_name_to_id.get(name).copied()
    }

    pub fn drill_id(&self, name: &str) -> Option<DrillTypeId> {
        self.drill_name_to_id.get(name).copied()
    }

    /// Look up an item by name; a miss is a configuration error.
    pub fn item(&self, name: &str) -> Result<&ItemDef, RegistryError> {
        self.item_id(name)
            .and_then(|id| self.get_item(id))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Look up a recipe by name; a miss is a configuration error.
    pub fn recipe(&self, name: &str) -> Result<&RecipeDef, RegistryError> {
        self.recipe_id(name)
            .and_then(|id| self.get_recipe(id))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn machine(&self, name: &str) -> Result<&MachineDef, RegistryError> {
        self.machine_id(name)
            .and_then(|id| self.get_machine(id))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn drill(&self, name: &str) -> Result<&DrillDef, RegistryError> {
        self.drill_id(name)
            .and_then(|id| self.get_drill(id))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Mining time of a resource item.
    pub fn mining_time(&self, id: ItemTypeId) -> Result<&Ratio, RegistryError> {
        let item = self.get_item(id).ok_or(RegistryError::InvalidItemRef(id))?;
        item.mining_time
            .as_ref()
            .ok_or_else(|| RegistryError::NotAResource(item.name.clone()))
    }

    /// Stack size of an item, or 1 for unknown IDs.
    pub fn stack_size(&self, id: ItemTypeId) -> u32 {
        self.get_item(id).map(|item| item.stack_size).unwrap_or(1)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn drill_count(&self) -> usize {
        self.drills.len()
    }
}

impl MachineDef {
    /// A machine with no productivity bonus.
    pub fn plain(name: &str, crafting_speed: Ratio) -> Self {
        Self {
            name: name.to_string(),
            crafting_speed,
            productivity: Ratio::zero(),
        }
    }
}

impl DrillDef {
    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mining_speed: Ratio::one(),
            productivity: Ratio::zero(),
        }
    }
}
