use crate::error::SimError;
use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-entity item counts with optional soft limits.
///
/// Quantities never go negative: removing more than is present is an
/// invariant violation, since callers must check availability first. Limits
/// are advisory and read by transition evaluators to decide when an output
/// or target is full; `add_quantity` never truncates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryState {
    items: BTreeMap<ItemTypeId, u64>,
    #[serde(default)]
    limits: BTreeMap<ItemTypeId, u64>,
}

impl InventoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory holding the given quantities.
    pub fn with_items(items: impl IntoIterator<Item = (ItemTypeId, u64)>) -> Self {
        let mut inv = Self::new();
        for (item, quantity) in items {
            if quantity > 0 {
                let entry = inv.items.entry(item).or_insert(0);
                *entry = entry.saturating_add(quantity);
            }
        }
        inv
    }

    pub fn quantity(&self, item: ItemTypeId) -> u64 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    /// Whether at least `quantity` of `item` is present.
    pub fn has(&self, item: ItemTypeId, quantity: u64) -> bool {
        self.quantity(item) >= quantity
    }

    pub fn add_quantity(&mut self, item: ItemTypeId, quantity: u64) -> Result<(), SimError> {
        if quantity == 0 {
            return Ok(());
        }
        let available = self.quantity(item);
        let total = available
            .checked_add(quantity)
            .ok_or(SimError::InventoryOverflow {
                item,
                available,
                added: quantity,
            })?;
        self.items.insert(item, total);
        Ok(())
    }

    pub fn remove_quantity(&mut self, item: ItemTypeId, quantity: u64) -> Result<(), SimError> {
        if quantity == 0 {
            return Ok(());
        }
        let available = self.quantity(item);
        let rest = available
            .checked_sub(quantity)
            .ok_or(SimError::InventoryUnderflow {
                item,
                available,
                requested: quantity,
            })?;
        if rest == 0 {
            self.items.remove(&item);
        } else {
            self.items.insert(item, rest);
        }
        Ok(())
    }

    pub fn set_limit(&mut self, item: ItemTypeId, limit: u64) {
        self.limits.insert(item, limit);
    }

    pub fn limit(&self, item: ItemTypeId) -> Option<u64> {
        self.limits.get(&item).copied()
    }

    /// Whether `item` has reached its limit. Unlimited items never do.
    pub fn is_at_limit(&self, item: ItemTypeId) -> bool {
        self.limit(item)
            .is_some_and(|limit| self.quantity(item) >= limit)
    }

    /// Whether `quantity` more of `item` stays within its limit.
    pub fn has_room_for(&self, item: ItemTypeId, quantity: u64) -> bool {
        match self.limit(item) {
            Some(limit) => self.quantity(item).saturating_add(quantity) <= limit,
            None => true,
        }
    }

    /// Non-zero entries in ascending item order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemTypeId, u64)> + '_ {
        self.items.iter().map(|(&item, &quantity)| (item, quantity))
    }

    /// Lowest item ID with a non-zero quantity.
    pub fn first_item(&self) -> Option<ItemTypeId> {
        self.items.keys().next().copied()
    }

    pub fn total(&self) -> u64 {
        self.items.values().fold(0u64, |acc, q| acc.saturating_add(*q))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
