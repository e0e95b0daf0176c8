//! Fatal simulation errors.
//!
//! Every [`SimError`] is non-recoverable: it signals a construction bug or a
//! broken transition policy, never a steady-state condition. Shortages and
//! blocked outputs are ordinary modes, not errors. A simulation that returned
//! an error must not be stepped again.

use crate::id::{EntityId, ItemTypeId};
use crate::registry::RegistryError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    // -- Configuration --
    #[error("no transition evaluator registered for mode {mode}")]
    MissingEvaluator { mode: String },
    #[error("invalid rate: {0}")]
    InvalidRate(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("entity {entity:?} is not a {expected}")]
    EntityKindMismatch {
        entity: EntityId,
        expected: &'static str,
    },
    #[error("entity {0:?} scheduled more than once per tick")]
    DuplicateEntityInTick(EntityId),
    #[error("entity {0:?} cannot be both source and sink of one inserter")]
    SelfLinkedInserter(EntityId),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("entities can only be seeded before the first tick (now at tick {0})")]
    SetupAfterStart(u64),

    // -- Invariant violations --
    #[error("cannot remove {requested} of {item:?}: only {available} present")]
    InventoryUnderflow {
        item: ItemTypeId,
        available: u64,
        requested: u64,
    },
    #[error("adding {added} of {item:?} to {available} overflows")]
    InventoryOverflow {
        item: ItemTypeId,
        available: u64,
        added: u64,
    },
    #[error("inserter {entity:?} entered drop-off with an empty hand")]
    NoHeldItem { entity: EntityId },
    #[error("inserter {entity:?} holds {held}, cannot drop {requested}")]
    HeldQuantityUnderflow {
        entity: EntityId,
        held: u32,
        requested: u32,
    },
    #[error("quantity out of range: {0}")]
    QuantityOutOfRange(String),
}
