//! Item record and update merge policy.
//!
//! # Responsibility
//! - Define the three-slot record stored per key.
//! - Define how an incoming upsert combines with the stored record.
//!
//! # Invariants
//! - `Merge` appends every slot, the key slot included, with one space.
//! - `Overwrite` keeps the stored key slot and replaces both value slots.

use serde::{Deserialize, Serialize};

/// Default name of the item table.
pub const ITEM_TABLE: &str = "Brick_Item";
pub const KEY_COLUMN: &str = "Item_ID";
pub const UNIT_PRICE_COLUMN: &str = "Unit_Price";
pub const QUANTITY_COLUMN: &str = "Item_Quantity";

/// Column position of the only queryable value slot.
pub const UNIT_PRICE_POSITION: usize = 1;

const MERGE_SEPARATOR: &str = " ";

/// One stored item: a key plus two free-form value slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Key column text. After merges this holds every key ever written.
    pub key: String,
    /// First value slot ("unit price"), returned by reads.
    pub unit_price: String,
    /// Second value slot ("quantity"), never returned by reads.
    pub quantity: String,
}

impl ItemRecord {
    pub fn new(
        key: impl Into<String>,
        unit_price: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            unit_price: unit_price.into(),
            quantity: quantity.into(),
        }
    }

    /// Combines the stored record with incoming values under `policy`.
    pub fn merged_with(&self, incoming: &ItemRecord, policy: MergePolicy) -> ItemRecord {
        match policy {
            MergePolicy::Merge => ItemRecord {
                key: append(&self.key, &incoming.key),
                unit_price: append(&self.unit_price, &incoming.unit_price),
                quantity: append(&self.quantity, &incoming.quantity),
            },
            MergePolicy::Overwrite => ItemRecord {
                key: self.key.clone(),
                unit_price: incoming.unit_price.clone(),
                quantity: incoming.quantity.clone(),
            },
        }
    }
}

fn append(stored: &str, incoming: &str) -> String {
    let mut merged = String::with_capacity(stored.len() + MERGE_SEPARATOR.len() + incoming.len());
    merged.push_str(stored);
    merged.push_str(MERGE_SEPARATOR);
    merged.push_str(incoming);
    merged
}

/// How an upsert on an existing key updates the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Append each incoming value after a space.
    #[default]
    Merge,
    /// Replace the value slots.
    Overwrite,
}

impl MergePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Overwrite => "overwrite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" => Some(Self::Merge),
            "overwrite" => Some(Self::Overwrite),
            _ => None,
        }
    }
}
