//! Category-aware merging of line items
//!
//! Standard parts keep the last quantity seen for a name. Every other
//! category accumulates. Materials folded in from a detail's
//! characteristics are keyed by material name and a repeated match pins
//! the quantity to exactly one.

use tracing::debug;

use crate::model::{round_quantity, Category, LineItem};

/// How a matching entry absorbs an incoming item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Replace the quantity (last write wins)
    Overwrite,
    /// Add the quantities
    Accumulate,
    /// Set the quantity to a fixed value
    Pin(u32),
}

impl MergePolicy {
    /// Policy for a line read from a specification table
    pub fn for_table(category: Category) -> Self {
        match category {
            Category::StandardPart => MergePolicy::Overwrite,
            _ => MergePolicy::Accumulate,
        }
    }

    /// Policy for a material resolved from a detail's characteristics
    pub fn for_characteristic(category: Category) -> Self {
        match category {
            Category::StandardPart => MergePolicy::Overwrite,
            Category::RawMaterial => MergePolicy::Pin(1),
            _ => MergePolicy::Accumulate,
        }
    }

    fn apply(&self, existing: f64, incoming: f64) -> f64 {
        match self {
            MergePolicy::Overwrite => incoming,
            MergePolicy::Accumulate => round_quantity(existing + incoming),
            MergePolicy::Pin(value) => f64::from(*value),
        }
    }
}

/// Merge a table line into `existing`
pub fn merge(existing: &mut Vec<LineItem>, incoming: LineItem) {
    let policy = MergePolicy::for_table(incoming.category);
    merge_with(existing, incoming, policy);
}

/// Merge a characteristic material into `existing`
pub fn merge_characteristic(existing: &mut Vec<LineItem>, incoming: LineItem) {
    let policy = MergePolicy::for_characteristic(incoming.category);
    merge_with(existing, incoming, policy);
}

/// Merge under an explicit policy; the lookup key is the item name
pub fn merge_with(existing: &mut Vec<LineItem>, incoming: LineItem, policy: MergePolicy) {
    match existing.iter_mut().find(|i| i.name == incoming.name) {
        Some(entry) => {
            let quantity = policy.apply(entry.quantity, incoming.quantity);
            debug!(
                "Merging {} '{}' ({:?}): {} -> {}",
                incoming.category, incoming.name, policy, entry.quantity, quantity
            );
            *entry = entry.with_quantity(quantity);
        }
        None => existing.push(incoming),
    }
}
