//! Recipe resolution: menu item external id → ingredient requirements.

use std::collections::HashMap;

/// One ingredient requirement for one sold unit of a menu item.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeLine {
    pub ingredient_id: String,
    pub quantity_per_unit: f64,
}

/// Immutable recipe lookup table for one sync batch.
///
/// Loaded once from the database at batch start so resolution is a pure
/// in-memory lookup with no side effects. An item with no configured recipe
/// resolves to an empty slice — zero deductions, not an error.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    by_item: HashMap<String, Vec<RecipeLine>>,
}

impl RecipeBook {
    /// Build from flat `(menu item guid, ingredient id, per-unit quantity)`
    /// rows as returned by the store.
    pub fn from_lines(lines: Vec<(String, String, f64)>) -> Self {
        let mut by_item: HashMap<String, Vec<RecipeLine>> = HashMap::new();
        for (item_guid, ingredient_id, quantity_per_unit) in lines {
            by_item.entry(item_guid).or_default().push(RecipeLine {
                ingredient_id,
                quantity_per_unit,
            });
        }
        Self { by_item }
    }

    /// Recipe lines for one menu item; empty when no recipe is configured.
    pub fn resolve(&self, item_guid: &str) -> &[RecipeLine] {
        self.by_item
            .get(item_guid)
            .map(|lines| lines.as_slice())
            .unwrap_or(&[])
    }

    /// `true` when the item has at least one recipe line.
    pub fn has_recipe(&self, item_guid: &str) -> bool {
        !self.resolve(item_guid).is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.by_item.len()
    }
}
