//! Batch-level deduction accumulation.

use crate::resolver::RecipeBook;
use std::collections::BTreeMap;

/// Accumulates per-ingredient deduction totals across every order and item
/// in one sync batch.
///
/// Merging is commutative per ingredient, so the order in which sales are
/// recorded never changes the totals. Preview reports these totals directly;
/// commit recomputes the same sums row by row, and the two must reconcile:
/// summing the committed deduction rows for a batch equals these totals.
#[derive(Debug, Clone, Default)]
pub struct DeductionAccumulator {
    totals: BTreeMap<String, f64>,
}

impl DeductionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sold line: `quantity` units of `item_guid`.
    ///
    /// Adds `quantity × per-unit quantity` for every recipe line of the item.
    /// Returns the number of lines applied (zero for items with no recipe).
    pub fn record_sale(&mut self, book: &RecipeBook, item_guid: &str, quantity: f64) -> usize {
        let lines = book.resolve(item_guid);
        for line in lines {
            *self.totals.entry(line.ingredient_id.clone()).or_insert(0.0) +=
                line.quantity_per_unit * quantity;
        }
        lines.len()
    }

    /// Ingredient id → total quantity to deduct, in stable id order.
    pub fn totals(&self) -> &BTreeMap<String, f64> {
        &self.totals
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::RecipeBook;

    fn book() -> RecipeBook {
        RecipeBook::from_lines(vec![
            ("burger".to_string(), "bun".to_string(), 1.0),
            ("burger".to_string(), "patty".to_string(), 1.0),
            ("shake".to_string(), "milk".to_string(), 2.5),
        ])
    }

    #[test]
    fn sale_multiplies_per_unit_quantity() {
        let book = book();
        let mut acc = DeductionAccumulator::new();
        // Recipe line (milk, 2.5) × quantity 4 → 10.
        let applied = acc.record_sale(&book, "shake", 4.0);
        assert_eq!(applied, 1);
        assert_eq!(acc.totals()["milk"], 10.0);
    }

    #[test]
    fn item_without_recipe_contributes_nothing() {
        let book = book();
        let mut acc = DeductionAccumulator::new();
        let applied = acc.record_sale(&book, "mystery-item", 3.0);
        assert_eq!(applied, 0);
        assert!(acc.is_empty());
    }

    #[test]
    fn totals_merge_across_orders_commutatively() {
        let book = book();

        let mut forward = DeductionAccumulator::new();
        forward.record_sale(&book, "burger", 2.0);
        forward.record_sale(&book, "shake", 1.0);
        forward.record_sale(&book, "burger", 1.0);

        let mut reverse = DeductionAccumulator::new();
        reverse.record_sale(&book, "burger", 1.0);
        reverse.record_sale(&book, "shake", 1.0);
        reverse.record_sale(&book, "burger", 2.0);

        assert_eq!(forward.totals(), reverse.totals());
        assert_eq!(forward.totals()["bun"], 3.0);
        assert_eq!(forward.totals()["patty"], 3.0);
        assert_eq!(forward.totals()["milk"], 2.5);
    }
}
