//! Shopping-list aggregation rules.
//!
//! A shopping list is the sum of every ingredient amount across the recipes
//! in a user's cart, grouped by ingredient *name and unit*. Two ingredient
//! records that share both are merged into one line even when their ids
//! differ.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (ingredient, unit, amount) tuple pulled from a cart recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmount {
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

impl IngredientAmount {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, amount: u32) -> Self {
        Self {
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }
}

/// One row of a consolidated shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregatedLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: u64,
}

impl AggregatedLine {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, amount: u64) -> Self {
        Self {
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }

    /// Printable form, `position` is 1-based: `"3) Salt - 15 g"`.
    pub fn numbered(&self, position: usize) -> String {
        format!(
            "{}) {} - {} {}",
            position, self.name, self.amount, self.measurement_unit
        )
    }
}

/// Group by (name, unit) and sum.
///
/// Output is ordered by name, then unit, both by byte value, so the result
/// is stable for a given input multiset regardless of input order.
pub fn aggregate_amounts<I>(rows: I) -> Vec<AggregatedLine>
where
    I: IntoIterator<Item = IngredientAmount>,
{
    let mut totals: BTreeMap<(String, String), u64> = BTreeMap::new();
    for row in rows {
        *totals.entry((row.name, row.measurement_unit)).or_insert(0) += u64::from(row.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| AggregatedLine {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}
