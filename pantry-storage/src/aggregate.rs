//! Shopping-list aggregation entry point.

use std::sync::Arc;

use pantry_core::{AggregatedLine, Caller, PantryResult};
use tracing::debug;

use crate::Store;

/// Computes a caller's consolidated shopping list from the store.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn Store>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Totals for every ingredient across the caller's cart.
    ///
    /// Anonymous callers get `Unauthorized`. An empty cart is an empty list,
    /// not an error.
    pub async fn aggregate(&self, caller: &Caller) -> PantryResult<Vec<AggregatedLine>> {
        let user = caller.require_user()?;
        let lines = self.store.shopping_list(user).await?;
        debug!(user_id = %user, line_count = lines.len(), "Aggregated shopping list");
        Ok(lines)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").finish_non_exhaustive()
    }
}
