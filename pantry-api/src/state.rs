//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use pantry_storage::Store;

use crate::services::ShoppingListService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub shopping_list: ShoppingListService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, shopping_list: ShoppingListService) -> Self {
        Self {
            store,
            shopping_list,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("shopping_list", &self.shopping_list)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

crate::impl_from_ref!(Arc<dyn Store>, store);
crate::impl_from_ref!(ShoppingListService, shopping_list);
crate::impl_from_ref!(Instant, start_time);
