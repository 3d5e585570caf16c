use std::sync::Arc;

use axum::Router;
use pantry_api::{
    create_api_router, ApiConfig, AppState, PdfRenderer, RenderConfig, ShoppingListService,
};
use pantry_storage::{
    Aggregator, CacheConfig, InMemoryCacheBackend, ShoppingListCache, Store,
};
use pantry_test_utils::fixtures::Kitchen;

use super::test_auth_support::test_auth_config;

/// Ids seeded by [`Kitchen`], kept after the store moves into the router.
pub struct Seeded {
    pub kitchen_ids: KitchenIds,
    pub cache: Arc<ShoppingListCache>,
}

pub struct KitchenIds {
    pub breakfast: pantry_core::TagId,
    pub salt_g: pantry_core::IngredientId,
    pub soup: pantry_core::RecipeId,
    pub stew: pantry_core::RecipeId,
    pub porridge: pantry_core::RecipeId,
}

/// Full application router over a seeded in-memory store.
pub fn test_app() -> (Router, Seeded) {
    let kitchen = Kitchen::new().expect("kitchen should seed");
    let ids = KitchenIds {
        breakfast: kitchen.breakfast.id,
        salt_g: kitchen.salt_g,
        soup: kitchen.soup,
        stew: kitchen.stew,
        porridge: kitchen.porridge,
    };

    let store: Arc<dyn Store> = Arc::new(kitchen.store);
    let cache = Arc::new(ShoppingListCache::new(
        Aggregator::new(store.clone()),
        Arc::new(InMemoryCacheBackend::new(100)),
        CacheConfig::default(),
    ));
    let renderer = Arc::new(PdfRenderer::new(RenderConfig::default()));
    let state = AppState::new(store, ShoppingListService::new(cache.clone(), renderer));

    let router = create_api_router(state, &ApiConfig::default(), test_auth_config())
        .expect("router should build outside production");

    (
        router,
        Seeded {
            kitchen_ids: ids,
            cache,
        },
    )
}
