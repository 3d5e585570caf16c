//! Shopping cart and favorites toggles.
//!
//! Both lists share one shape: POST adds the recipe and returns its short
//! form with 201, DELETE removes the caller's own entry with 204.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use pantry_core::{RecipeId, RecipeList, RecipeSummary};
use pantry_storage::Store;
use tracing::debug;

use crate::error::ApiResult;
use crate::middleware::CallerExtractor;
use crate::state::AppState;

async fn add(
    store: &dyn Store,
    caller: CallerExtractor,
    list: RecipeList,
    recipe: RecipeId,
) -> ApiResult<(StatusCode, Json<RecipeSummary>)> {
    let user = caller.require_user()?;
    let summary = store.list_add(list, user, recipe).await?;
    debug!(user_id = user.get(), recipe_id = recipe.get(), ?list, "Added to list");
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn remove(
    store: &dyn Store,
    caller: CallerExtractor,
    list: RecipeList,
    recipe: RecipeId,
) -> ApiResult<StatusCode> {
    let user = caller.require_user()?;
    store.list_remove(list, user, recipe).await?;
    debug!(user_id = user.get(), recipe_id = recipe.get(), ?list, "Removed from list");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/recipes/{id}/shopping_cart
pub async fn add_to_shopping_cart(
    State(store): State<Arc<dyn Store>>,
    caller: CallerExtractor,
    Path(id): Path<RecipeId>,
) -> ApiResult<(StatusCode, Json<RecipeSummary>)> {
    add(store.as_ref(), caller, RecipeList::ShoppingCart, id).await
}

/// DELETE /api/recipes/{id}/shopping_cart
pub async fn remove_from_shopping_cart(
    State(store): State<Arc<dyn Store>>,
    caller: CallerExtractor,
    Path(id): Path<RecipeId>,
) -> ApiResult<StatusCode> {
    remove(store.as_ref(), caller, RecipeList::ShoppingCart, id).await
}

/// POST /api/recipes/{id}/favorite
pub async fn add_to_favorites(
    State(store): State<Arc<dyn Store>>,
    caller: CallerExtractor,
    Path(id): Path<RecipeId>,
) -> ApiResult<(StatusCode, Json<RecipeSummary>)> {
    add(store.as_ref(), caller, RecipeList::Favorites, id).await
}

/// DELETE /api/recipes/{id}/favorite
pub async fn remove_from_favorites(
    State(store): State<Arc<dyn Store>>,
    caller: CallerExtractor,
    Path(id): Path<RecipeId>,
) -> ApiResult<StatusCode> {
    remove(store.as_ref(), caller, RecipeList::Favorites, id).await
}

/// Routes nested under `/api/recipes`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/:id/shopping_cart",
            post(add_to_shopping_cart).delete(remove_from_shopping_cart),
        )
        .route(
            "/:id/favorite",
            post(add_to_favorites).delete(remove_from_favorites),
        )
}
