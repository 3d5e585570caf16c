//! Ingredient REST API Routes

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use pantry_core::IngredientId;
use pantry_storage::Store;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearchParams {
    /// Case-insensitive name prefix.
    pub name: Option<String>,
}

/// GET /api/ingredients?name=<prefix> - Unpaginated prefix search
pub async fn search_ingredients(
    State(store): State<Arc<dyn Store>>,
    Query(params): Query<IngredientSearchParams>,
) -> ApiResult<impl IntoResponse> {
    let prefix = params.name.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let ingredients = store.ingredient_search(prefix).await?;
    Ok(Json(ingredients))
}

/// GET /api/ingredients/{id}
pub async fn get_ingredient(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<IngredientId>,
) -> ApiResult<impl IntoResponse> {
    let ingredient = store
        .ingredient_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Ingredient", id))?;
    Ok(Json(ingredient))
}

/// Create the ingredient routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_ingredients))
        .route("/:id", get(get_ingredient))
}
