//! Tag REST API Routes

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use pantry_core::TagId;
use pantry_storage::Store;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/tags - All tags, unpaginated
pub async fn list_tags(State(store): State<Arc<dyn Store>>) -> ApiResult<impl IntoResponse> {
    let tags = store.tag_list().await?;
    Ok(Json(tags))
}

/// GET /api/tags/{id}
pub async fn get_tag(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<TagId>,
) -> ApiResult<impl IntoResponse> {
    let tag = store
        .tag_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Tag", id))?;
    Ok(Json(tag))
}

/// Create the tag routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/:id", get(get_tag))
}
