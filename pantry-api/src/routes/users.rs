//! Author subscriptions.
//!
//! POST follows an author and returns them with their recipes (201 when
//! new, 200 when already followed). DELETE unfollows with 204 whether or
//! not a subscription existed. Following yourself is a 400 either way.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pantry_core::{FollowedAuthor, RecipeQuery, SubscriptionQuery, UserId};
use pantry_storage::Store;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::recipes::page_window;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CallerExtractor;
use crate::state::AppState;

/// A followed author as returned to the follower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub author: FollowedAuthor,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionListResponse {
    pub count: usize,
    pub results: Vec<SubscriptionResponse>,
}

/// Query string for the subscription endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionParams {
    /// 1-based page number.
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// Recipes shown per author.
    pub recipes_limit: Option<usize>,
}

impl SubscriptionParams {
    pub fn into_query(self) -> ApiResult<SubscriptionQuery> {
        let (offset, limit) = page_window(self.page, self.limit)?;
        Ok(SubscriptionQuery {
            offset,
            limit,
            recipes_limit: self.recipes_limit,
        })
    }
}

fn refuse_self(user: UserId, author: UserId) -> ApiResult<()> {
    if user == author {
        return Err(ApiError::invalid_input("You cannot subscribe to yourself"));
    }
    Ok(())
}

/// The author's newest recipes, as shown in a subscription.
async fn followed_author(
    store: &dyn Store,
    author: UserId,
    recipes_limit: Option<usize>,
) -> ApiResult<FollowedAuthor> {
    let page = store
        .recipe_list(&RecipeQuery {
            author: Some(author),
            limit: recipes_limit.unwrap_or(usize::MAX),
            ..RecipeQuery::default()
        })
        .await?;
    Ok(FollowedAuthor {
        id: author,
        recipes_count: page.count,
        recipes: page.results.iter().map(|r| r.summary()).collect(),
    })
}

/// GET /api/users/subscriptions
pub async fn list_subscriptions(
    State(store): State<Arc<dyn Store>>,
    caller: CallerExtractor,
    Query(params): Query<SubscriptionParams>,
) -> ApiResult<Json<SubscriptionListResponse>> {
    let user = caller.require_user()?;
    let page = store.subscriptions(user, &params.into_query()?).await?;
    Ok(Json(SubscriptionListResponse {
        count: page.count,
        results: page
            .results
            .into_iter()
            .map(|author| SubscriptionResponse {
                author,
                is_subscribed: true,
            })
            .collect(),
    }))
}

/// POST /api/users/{id}/subscribe
pub async fn subscribe(
    State(store): State<Arc<dyn Store>>,
    caller: CallerExtractor,
    Path(author): Path<UserId>,
    Query(params): Query<SubscriptionParams>,
) -> ApiResult<(StatusCode, Json<SubscriptionResponse>)> {
    let user = caller.require_user()?;
    refuse_self(user, author)?;

    let created = store.subscribe(user, author).await?;
    debug!(user_id = user.get(), author_id = author.get(), created, "Subscribed");

    let author = followed_author(store.as_ref(), author, params.recipes_limit).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SubscriptionResponse {
            author,
            is_subscribed: true,
        }),
    ))
}

/// DELETE /api/users/{id}/subscribe
pub async fn unsubscribe(
    State(store): State<Arc<dyn Store>>,
    caller: CallerExtractor,
    Path(author): Path<UserId>,
) -> ApiResult<StatusCode> {
    let user = caller.require_user()?;
    refuse_self(user, author)?;

    let removed = store.unsubscribe(user, author).await?;
    debug!(user_id = user.get(), author_id = author.get(), removed, "Unsubscribed");
    Ok(StatusCode::NO_CONTENT)
}

/// Routes nested under `/api/users`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list_subscriptions))
        .route("/:id/subscribe", post(subscribe).delete(unsubscribe))
}
