//! Recipe REST API Routes
//!
//! Recipe reads, author-only writes and the shopping-list download. The
//! per-user cart and favorite toggles live in [`super::lists`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pantry_core::{Caller, IngredientId, Recipe, RecipeId, RecipeList, RecipeQuery, TagId, UserId};
use pantry_storage::{NewRecipe, Store};
use tracing::info;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CallerExtractor;
use crate::services::ShoppingListService;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 6;
const MAX_PAGE_SIZE: usize = 100;
const MAX_NAME_LEN: usize = 200;

// ============================================================================
// TYPES
// ============================================================================

/// Recipe as seen by a particular caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeResponse {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    /// Whether the caller follows the recipe's author.
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeListResponse {
    pub count: usize,
    pub results: Vec<RecipeResponse>,
}

/// One `{ "id", "amount" }` line of a recipe write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub id: IngredientId,
    pub amount: u32,
}

/// Body of `POST /api/recipes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub ingredients: Vec<IngredientLine>,
}

/// Body of `PATCH /api/recipes/{id}`. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecipeRequest {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<u32>,
    pub tags: Option<Vec<TagId>>,
    pub ingredients: Option<Vec<IngredientLine>>,
}

fn check_name(name: &str) -> ApiResult<()> {
    if name.trim().is_empty() {
        return Err(ApiError::invalid_input("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::invalid_input(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn ingredient_pairs(lines: Vec<IngredientLine>) -> Vec<(IngredientId, u32)> {
    lines.into_iter().map(|line| (line.id, line.amount)).collect()
}

impl CreateRecipeRequest {
    pub fn into_new_recipe(self, author: UserId) -> ApiResult<NewRecipe> {
        check_name(&self.name)?;
        Ok(NewRecipe {
            author,
            name: self.name,
            image: self.image,
            text: self.text,
            cooking_time: self.cooking_time,
            tag_ids: self.tags,
            ingredients: ingredient_pairs(self.ingredients),
        })
    }
}

impl UpdateRecipeRequest {
    /// Overlay the supplied fields on `current`.
    pub fn apply_to(self, current: Recipe) -> ApiResult<NewRecipe> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        Ok(NewRecipe {
            author: current.author,
            name: self.name.unwrap_or(current.name),
            image: self.image.unwrap_or(current.image),
            text: self.text.unwrap_or(current.text),
            cooking_time: self.cooking_time.unwrap_or(current.cooking_time),
            tag_ids: match self.tags {
                Some(tags) => tags,
                None => current.tags.iter().map(|t| t.id).collect(),
            },
            ingredients: match self.ingredients {
                Some(lines) => ingredient_pairs(lines),
                None => current
                    .ingredients
                    .iter()
                    .map(|line| (line.id, line.amount))
                    .collect(),
            },
        })
    }
}

/// Query string for `GET /api/recipes`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListParams {
    /// 1-based page number.
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// Comma-separated tag slugs; a recipe matches if it has any of them.
    pub tags: Option<String>,
    pub author: Option<i64>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

/// `(offset, limit)` for a 1-based `page` of `limit` items, with the
/// limit capped.
pub(crate) fn page_window(page: Option<usize>, limit: Option<usize>) -> ApiResult<(usize, usize)> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 {
        return Err(ApiError::invalid_input("limit must be at least 1"));
    }
    let limit = limit.min(MAX_PAGE_SIZE);

    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(ApiError::invalid_input("page numbers start at 1"));
    }
    Ok(((page - 1).saturating_mul(limit), limit))
}

fn parse_flag(field: &str, value: Option<&str>) -> ApiResult<bool> {
    match value.map(str::trim) {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(_) => Err(ApiError::invalid_format(field, "0, 1, true or false")),
    }
}

impl RecipeListParams {
    /// Build the store query. The favorite and cart filters only apply to
    /// authenticated callers and are ignored otherwise.
    pub fn into_query(self, caller: &Caller) -> ApiResult<RecipeQuery> {
        let (offset, limit) = page_window(self.page, self.limit)?;

        let tags = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_string)
            .collect();

        let user = caller.user_id();
        let favorited = parse_flag("is_favorited", self.is_favorited.as_deref())?;
        let in_cart = parse_flag("is_in_shopping_cart", self.is_in_shopping_cart.as_deref())?;

        Ok(RecipeQuery {
            tags,
            author: self.author.map(UserId::new),
            favorited_by: user.filter(|_| favorited),
            in_cart_of: user.filter(|_| in_cart),
            offset,
            limit,
        })
    }
}

async fn annotate(store: &dyn Store, caller: &Caller, recipe: Recipe) -> ApiResult<RecipeResponse> {
    let (is_favorited, is_in_shopping_cart, is_subscribed) = match caller.user_id() {
        Some(user) => (
            store.list_contains(RecipeList::Favorites, user, recipe.id).await?,
            store
                .list_contains(RecipeList::ShoppingCart, user, recipe.id)
                .await?,
            store.is_subscribed(user, recipe.author).await?,
        ),
        None => (false, false, false),
    };
    Ok(RecipeResponse {
        recipe,
        is_favorited,
        is_in_shopping_cart,
        is_subscribed,
    })
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/recipes - Newest first, paginated
pub async fn list_recipes(
    State(store): State<Arc<dyn Store>>,
    CallerExtractor(caller): CallerExtractor,
    Query(params): Query<RecipeListParams>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_query(&caller)?;
    let page = store.recipe_list(&query).await?;

    let mut results = Vec::with_capacity(page.results.len());
    for recipe in page.results {
        results.push(annotate(store.as_ref(), &caller, recipe).await?);
    }

    Ok(Json(RecipeListResponse {
        count: page.count,
        results,
    }))
}

/// GET /api/recipes/{id}
pub async fn get_recipe(
    State(store): State<Arc<dyn Store>>,
    CallerExtractor(caller): CallerExtractor,
    Path(id): Path<RecipeId>,
) -> ApiResult<impl IntoResponse> {
    let recipe = store
        .recipe_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Recipe", id))?;
    Ok(Json(annotate(store.as_ref(), &caller, recipe).await?))
}

/// POST /api/recipes - Create a recipe authored by the caller
pub async fn create_recipe(
    State(store): State<Arc<dyn Store>>,
    CallerExtractor(caller): CallerExtractor,
    Json(req): Json<CreateRecipeRequest>,
) -> ApiResult<impl IntoResponse> {
    let author = caller.require_user()?;
    let recipe = store.recipe_create(req.into_new_recipe(author)?).await?;
    info!(user_id = author.get(), recipe_id = recipe.id.get(), "Recipe created");
    Ok((
        StatusCode::CREATED,
        Json(annotate(store.as_ref(), &caller, recipe).await?),
    ))
}

/// PATCH /api/recipes/{id} - Author only
pub async fn update_recipe(
    State(store): State<Arc<dyn Store>>,
    CallerExtractor(caller): CallerExtractor,
    Path(id): Path<RecipeId>,
    Json(req): Json<UpdateRecipeRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = caller.require_user()?;
    let current = store
        .recipe_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Recipe", id))?;
    if current.author != user {
        return Err(ApiError::forbidden(format!(
            "Recipe {} belongs to another author",
            id
        )));
    }

    let recipe = store.recipe_update(id, req.apply_to(current)?).await?;
    info!(user_id = user.get(), recipe_id = id.get(), "Recipe updated");
    Ok(Json(annotate(store.as_ref(), &caller, recipe).await?))
}

/// DELETE /api/recipes/{id} - Author only
pub async fn delete_recipe(
    State(store): State<Arc<dyn Store>>,
    CallerExtractor(caller): CallerExtractor,
    Path(id): Path<RecipeId>,
) -> ApiResult<StatusCode> {
    let user = caller.require_user()?;
    store.recipe_delete(id, user).await?;
    info!(user_id = user.get(), recipe_id = id.get(), "Recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/recipes/download_shopping_cart - The caller's shopping list as PDF
pub async fn download_shopping_cart(
    State(service): State<ShoppingListService>,
    CallerExtractor(caller): CallerExtractor,
) -> ApiResult<Response> {
    let document = service.download(&caller).await?;

    let headers = [
        (header::CONTENT_TYPE, document.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.filename),
        ),
    ];
    Ok((headers, document.bytes).into_response())
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the recipe routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recipes).post(create_recipe))
        .route("/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/:id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .merge(super::lists::create_router())
}
