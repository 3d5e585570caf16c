//! Pantry Storage - Store Trait, In-Memory Store and Cache Layer
//!
//! Defines the storage abstraction the HTTP layer and the shopping-list
//! pipeline read through. The PostgreSQL implementation lives in
//! `pantry-api` next to its connection pool.

pub mod aggregate;
pub mod cache;
pub mod memory;

pub use aggregate::Aggregator;
pub use cache::{
    init_backend, shopping_list_key, CacheBackend, CacheClock, CacheConfig, CacheRead,
    CacheStats, InMemoryCacheBackend, ManualClock, RedisCacheBackend, ShoppingListCache,
    SystemClock,
};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use pantry_core::{
    AggregatedLine, Ingredient, IngredientId, Recipe, RecipeId, RecipeList, RecipePage,
    RecipeQuery, RecipeSummary, StorageResult, SubscriptionPage, SubscriptionQuery, Tag, TagId,
    UserId,
};

// ============================================================================
// WRITE PAYLOADS
// ============================================================================

/// Payload for creating or replacing a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub author: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: u32,
    pub tag_ids: Vec<TagId>,
    /// (ingredient, amount) pairs, one per ingredient.
    pub ingredients: Vec<(IngredientId, u32)>,
}

/// Payload for inserting a tag.
#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Read access to reference data, recipe authoring, the per-user recipe
/// lists (favorites and shopping cart) and author subscriptions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> StorageResult<()>;

    // === Reference data ===

    /// All tags ordered by id.
    async fn tag_list(&self) -> StorageResult<Vec<Tag>>;

    async fn tag_get(&self, id: TagId) -> StorageResult<Option<Tag>>;

    /// Ingredients whose name starts with `prefix` (case-insensitive),
    /// ordered by name. `None` lists everything.
    async fn ingredient_search(&self, prefix: Option<&str>) -> StorageResult<Vec<Ingredient>>;

    async fn ingredient_get(&self, id: IngredientId) -> StorageResult<Option<Ingredient>>;

    // === Recipes ===

    async fn recipe_get(&self, id: RecipeId) -> StorageResult<Option<Recipe>>;

    /// Newest first.
    async fn recipe_list(&self, query: &RecipeQuery) -> StorageResult<RecipePage>;

    /// Insert a recipe with its tags and ingredient lines atomically.
    ///
    /// Unknown tag or ingredient ids are `InvalidData`.
    async fn recipe_create(&self, recipe: NewRecipe) -> StorageResult<Recipe>;

    /// Replace a recipe's fields, tags and ingredient lines atomically,
    /// keeping its id and creation time.
    ///
    /// Fails with `NotFound` for an unknown recipe and `NotAuthor` when
    /// `recipe.author` did not write it.
    async fn recipe_update(&self, id: RecipeId, recipe: NewRecipe) -> StorageResult<Recipe>;

    /// Delete a recipe along with every favorite and cart entry naming it.
    async fn recipe_delete(&self, id: RecipeId, author: UserId) -> StorageResult<()>;

    // === Per-user lists ===

    async fn list_contains(
        &self,
        list: RecipeList,
        user: UserId,
        recipe: RecipeId,
    ) -> StorageResult<bool>;

    /// Add a recipe to one of the user's lists.
    ///
    /// Fails with `NotFound` for an unknown recipe and `AlreadyExists` when
    /// the pair is already present.
    async fn list_add(
        &self,
        list: RecipeList,
        user: UserId,
        recipe: RecipeId,
    ) -> StorageResult<RecipeSummary>;

    /// Remove the user's own entry.
    ///
    /// Fails with `NotFound` for an unknown recipe and `RelationMissing` when
    /// this user has no such entry, even if other users do.
    async fn list_remove(&self, list: RecipeList, user: UserId, recipe: RecipeId)
        -> StorageResult<()>;

    // === Subscriptions ===

    /// Follow `author`. Returns `false` when already following.
    ///
    /// Following yourself is `InvalidData`.
    async fn subscribe(&self, user: UserId, author: UserId) -> StorageResult<bool>;

    /// Stop following `author`. Returns `false` when not following.
    async fn unsubscribe(&self, user: UserId, author: UserId) -> StorageResult<bool>;

    async fn is_subscribed(&self, user: UserId, author: UserId) -> StorageResult<bool>;

    /// Followed authors, most recently followed first, each with their
    /// newest recipes.
    async fn subscriptions(
        &self,
        user: UserId,
        query: &SubscriptionQuery,
    ) -> StorageResult<SubscriptionPage>;

    // === Shopping list ===

    /// Ingredient totals over every recipe in the user's cart, grouped by
    /// (name, unit) and ordered by name then unit.
    ///
    /// Implementations must read from a single consistent snapshot.
    async fn shopping_list(&self, user: UserId) -> StorageResult<Vec<AggregatedLine>>;
}
