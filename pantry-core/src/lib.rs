//! Pantry Core - Entity Types
//!
//! Data structures shared by every Pantry crate: identities, persisted
//! entities, the shopping-list aggregation rule and the error taxonomy.
//! No I/O lives here.

pub mod entities;
pub mod error;
pub mod identity;
pub mod shopping;

pub use entities::{
    FollowedAuthor, Ingredient, Recipe, RecipeIngredient, RecipeList, RecipePage, RecipeQuery,
    RecipeSummary, SubscriptionPage, SubscriptionQuery, Tag,
};
pub use error::{
    CacheError, ConfigError, EntityKind, PantryError, PantryResult, RenderError, StorageError,
    StorageResult,
};
pub use identity::{Caller, IngredientId, RecipeId, TagId, Timestamp, UserId};
pub use shopping::{aggregate_amounts, AggregatedLine, IngredientAmount};
