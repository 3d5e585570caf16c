//! Persisted entities and their read-side projections.

use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, StorageError};
use crate::identity::{IngredientId, RecipeId, TagId, Timestamp, UserId};

/// Reference ingredient with its unit of measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

/// Recipe tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// `#RRGGBB`
    pub color: String,
    pub slug: String,
}

impl Tag {
    /// Validate the tag's color and slug.
    pub fn validate(&self) -> Result<(), StorageError> {
        if !is_hex_color(&self.color) {
            return Err(StorageError::InvalidData {
                entity: EntityKind::Tag,
                reason: format!("color {:?} is not a #RRGGBB value", self.color),
            });
        }
        let slug_ok = !self.slug.is_empty()
            && self
                .slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !slug_ok {
            return Err(StorageError::InvalidData {
                entity: EntityKind::Tag,
                reason: format!("slug {:?} is not a valid slug", self.slug),
            });
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: u32,
}

/// Full recipe as served by the read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub author: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    /// Minutes, at least 1.
    pub cooking_time: u32,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
    pub created_at: Timestamp,
}

impl Recipe {
    /// Check the write-time invariants the aggregation relies on.
    pub fn validate(&self) -> Result<(), StorageError> {
        let invalid = |reason: String| StorageError::InvalidData {
            entity: EntityKind::Recipe,
            reason,
        };

        if self.cooking_time < 1 {
            return Err(invalid("cooking_time must be at least 1".to_string()));
        }
        if self.ingredients.is_empty() {
            return Err(invalid("a recipe needs at least one ingredient".to_string()));
        }
        for (i, line) in self.ingredients.iter().enumerate() {
            if line.amount < 1 {
                return Err(invalid(format!(
                    "amount for ingredient {} must be at least 1",
                    line.id
                )));
            }
            if self.ingredients[..i].iter().any(|prev| prev.id == line.id) {
                return Err(invalid(format!("ingredient {} listed twice", line.id)));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> RecipeSummary {
        RecipeSummary {
            id: self.id,
            name: self.name.clone(),
            image: self.image.clone(),
            cooking_time: self.cooking_time,
        }
    }

    pub fn has_tag_slug(&self, slug: &str) -> bool {
        self.tags.iter().any(|t| t.slug == slug)
    }
}

/// Short recipe form returned by the cart and favorite endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: u32,
}

/// Per-user recipe collections. Both are unique per (user, recipe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            RecipeList::Favorites => EntityKind::Favorite,
            RecipeList::ShoppingCart => EntityKind::CartEntry,
        }
    }

    /// Table backing this list in the relational schema.
    pub fn table_name(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "cart_entries",
        }
    }
}

/// Recipe list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeQuery {
    /// Match recipes carrying any of these tag slugs. Empty means no filter.
    pub tags: Vec<String>,
    pub author: Option<UserId>,
    pub favorited_by: Option<UserId>,
    pub in_cart_of: Option<UserId>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for RecipeQuery {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            author: None,
            favorited_by: None,
            in_cart_of: None,
            offset: 0,
            limit: 6,
        }
    }
}

/// One page of recipes plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipePage {
    pub count: usize,
    pub results: Vec<Recipe>,
}

/// Subscription list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionQuery {
    pub offset: usize,
    pub limit: usize,
    /// Cap on recipes returned per author. `None` returns them all.
    pub recipes_limit: Option<usize>,
}

impl Default for SubscriptionQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 6,
            recipes_limit: None,
        }
    }
}

/// An author the user follows, with their newest recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowedAuthor {
    pub id: UserId,
    pub recipes: Vec<RecipeSummary>,
    /// All of the author's recipes, regardless of `recipes_limit`.
    pub recipes_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPage {
    pub count: usize,
    pub results: Vec<FollowedAuthor>,
}
