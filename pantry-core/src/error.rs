//! Error types for Pantry operations

use thiserror::Error;

/// Kind of persisted entity, used in storage error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Recipe,
    Ingredient,
    Tag,
    CartEntry,
    Favorite,
    Subscription,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::User => "user",
            EntityKind::Recipe => "recipe",
            EntityKind::Ingredient => "ingredient",
            EntityKind::Tag => "tag",
            EntityKind::CartEntry => "shopping cart entry",
            EntityKind::Favorite => "favorite",
            EntityKind::Subscription => "subscription",
        };
        f.write_str(name)
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("{entity} already exists for recipe {recipe_id}")]
    AlreadyExists { entity: EntityKind, recipe_id: i64 },

    #[error("{entity} does not exist for recipe {recipe_id}")]
    RelationMissing { entity: EntityKind, recipe_id: i64 },

    #[error("recipe {recipe_id} belongs to another author")]
    NotAuthor { recipe_id: i64 },

    #[error("Invalid data for {entity}: {reason}")]
    InvalidData { entity: EntityKind, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend failure: {reason}")]
    Backend { reason: String },
}

/// Cache backend errors.
///
/// None of these reach the client: the shopping-list accessor logs them and
/// falls through to direct aggregation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache entry {key} could not be decoded: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Document rendering errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Nothing to render")]
    EmptyInput,

    #[error("Font {path} unavailable: {reason}")]
    FontUnavailable { path: String, reason: String },

    #[error("Document encoding failed: {reason}")]
    Encoding { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Pantry errors.
#[derive(Debug, Clone, Error)]
pub enum PantryError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Pantry operations.
pub type PantryResult<T> = Result<T, PantryError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// TESTS
// =============================================================================
