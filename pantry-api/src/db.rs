//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres and the [`PgStore`]
//! implementation of [`Store`] over the tables in
//! `pantry-storage/sql/schema.sql`.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use pantry_core::{
    AggregatedLine, EntityKind, FollowedAuthor, Ingredient, IngredientId, Recipe, RecipeId,
    RecipeIngredient, RecipeList, RecipePage, RecipeQuery, RecipeSummary, StorageError,
    StorageResult, SubscriptionPage, SubscriptionQuery, Tag, TagId, Timestamp, UserId,
};
use pantry_storage::{NewRecipe, NewTag, Store};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio_postgres::{IsolationLevel, NoTls, Row, Transaction};

/// Schema the store reads from, applied by [`PgStore::apply_schema`].
pub const SCHEMA_SQL: &str = include_str!("../../pantry-storage/sql/schema.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// How long to wait for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "pantry".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from `PANTRY_DB_*` variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("PANTRY_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("PANTRY_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("PANTRY_DB_NAME").unwrap_or_else(|_| "pantry".to_string()),
            user: std::env::var("PANTRY_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("PANTRY_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("PANTRY_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("PANTRY_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pg(err: tokio_postgres::Error) -> StorageError {
    tracing::error!("Database error: {:?}", err);
    StorageError::Backend {
        reason: err.to_string(),
    }
}

fn pool(err: deadpool_postgres::PoolError) -> StorageError {
    tracing::error!("Connection pool error: {:?}", err);
    StorageError::Backend {
        reason: err.to_string(),
    }
}

fn to_u32(value: i32, entity: EntityKind, field: &str) -> StorageResult<u32> {
    u32::try_from(value).map_err(|_| StorageError::InvalidData {
        entity,
        reason: format!("{} {} is negative", field, value),
    })
}

fn to_i32(value: u32, entity: EntityKind, field: &str) -> StorageResult<i32> {
    i32::try_from(value).map_err(|_| StorageError::InvalidData {
        entity,
        reason: format!("{} {} is out of range", field, value),
    })
}

/// Escape LIKE metacharacters so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn tag_from_row(row: &Row) -> StorageResult<Tag> {
    Ok(Tag {
        id: TagId::new(row.try_get("id").map_err(pg)?),
        name: row.try_get("name").map_err(pg)?,
        color: row.try_get("color").map_err(pg)?,
        slug: row.try_get("slug").map_err(pg)?,
    })
}

fn ingredient_from_row(row: &Row) -> StorageResult<Ingredient> {
    Ok(Ingredient {
        id: IngredientId::new(row.try_get("id").map_err(pg)?),
        name: row.try_get("name").map_err(pg)?,
        measurement_unit: row.try_get("measurement_unit").map_err(pg)?,
    })
}

fn summary_from_row(row: &Row) -> StorageResult<RecipeSummary> {
    Ok(RecipeSummary {
        id: RecipeId::new(row.try_get("id").map_err(pg)?),
        name: row.try_get("name").map_err(pg)?,
        image: row.try_get("image").map_err(pg)?,
        cooking_time: to_u32(
            row.try_get("cooking_time").map_err(pg)?,
            EntityKind::Recipe,
            "cooking_time",
        )?,
    })
}

const RECIPE_COLUMNS: &str =
    "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.created_at";

/// Load full recipes for `rows` (selected with [`RECIPE_COLUMNS`]),
/// keeping row order.
async fn hydrate_recipes(tx: &Transaction<'_>, rows: &[Row]) -> StorageResult<Vec<Recipe>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids = rows
        .iter()
        .map(|row| row.try_get::<_, i64>("id").map_err(pg))
        .collect::<StorageResult<Vec<i64>>>()?;

    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in tx
        .query(
            "SELECT rt.recipe_id, t.id, t.name, t.color, t.slug \
             FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = ANY($1) \
             ORDER BY t.id",
            &[&ids],
        )
        .await
        .map_err(pg)?
    {
        let recipe_id: i64 = row.try_get("recipe_id").map_err(pg)?;
        tags.entry(recipe_id).or_default().push(tag_from_row(&row)?);
    }

    let mut ingredients: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
    for row in tx
        .query(
            "SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount \
             FROM recipe_ingredients ri JOIN ingredients i ON i.id = ri.ingredient_id \
             WHERE ri.recipe_id = ANY($1) \
             ORDER BY i.id",
            &[&ids],
        )
        .await
        .map_err(pg)?
    {
        let recipe_id: i64 = row.try_get("recipe_id").map_err(pg)?;
        ingredients.entry(recipe_id).or_default().push(RecipeIngredient {
            id: IngredientId::new(row.try_get("id").map_err(pg)?),
            name: row.try_get("name").map_err(pg)?,
            measurement_unit: row.try_get("measurement_unit").map_err(pg)?,
            amount: to_u32(row.try_get("amount").map_err(pg)?, EntityKind::Recipe, "amount")?,
        });
    }

    rows.iter()
        .map(|row| {
            let id: i64 = row.try_get("id").map_err(pg)?;
            let created_at: Timestamp = row.try_get("created_at").map_err(pg)?;
            Ok(Recipe {
                id: RecipeId::new(id),
                author: UserId::new(row.try_get("author_id").map_err(pg)?),
                name: row.try_get("name").map_err(pg)?,
                image: row.try_get("image").map_err(pg)?,
                text: row.try_get("text").map_err(pg)?,
                cooking_time: to_u32(
                    row.try_get("cooking_time").map_err(pg)?,
                    EntityKind::Recipe,
                    "cooking_time",
                )?,
                tags: tags.remove(&id).unwrap_or_default(),
                ingredients: ingredients.remove(&id).unwrap_or_default(),
                created_at,
            })
        })
        .collect()
}

// ============================================================================
// RECIPE WRITES
// ============================================================================

/// Reject tag or ingredient ids with no row behind them.
async fn check_references(tx: &Transaction<'_>, recipe: &NewRecipe) -> StorageResult<()> {
    let invalid = |reason: String| StorageError::InvalidData {
        entity: EntityKind::Recipe,
        reason,
    };

    let tag_ids: Vec<i64> = recipe.tag_ids.iter().map(|id| id.get()).collect();
    let found = existing_ids(tx, "tags", &tag_ids).await?;
    if let Some(id) = tag_ids.iter().find(|id| !found.contains(id)) {
        return Err(invalid(format!("unknown tag {}", id)));
    }

    let ingredient_ids: Vec<i64> = recipe.ingredients.iter().map(|(id, _)| id.get()).collect();
    let found = existing_ids(tx, "ingredients", &ingredient_ids).await?;
    if let Some(id) = ingredient_ids.iter().find(|id| !found.contains(id)) {
        return Err(invalid(format!("unknown ingredient {}", id)));
    }
    Ok(())
}

async fn existing_ids(
    tx: &Transaction<'_>,
    table: &str,
    ids: &[i64],
) -> StorageResult<HashSet<i64>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    tx.query(
        format!("SELECT id FROM {} WHERE id = ANY($1)", table).as_str(),
        &[&ids],
    )
    .await
    .map_err(pg)?
    .iter()
    .map(|row| row.try_get::<_, i64>("id").map_err(pg))
    .collect()
}

/// Write the tag and ingredient rows for recipe `id`.
async fn insert_recipe_lines(
    tx: &Transaction<'_>,
    id: i64,
    recipe: &NewRecipe,
) -> StorageResult<()> {
    for tag_id in &recipe.tag_ids {
        tx.execute(
            "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[&id, &tag_id.get()],
        )
        .await
        .map_err(pg)?;
    }
    for (ingredient_id, amount) in &recipe.ingredients {
        let amount = to_i32(*amount, EntityKind::Recipe, "amount")?;
        tx.execute(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) \
             VALUES ($1, $2, $3)",
            &[&id, &ingredient_id.get(), &amount],
        )
        .await
        .map_err(pg)?;
    }
    Ok(())
}

/// Reload recipe `id` inside `tx` and check it before the caller commits.
async fn load_valid_recipe(tx: &Transaction<'_>, id: i64) -> StorageResult<Recipe> {
    let rows = tx
        .query(
            format!("SELECT {} FROM recipes r WHERE r.id = $1", RECIPE_COLUMNS).as_str(),
            &[&id],
        )
        .await
        .map_err(pg)?;
    let recipe = hydrate_recipes(tx, &rows)
        .await?
        .pop()
        .ok_or(StorageError::NotFound {
            entity: EntityKind::Recipe,
            id,
        })?;
    recipe.validate()?;
    Ok(recipe)
}

/// Lock recipe `id` for writing, provided `author` wrote it.
async fn lock_owned_recipe(
    tx: &Transaction<'_>,
    id: RecipeId,
    author: UserId,
) -> StorageResult<()> {
    let row = tx
        .query_opt(
            "SELECT author_id FROM recipes WHERE id = $1 FOR UPDATE",
            &[&id.get()],
        )
        .await
        .map_err(pg)?
        .ok_or(StorageError::NotFound {
            entity: EntityKind::Recipe,
            id: id.get(),
        })?;
    let owner: i64 = row.try_get("author_id").map_err(pg)?;
    if owner != author.get() {
        return Err(StorageError::NotAuthor { recipe_id: id.get() });
    }
    Ok(())
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// [`Store`] over a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

impl PgStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool)
    }

    /// Create missing tables and indexes.
    pub async fn apply_schema(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL).await.map_err(pg)
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    /// Insert reference ingredients in one transaction. Returns the number
    /// of rows written.
    pub async fn insert_ingredients(&self, rows: &[(String, String)]) -> StorageResult<u64> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(pg)?;
        let stmt = tx
            .prepare("INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2)")
            .await
            .map_err(pg)?;

        let mut written = 0;
        for (name, unit) in rows {
            written += tx
                .execute(&stmt, &[&name.as_str(), &unit.as_str()])
                .await
                .map_err(pg)?;
        }
        tx.commit().await.map_err(pg)?;
        Ok(written)
    }

    pub async fn insert_tag(&self, tag: NewTag) -> StorageResult<Tag> {
        let candidate = Tag {
            id: TagId::new(0),
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        };
        candidate.validate()?;

        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) \
                 RETURNING id, name, color, slug",
                &[&candidate.name, &candidate.color, &candidate.slug],
            )
            .await
            .map_err(pg)?;
        tag_from_row(&row)
    }

    async fn recipe_summary(
        &self,
        conn: &deadpool_postgres::Object,
        recipe: RecipeId,
    ) -> StorageResult<RecipeSummary> {
        let row = conn
            .query_opt(
                "SELECT id, name, image, cooking_time FROM recipes WHERE id = $1",
                &[&recipe.get()],
            )
            .await
            .map_err(pg)?
            .ok_or(StorageError::NotFound {
                entity: EntityKind::Recipe,
                id: recipe.get(),
            })?;
        summary_from_row(&row)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(pg)?;
        Ok(())
    }

    async fn tag_list(&self) -> StorageResult<Vec<Tag>> {
        let conn = self.get_conn().await?;
        conn.query("SELECT id, name, color, slug FROM tags ORDER BY id", &[])
            .await
            .map_err(pg)?
            .iter()
            .map(tag_from_row)
            .collect()
    }

    async fn tag_get(&self, id: TagId) -> StorageResult<Option<Tag>> {
        let conn = self.get_conn().await?;
        conn.query_opt(
            "SELECT id, name, color, slug FROM tags WHERE id = $1",
            &[&id.get()],
        )
        .await
        .map_err(pg)?
        .as_ref()
        .map(tag_from_row)
        .transpose()
    }

    async fn ingredient_search(&self, prefix: Option<&str>) -> StorageResult<Vec<Ingredient>> {
        let conn = self.get_conn().await?;
        let pattern = format!("{}%", escape_like(&prefix.unwrap_or_default().to_lowercase()));
        conn.query(
            "SELECT id, name, measurement_unit FROM ingredients \
             WHERE lower(name) LIKE $1 ESCAPE '\\' \
             ORDER BY name COLLATE \"C\", id",
            &[&pattern],
        )
        .await
        .map_err(pg)?
        .iter()
        .map(ingredient_from_row)
        .collect()
    }

    async fn ingredient_get(&self, id: IngredientId) -> StorageResult<Option<Ingredient>> {
        let conn = self.get_conn().await?;
        conn.query_opt(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
            &[&id.get()],
        )
        .await
        .map_err(pg)?
        .as_ref()
        .map(ingredient_from_row)
        .transpose()
    }

    async fn recipe_get(&self, id: RecipeId) -> StorageResult<Option<Recipe>> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(pg)?;

        let rows = tx
            .query(
                format!("SELECT {} FROM recipes r WHERE r.id = $1", RECIPE_COLUMNS).as_str(),
                &[&id.get()],
            )
            .await
            .map_err(pg)?;
        let recipe = hydrate_recipes(&tx, &rows).await?.pop();
        tx.commit().await.map_err(pg)?;
        Ok(recipe)
    }

    async fn recipe_list(&self, query: &RecipeQuery) -> StorageResult<RecipePage> {
        const FILTER: &str = "\
            ($1::BIGINT IS NULL OR r.author_id = $1) \
            AND (cardinality($2::TEXT[]) = 0 OR EXISTS ( \
                SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                WHERE rt.recipe_id = r.id AND t.slug = ANY($2))) \
            AND ($3::BIGINT IS NULL OR EXISTS ( \
                SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $3)) \
            AND ($4::BIGINT IS NULL OR EXISTS ( \
                SELECT 1 FROM cart_entries c WHERE c.recipe_id = r.id AND c.user_id = $4))";

        let author = query.author.map(UserId::get);
        let favorited_by = query.favorited_by.map(UserId::get);
        let in_cart_of = query.in_cart_of.map(UserId::get);
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);

        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(pg)?;

        let count: i64 = tx
            .query_one(
                format!("SELECT COUNT(*) FROM recipes r WHERE {}", FILTER).as_str(),
                &[&author, &query.tags, &favorited_by, &in_cart_of],
            )
            .await
            .map_err(pg)?
            .try_get(0)
            .map_err(pg)?;

        let rows = tx
            .query(
                format!(
                    "SELECT {} FROM recipes r WHERE {} \
                     ORDER BY r.created_at DESC, r.id DESC LIMIT $5 OFFSET $6",
                    RECIPE_COLUMNS, FILTER
                ).as_str(),
                &[&author, &query.tags, &favorited_by, &in_cart_of, &limit, &offset],
            )
            .await
            .map_err(pg)?;
        let results = hydrate_recipes(&tx, &rows).await?;
        tx.commit().await.map_err(pg)?;

        Ok(RecipePage {
            count: usize::try_from(count).unwrap_or_default(),
            results,
        })
    }

    async fn recipe_create(&self, recipe: NewRecipe) -> StorageResult<Recipe> {
        let cooking_time = to_i32(recipe.cooking_time, EntityKind::Recipe, "cooking_time")?;
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(pg)?;
        check_references(&tx, &recipe).await?;

        let id: i64 = tx
            .query_one(
                "INSERT INTO recipes (author_id, name, image, text, cooking_time) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &recipe.author.get(),
                    &recipe.name,
                    &recipe.image,
                    &recipe.text,
                    &cooking_time,
                ],
            )
            .await
            .map_err(pg)?
            .try_get("id")
            .map_err(pg)?;
        insert_recipe_lines(&tx, id, &recipe).await?;

        let created = load_valid_recipe(&tx, id).await?;
        tx.commit().await.map_err(pg)?;
        Ok(created)
    }

    async fn recipe_update(&self, id: RecipeId, recipe: NewRecipe) -> StorageResult<Recipe> {
        let cooking_time = to_i32(recipe.cooking_time, EntityKind::Recipe, "cooking_time")?;
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(pg)?;
        lock_owned_recipe(&tx, id, recipe.author).await?;
        check_references(&tx, &recipe).await?;

        tx.execute(
            "UPDATE recipes SET name = $2, image = $3, text = $4, cooking_time = $5 \
             WHERE id = $1",
            &[&id.get(), &recipe.name, &recipe.image, &recipe.text, &cooking_time],
        )
        .await
        .map_err(pg)?;
        tx.execute("DELETE FROM recipe_tags WHERE recipe_id = $1", &[&id.get()])
            .await
            .map_err(pg)?;
        tx.execute("DELETE FROM recipe_ingredients WHERE recipe_id = $1", &[&id.get()])
            .await
            .map_err(pg)?;
        insert_recipe_lines(&tx, id.get(), &recipe).await?;

        let updated = load_valid_recipe(&tx, id.get()).await?;
        tx.commit().await.map_err(pg)?;
        Ok(updated)
    }

    async fn recipe_delete(&self, id: RecipeId, author: UserId) -> StorageResult<()> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(pg)?;
        lock_owned_recipe(&tx, id, author).await?;
        // Tags, ingredient lines, favorites and cart entries cascade.
        tx.execute("DELETE FROM recipes WHERE id = $1", &[&id.get()])
            .await
            .map_err(pg)?;
        tx.commit().await.map_err(pg)
    }

    async fn list_contains(
        &self,
        list: RecipeList,
        user: UserId,
        recipe: RecipeId,
    ) -> StorageResult<bool> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                format!(
                    "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1 AND recipe_id = $2)",
                    list.table_name()
                ).as_str(),
                &[&user.get(), &recipe.get()],
            )
            .await
            .map_err(pg)?;
        row.try_get(0).map_err(pg)
    }

    async fn list_add(
        &self,
        list: RecipeList,
        user: UserId,
        recipe: RecipeId,
    ) -> StorageResult<RecipeSummary> {
        let conn = self.get_conn().await?;
        let summary = self.recipe_summary(&conn, recipe).await?;

        let inserted = conn
            .execute(
                format!(
                    "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                    list.table_name()
                ).as_str(),
                &[&user.get(), &recipe.get()],
            )
            .await
            .map_err(pg)?;

        if inserted == 0 {
            return Err(StorageError::AlreadyExists {
                entity: list.entity_kind(),
                recipe_id: recipe.get(),
            });
        }
        Ok(summary)
    }

    async fn list_remove(
        &self,
        list: RecipeList,
        user: UserId,
        recipe: RecipeId,
    ) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        self.recipe_summary(&conn, recipe).await?;

        let deleted = conn
            .execute(
                format!(
                    "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
                    list.table_name()
                ).as_str(),
                &[&user.get(), &recipe.get()],
            )
            .await
            .map_err(pg)?;

        if deleted == 0 {
            return Err(StorageError::RelationMissing {
                entity: list.entity_kind(),
                recipe_id: recipe.get(),
            });
        }
        Ok(())
    }

    async fn subscribe(&self, user: UserId, author: UserId) -> StorageResult<bool> {
        if user == author {
            return Err(StorageError::InvalidData {
                entity: EntityKind::Subscription,
                reason: "users cannot follow themselves".to_string(),
            });
        }
        let conn = self.get_conn().await?;
        let inserted = conn
            .execute(
                "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
                &[&user.get(), &author.get()],
            )
            .await
            .map_err(pg)?;
        Ok(inserted == 1)
    }

    async fn unsubscribe(&self, user: UserId, author: UserId) -> StorageResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2",
                &[&user.get(), &author.get()],
            )
            .await
            .map_err(pg)?;
        Ok(deleted == 1)
    }

    async fn is_subscribed(&self, user: UserId, author: UserId) -> StorageResult<bool> {
        let conn = self.get_conn().await?;
        conn.query_one(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2)",
            &[&user.get(), &author.get()],
        )
        .await
        .map_err(pg)?
        .try_get(0)
        .map_err(pg)
    }

    async fn subscriptions(
        &self,
        user: UserId,
        query: &SubscriptionQuery,
    ) -> StorageResult<SubscriptionPage> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        let recipes_limit = query
            .recipes_limit
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX));

        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(pg)?;

        let count: i64 = tx
            .query_one(
                "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1",
                &[&user.get()],
            )
            .await
            .map_err(pg)?
            .try_get(0)
            .map_err(pg)?;

        let authors = tx
            .query(
                "SELECT author_id FROM subscriptions WHERE user_id = $1 \
                 ORDER BY id DESC LIMIT $2 OFFSET $3",
                &[&user.get(), &limit, &offset],
            )
            .await
            .map_err(pg)?
            .iter()
            .map(|row| row.try_get::<_, i64>("author_id").map_err(pg))
            .collect::<StorageResult<Vec<i64>>>()?;

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for row in tx
            .query(
                "SELECT author_id, COUNT(*) AS total FROM recipes \
                 WHERE author_id = ANY($1) GROUP BY author_id",
                &[&authors],
            )
            .await
            .map_err(pg)?
        {
            let total: i64 = row.try_get("total").map_err(pg)?;
            counts.insert(
                row.try_get("author_id").map_err(pg)?,
                usize::try_from(total).unwrap_or_default(),
            );
        }

        let mut recipes: HashMap<i64, Vec<RecipeSummary>> = HashMap::new();
        for row in tx
            .query(
                "SELECT id, author_id, name, image, cooking_time FROM ( \
                     SELECT r.*, row_number() OVER ( \
                         PARTITION BY r.author_id ORDER BY r.created_at DESC, r.id DESC \
                     ) AS recipe_rank \
                     FROM recipes r WHERE r.author_id = ANY($1) \
                 ) ranked \
                 WHERE $2::BIGINT IS NULL OR recipe_rank <= $2 \
                 ORDER BY author_id, recipe_rank",
                &[&authors, &recipes_limit],
            )
            .await
            .map_err(pg)?
        {
            let author: i64 = row.try_get("author_id").map_err(pg)?;
            recipes.entry(author).or_default().push(summary_from_row(&row)?);
        }
        tx.commit().await.map_err(pg)?;

        Ok(SubscriptionPage {
            count: usize::try_from(count).unwrap_or_default(),
            results: authors
                .into_iter()
                .map(|author| FollowedAuthor {
                    id: UserId::new(author),
                    recipes_count: counts.get(&author).copied().unwrap_or_default(),
                    recipes: recipes.remove(&author).unwrap_or_default(),
                })
                .collect(),
        })
    }

    async fn shopping_list(&self, user: UserId) -> StorageResult<Vec<AggregatedLine>> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(pg)?;

        let rows = tx
            .query(
                "SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS amount \
                 FROM cart_entries c \
                 JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id \
                 JOIN ingredients i ON i.id = ri.ingredient_id \
                 WHERE c.user_id = $1 \
                 GROUP BY i.name, i.measurement_unit \
                 ORDER BY i.name COLLATE \"C\", i.measurement_unit COLLATE \"C\"",
                &[&user.get()],
            )
            .await
            .map_err(pg)?;
        tx.commit().await.map_err(pg)?;

        rows.iter()
            .map(|row| {
                let amount: i64 = row.try_get("amount").map_err(pg)?;
                Ok(AggregatedLine::new(
                    row.try_get::<_, String>("name").map_err(pg)?,
                    row.try_get::<_, String>("measurement_unit").map_err(pg)?,
                    u64::try_from(amount).map_err(|_| StorageError::InvalidData {
                        entity: EntityKind::Ingredient,
                        reason: format!("negative total {}", amount),
                    })?,
                ))
            })
            .collect()
    }
}
