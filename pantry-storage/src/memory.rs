//! In-memory [`Store`] used for tests and `PANTRY_STORAGE=memory` runs.
//!
//! All tables sit behind one `RwLock`, so a shopping-list aggregation reads
//! a single snapshot even while carts are being edited.

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use pantry_core::{
    aggregate_amounts, AggregatedLine, EntityKind, FollowedAuthor, Ingredient, IngredientAmount,
    IngredientId, Recipe, RecipeId, RecipeIngredient, RecipeList, RecipePage, RecipeQuery,
    RecipeSummary, StorageError, StorageResult, SubscriptionPage, SubscriptionQuery, Tag, TagId,
    Timestamp, UserId,
};

use crate::{NewRecipe, NewTag, Store};

/// Recipe row as stored: references, not denormalized names.
#[derive(Debug, Clone)]
struct StoredRecipe {
    id: RecipeId,
    author: UserId,
    name: String,
    image: String,
    text: String,
    cooking_time: u32,
    tag_ids: Vec<TagId>,
    ingredients: Vec<(IngredientId, u32)>,
    created_at: Timestamp,
}

impl StoredRecipe {
    fn from_new(id: RecipeId, recipe: NewRecipe, created_at: Timestamp) -> Self {
        let mut tag_ids = recipe.tag_ids;
        tag_ids.sort();
        tag_ids.dedup();
        Self {
            id,
            author: recipe.author,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            tag_ids,
            ingredients: recipe.ingredients,
            created_at,
        }
    }

    fn summary(&self) -> RecipeSummary {
        RecipeSummary {
            id: self.id,
            name: self.name.clone(),
            image: self.image.clone(),
            cooking_time: self.cooking_time,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    tags: BTreeMap<TagId, Tag>,
    ingredients: BTreeMap<IngredientId, Ingredient>,
    recipes: BTreeMap<RecipeId, StoredRecipe>,
    favorites: HashSet<(UserId, RecipeId)>,
    cart: HashSet<(UserId, RecipeId)>,
    /// (follower, author) in the order they were created.
    subscriptions: Vec<(UserId, UserId)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn list(&self, list: RecipeList) -> &HashSet<(UserId, RecipeId)> {
        match list {
            RecipeList::Favorites => &self.favorites,
            RecipeList::ShoppingCart => &self.cart,
        }
    }

    fn list_mut(&mut self, list: RecipeList) -> &mut HashSet<(UserId, RecipeId)> {
        match list {
            RecipeList::Favorites => &mut self.favorites,
            RecipeList::ShoppingCart => &mut self.cart,
        }
    }

    fn check_references(&self, recipe: &StoredRecipe) -> StorageResult<()> {
        let invalid = |reason: String| StorageError::InvalidData {
            entity: EntityKind::Recipe,
            reason,
        };
        if let Some(id) = recipe.tag_ids.iter().find(|id| !self.tags.contains_key(id)) {
            return Err(invalid(format!("unknown tag {}", id)));
        }
        if let Some((id, _)) = recipe
            .ingredients
            .iter()
            .find(|(id, _)| !self.ingredients.contains_key(id))
        {
            return Err(invalid(format!("unknown ingredient {}", id)));
        }
        Ok(())
    }

    /// Validate `stored` and write it, replacing any row with the same id.
    fn put_recipe(&mut self, stored: StoredRecipe) -> StorageResult<Recipe> {
        self.check_references(&stored)?;
        let hydrated = self.hydrate(&stored)?;
        hydrated.validate()?;
        self.recipes.insert(stored.id, stored);
        Ok(hydrated)
    }

    /// The recipe `id`, provided `author` wrote it.
    fn owned_recipe(&self, id: RecipeId, author: UserId) -> StorageResult<&StoredRecipe> {
        let stored = self.recipes.get(&id).ok_or(StorageError::NotFound {
            entity: EntityKind::Recipe,
            id: id.get(),
        })?;
        if stored.author != author {
            return Err(StorageError::NotAuthor { recipe_id: id.get() });
        }
        Ok(stored)
    }

    /// An author's recipes, newest first.
    fn authored_by(&self, author: UserId) -> Vec<&StoredRecipe> {
        let mut recipes: Vec<&StoredRecipe> = self
            .recipes
            .values()
            .filter(|r| r.author == author)
            .collect();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        recipes
    }

    fn hydrate(&self, stored: &StoredRecipe) -> StorageResult<Recipe> {
        let tags = stored
            .tag_ids
            .iter()
            .map(|id| {
                self.tags.get(id).cloned().ok_or(StorageError::NotFound {
                    entity: EntityKind::Tag,
                    id: id.get(),
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let ingredients = stored
            .ingredients
            .iter()
            .map(|(id, amount)| {
                let ingredient = self.ingredients.get(id).ok_or(StorageError::NotFound {
                    entity: EntityKind::Ingredient,
                    id: id.get(),
                })?;
                Ok(RecipeIngredient {
                    id: *id,
                    name: ingredient.name.clone(),
                    measurement_unit: ingredient.measurement_unit.clone(),
                    amount: *amount,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Recipe {
            id: stored.id,
            author: stored.author,
            name: stored.name.clone(),
            image: stored.image.clone(),
            text: stored.text.clone(),
            cooking_time: stored.cooking_time,
            tags,
            ingredients,
            created_at: stored.created_at,
        })
    }

    fn matches(&self, stored: &StoredRecipe, query: &RecipeQuery) -> bool {
        if let Some(author) = query.author {
            if stored.author != author {
                return false;
            }
        }
        if let Some(user) = query.favorited_by {
            if !self.favorites.contains(&(user, stored.id)) {
                return false;
            }
        }
        if let Some(user) = query.in_cart_of {
            if !self.cart.contains(&(user, stored.id)) {
                return false;
            }
        }
        if !query.tags.is_empty() {
            let has_any = stored.tag_ids.iter().any(|id| {
                self.tags
                    .get(id)
                    .map(|tag| query.tags.iter().any(|slug| *slug == tag.slug))
                    .unwrap_or(false)
            });
            if !has_any {
                return false;
            }
        }
        true
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned)
    }

    // === Seeding ===

    pub fn insert_tag(&self, tag: NewTag) -> StorageResult<Tag> {
        let mut tables = self.write()?;
        let duplicate = tables
            .tags
            .values()
            .any(|t| t.name == tag.name || t.slug == tag.slug || t.color == tag.color);
        if duplicate {
            return Err(StorageError::InvalidData {
                entity: EntityKind::Tag,
                reason: format!("tag {:?} clashes with an existing tag", tag.slug),
            });
        }
        let id = TagId::new(tables.next_id());
        let tag = Tag {
            id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        };
        tag.validate()?;
        tables.tags.insert(id, tag.clone());
        Ok(tag)
    }

    /// Ingredients are not deduplicated: two rows may share a name and unit.
    pub fn insert_ingredient(
        &self,
        name: impl Into<String>,
        measurement_unit: impl Into<String>,
    ) -> StorageResult<Ingredient> {
        let mut tables = self.write()?;
        let id = IngredientId::new(tables.next_id());
        let ingredient = Ingredient {
            id,
            name: name.into(),
            measurement_unit: measurement_unit.into(),
        };
        tables.ingredients.insert(id, ingredient.clone());
        Ok(ingredient)
    }

    /// Synchronous form of [`Store::recipe_create`] for seeding.
    pub fn insert_recipe(&self, recipe: NewRecipe) -> StorageResult<Recipe> {
        let mut tables = self.write()?;
        let id = RecipeId::new(tables.next_id());
        let stored = StoredRecipe::from_new(id, recipe, Utc::now());
        tables.put_recipe(stored)
    }

    // === Inspection ===

    pub fn recipe_count(&self) -> StorageResult<usize> {
        Ok(self.read()?.recipes.len())
    }

    pub fn list_len(&self, list: RecipeList, user: UserId) -> StorageResult<usize> {
        Ok(self.read()?.list(list).iter().filter(|(u, _)| *u == user).count())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> StorageResult<()> {
        self.read().map(|_| ())
    }

    async fn tag_list(&self) -> StorageResult<Vec<Tag>> {
        Ok(self.read()?.tags.values().cloned().collect())
    }

    async fn tag_get(&self, id: TagId) -> StorageResult<Option<Tag>> {
        Ok(self.read()?.tags.get(&id).cloned())
    }

    async fn ingredient_search(&self, prefix: Option<&str>) -> StorageResult<Vec<Ingredient>> {
        let prefix = prefix.map(str::to_lowercase);
        let tables = self.read()?;
        let mut found: Vec<Ingredient> = tables
            .ingredients
            .values()
            .filter(|i| match &prefix {
                Some(p) => i.name.to_lowercase().starts_with(p.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn ingredient_get(&self, id: IngredientId) -> StorageResult<Option<Ingredient>> {
        Ok(self.read()?.ingredients.get(&id).cloned())
    }

    async fn recipe_get(&self, id: RecipeId) -> StorageResult<Option<Recipe>> {
        let tables = self.read()?;
        tables
            .recipes
            .get(&id)
            .map(|stored| tables.hydrate(stored))
            .transpose()
    }

    async fn recipe_list(&self, query: &RecipeQuery) -> StorageResult<RecipePage> {
        let tables = self.read()?;
        let mut matching: Vec<&StoredRecipe> = tables
            .recipes
            .values()
            .filter(|stored| tables.matches(stored, query))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let count = matching.len();
        let results = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|stored| tables.hydrate(stored))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(RecipePage { count, results })
    }

    async fn recipe_create(&self, recipe: NewRecipe) -> StorageResult<Recipe> {
        self.insert_recipe(recipe)
    }

    async fn recipe_update(&self, id: RecipeId, recipe: NewRecipe) -> StorageResult<Recipe> {
        let mut tables = self.write()?;
        let created_at = tables.owned_recipe(id, recipe.author)?.created_at;
        tables.put_recipe(StoredRecipe::from_new(id, recipe, created_at))
    }

    async fn recipe_delete(&self, id: RecipeId, author: UserId) -> StorageResult<()> {
        let mut tables = self.write()?;
        tables.owned_recipe(id, author)?;
        tables.recipes.remove(&id);
        tables.favorites.retain(|(_, recipe)| *recipe != id);
        tables.cart.retain(|(_, recipe)| *recipe != id);
        Ok(())
    }

    async fn list_contains(
        &self,
        list: RecipeList,
        user: UserId,
        recipe: RecipeId,
    ) -> StorageResult<bool> {
        Ok(self.read()?.list(list).contains(&(user, recipe)))
    }

    async fn list_add(
        &self,
        list: RecipeList,
        user: UserId,
        recipe: RecipeId,
    ) -> StorageResult<RecipeSummary> {
        let mut tables = self.write()?;
        let summary = match tables.recipes.get(&recipe) {
            Some(stored) => stored.summary(),
            None => {
                return Err(StorageError::NotFound {
                    entity: EntityKind::Recipe,
                    id: recipe.get(),
                })
            }
        };

        if !tables.list_mut(list).insert((user, recipe)) {
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
        let mut tables = self.write()?;
        if !tables.recipes.contains_key(&recipe) {
            return Err(StorageError::NotFound {
                entity: EntityKind::Recipe,
                id: recipe.get(),
            });
        }
        if !tables.list_mut(list).remove(&(user, recipe)) {
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
        let mut tables = self.write()?;
        if tables.subscriptions.contains(&(user, author)) {
            return Ok(false);
        }
        tables.subscriptions.push((user, author));
        Ok(true)
    }

    async fn unsubscribe(&self, user: UserId, author: UserId) -> StorageResult<bool> {
        let mut tables = self.write()?;
        let before = tables.subscriptions.len();
        tables.subscriptions.retain(|pair| *pair != (user, author));
        Ok(tables.subscriptions.len() != before)
    }

    async fn is_subscribed(&self, user: UserId, author: UserId) -> StorageResult<bool> {
        Ok(self.read()?.subscriptions.contains(&(user, author)))
    }

    async fn subscriptions(
        &self,
        user: UserId,
        query: &SubscriptionQuery,
    ) -> StorageResult<SubscriptionPage> {
        let tables = self.read()?;
        let followed: Vec<UserId> = tables
            .subscriptions
            .iter()
            .rev()
            .filter(|(follower, _)| *follower == user)
            .map(|(_, author)| *author)
            .collect();

        let results = followed
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|author| {
                let recipes = tables.authored_by(*author);
                FollowedAuthor {
                    id: *author,
                    recipes_count: recipes.len(),
                    recipes: recipes
                        .into_iter()
                        .take(query.recipes_limit.unwrap_or(usize::MAX))
                        .map(StoredRecipe::summary)
                        .collect(),
                }
            })
            .collect();

        Ok(SubscriptionPage {
            count: followed.len(),
            results,
        })
    }

    async fn shopping_list(&self, user: UserId) -> StorageResult<Vec<AggregatedLine>> {
        let tables = self.read()?;
        let mut rows = Vec::new();
        for (owner, recipe_id) in tables.cart.iter() {
            if *owner != user {
                continue;
            }
            let Some(stored) = tables.recipes.get(recipe_id) else {
                continue;
            };
            for (ingredient_id, amount) in &stored.ingredients {
                let ingredient =
                    tables
                        .ingredients
                        .get(ingredient_id)
                        .ok_or(StorageError::NotFound {
                            entity: EntityKind::Ingredient,
                            id: ingredient_id.get(),
                        })?;
                rows.push(IngredientAmount::new(
                    ingredient.name.clone(),
                    ingredient.measurement_unit.clone(),
                    *amount,
                ));
            }
        }
        Ok(aggregate_amounts(rows))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALICE: UserId = UserId::new(1);
    const BOB: UserId = UserId::new(2);

    fn recipe(store: &InMemoryStore, name: &str, lines: Vec<(IngredientId, u32)>) -> Recipe {
        store
            .insert_recipe(NewRecipe {
                author: ALICE,
                name: name.to_string(),
                image: format!("recipes/images/{}.png", name),
                text: "Mix everything.".to_string(),
                cooking_time: 15,
                tag_ids: Vec::new(),
                ingredients: lines,
            })
            .expect("recipe should insert")
    }

    #[tokio::test]
    async fn test_shopping_list_sums_across_recipes() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let salt = store.insert_ingredient("Salt", "g")?;
        let soup = recipe(&store, "soup", vec![(salt.id, 5)]);
        let bread = recipe(&store, "bread", vec![(salt.id, 10)]);

        store.list_add(RecipeList::ShoppingCart, ALICE, soup.id).await?;
        store.list_add(RecipeList::ShoppingCart, ALICE, bread.id).await?;

        let lines = store.shopping_list(ALICE).await?;
        assert_eq!(lines, vec![AggregatedLine::new("Salt", "g", 15)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_shopping_list_merges_duplicate_ingredient_rows() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let salt_a = store.insert_ingredient("Salt", "g")?;
        let salt_b = store.insert_ingredient("Salt", "g")?;
        assert_ne!(salt_a.id, salt_b.id);

        let soup = recipe(&store, "soup", vec![(salt_a.id, 5)]);
        let bread = recipe(&store, "bread", vec![(salt_b.id, 7)]);
        store.list_add(RecipeList::ShoppingCart, ALICE, soup.id).await?;
        store.list_add(RecipeList::ShoppingCart, ALICE, bread.id).await?;

        let lines = store.shopping_list(ALICE).await?;
        assert_eq!(lines, vec![AggregatedLine::new("Salt", "g", 12)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_shopping_list_is_per_user() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let flour = store.insert_ingredient("Flour", "g")?;
        let cake = recipe(&store, "cake", vec![(flour.id, 300)]);
        store.list_add(RecipeList::ShoppingCart, BOB, cake.id).await?;

        assert!(store.shopping_list(ALICE).await?.is_empty());
        assert_eq!(store.shopping_list(BOB).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_add_rejects_duplicates_and_unknown_recipes() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let egg = store.insert_ingredient("Eggs", "pcs")?;
        let omelette = recipe(&store, "omelette", vec![(egg.id, 3)]);

        let summary = store.list_add(RecipeList::Favorites, ALICE, omelette.id).await?;
        assert_eq!(summary.name, "omelette");

        let again = store.list_add(RecipeList::Favorites, ALICE, omelette.id).await;
        assert!(matches!(again, Err(StorageError::AlreadyExists { .. })));

        let missing = store.list_add(RecipeList::Favorites, ALICE, RecipeId::new(999)).await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_remove_checks_ownership() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let egg = store.insert_ingredient("Eggs", "pcs")?;
        let omelette = recipe(&store, "omelette", vec![(egg.id, 3)]);
        store.list_add(RecipeList::ShoppingCart, BOB, omelette.id).await?;

        let not_mine = store.list_remove(RecipeList::ShoppingCart, ALICE, omelette.id).await;
        assert!(matches!(not_mine, Err(StorageError::RelationMissing { .. })));
        assert_eq!(store.list_len(RecipeList::ShoppingCart, BOB)?, 1);

        store.list_remove(RecipeList::ShoppingCart, BOB, omelette.id).await?;
        assert_eq!(store.list_len(RecipeList::ShoppingCart, BOB)?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ingredient_prefix_search_is_case_insensitive() -> StorageResult<()> {
        let store = InMemoryStore::new();
        store.insert_ingredient("Sugar", "g")?;
        store.insert_ingredient("salt", "g")?;
        store.insert_ingredient("Flour", "g")?;

        let found = store.ingredient_search(Some("S")).await?;
        let names: Vec<_> = found.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Sugar", "salt"]);

        assert_eq!(store.ingredient_search(None).await?.len(), 3);
        assert!(store.ingredient_search(Some("zz")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_recipe_list_filters() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let breakfast = store.insert_tag(NewTag {
            name: "Breakfast".to_string(),
            color: "#E26C2D".to_string(),
            slug: "breakfast".to_string(),
        })?;
        let egg = store.insert_ingredient("Eggs", "pcs")?;
        let omelette = store.insert_recipe(NewRecipe {
            author: ALICE,
            name: "omelette".to_string(),
            image: String::new(),
            text: String::new(),
            cooking_time: 5,
            tag_ids: vec![breakfast.id],
            ingredients: vec![(egg.id, 2)],
        })?;
        let stew = store.insert_recipe(NewRecipe {
            author: BOB,
            name: "stew".to_string(),
            image: String::new(),
            text: String::new(),
            cooking_time: 90,
            tag_ids: Vec::new(),
            ingredients: vec![(egg.id, 1)],
        })?;
        store.list_add(RecipeList::ShoppingCart, BOB, stew.id).await?;

        let by_tag = store
            .recipe_list(&RecipeQuery {
                tags: vec!["breakfast".to_string()],
                ..Default::default()
            })
            .await?;
        assert_eq!(by_tag.count, 1);
        assert_eq!(by_tag.results[0].id, omelette.id);

        let by_author = store
            .recipe_list(&RecipeQuery {
                author: Some(BOB),
                ..Default::default()
            })
            .await?;
        assert_eq!(by_author.results[0].id, stew.id);

        let in_cart = store
            .recipe_list(&RecipeQuery {
                in_cart_of: Some(BOB),
                ..Default::default()
            })
            .await?;
        assert_eq!(in_cart.count, 1);

        let page = store
            .recipe_list(&RecipeQuery {
                offset: 1,
                limit: 1,
                ..Default::default()
            })
            .await?;
        assert_eq!(page.count, 2);
        assert_eq!(page.results.len(), 1);
        Ok(())
    }

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(fut)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Whatever the cart holds, the list total equals the sum of every
        /// recipe line in it.
        #[test]
        fn prop_shopping_list_preserves_cart_total(
            recipes in prop::collection::vec(
                prop::collection::vec((0usize..4, 1u32..=1_000), 1..4),
                0..6,
            )
        ) {
            let store = InMemoryStore::new();
            let pantry: Vec<IngredientId> = ["Salt", "Sugar", "Salt", "Milk"]
                .iter()
                .map(|name| store.insert_ingredient(*name, "g").expect("ingredient").id)
                .collect();

            let mut expected = 0u64;
            for lines in &recipes {
                let mut seen = HashSet::new();
                let ingredients: Vec<_> = lines
                    .iter()
                    .filter(|(slot, _)| seen.insert(*slot))
                    .map(|(slot, amount)| (pantry[*slot], *amount))
                    .collect();
                expected += ingredients.iter().map(|(_, a)| u64::from(*a)).sum::<u64>();
                let added = recipe(&store, "r", ingredients);
                block_on(store.list_add(RecipeList::ShoppingCart, ALICE, added.id))
                    .expect("add to cart");
            }

            let lines = block_on(store.shopping_list(ALICE)).expect("shopping list");
            let total: u64 = lines.iter().map(|l| l.amount).sum();
            prop_assert_eq!(total, expected);
            prop_assert!(lines.len() <= 3);
        }
    }

    #[test]
    fn test_insert_recipe_rejects_zero_amount() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let egg = store.insert_ingredient("Eggs", "pcs")?;
        let result = store.insert_recipe(NewRecipe {
            author: ALICE,
            name: "nothing".to_string(),
            image: String::new(),
            text: String::new(),
            cooking_time: 1,
            tag_ids: Vec::new(),
            ingredients: vec![(egg.id, 0)],
        });
        assert!(matches!(result, Err(StorageError::InvalidData { .. })));
        assert_eq!(store.recipe_count()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_recipe_update_replaces_lines_and_keeps_identity() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let salt = store.insert_ingredient("Salt", "g")?;
        let pepper = store.insert_ingredient("Pepper", "g")?;
        let soup = recipe(&store, "soup", vec![(salt.id, 5)]);

        let updated = store
            .recipe_update(
                soup.id,
                NewRecipe {
                    author: ALICE,
                    name: "spicy soup".to_string(),
                    image: soup.image.clone(),
                    text: soup.text.clone(),
                    cooking_time: 20,
                    tag_ids: Vec::new(),
                    ingredients: vec![(pepper.id, 2)],
                },
            )
            .await?;
        assert_eq!(updated.id, soup.id);
        assert_eq!(updated.created_at, soup.created_at);
        assert_eq!(updated.name, "spicy soup");
        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].name, "Pepper");

        store.list_add(RecipeList::ShoppingCart, BOB, soup.id).await?;
        let lines = store.shopping_list(BOB).await?;
        assert_eq!(lines, vec![AggregatedLine::new("Pepper", "g", 2)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_recipe_writes_are_author_only() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let salt = store.insert_ingredient("Salt", "g")?;
        let soup = recipe(&store, "soup", vec![(salt.id, 5)]);

        let hijack = store
            .recipe_update(
                soup.id,
                NewRecipe {
                    author: BOB,
                    name: "mine now".to_string(),
                    image: String::new(),
                    text: String::new(),
                    cooking_time: 1,
                    tag_ids: Vec::new(),
                    ingredients: vec![(salt.id, 1)],
                },
            )
            .await;
        assert_eq!(hijack, Err(StorageError::NotAuthor { recipe_id: soup.id.get() }));

        let delete = store.recipe_delete(soup.id, BOB).await;
        assert_eq!(delete, Err(StorageError::NotAuthor { recipe_id: soup.id.get() }));
        assert_eq!(store.recipe_count()?, 1);

        let missing = store.recipe_delete(RecipeId::new(404), ALICE).await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_recipe_delete_drops_list_entries() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let salt = store.insert_ingredient("Salt", "g")?;
        let soup = recipe(&store, "soup", vec![(salt.id, 5)]);
        store.list_add(RecipeList::ShoppingCart, BOB, soup.id).await?;
        store.list_add(RecipeList::Favorites, BOB, soup.id).await?;

        store.recipe_delete(soup.id, ALICE).await?;
        assert_eq!(store.recipe_count()?, 0);
        assert_eq!(store.list_len(RecipeList::ShoppingCart, BOB)?, 0);
        assert_eq!(store.list_len(RecipeList::Favorites, BOB)?, 0);
        assert!(store.shopping_list(BOB).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_recipe_create_rejects_unknown_references() -> StorageResult<()> {
        let store = InMemoryStore::new();
        let salt = store.insert_ingredient("Salt", "g")?;
        let result = store
            .recipe_create(NewRecipe {
                author: ALICE,
                name: "ghost".to_string(),
                image: String::new(),
                text: String::new(),
                cooking_time: 1,
                tag_ids: vec![TagId::new(999)],
                ingredients: vec![(salt.id, 1)],
            })
            .await;
        assert!(matches!(result, Err(StorageError::InvalidData { .. })));
        assert_eq!(store.recipe_count()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent_and_refuses_self() -> StorageResult<()> {
        let store = InMemoryStore::new();
        assert!(store.subscribe(ALICE, BOB).await?);
        assert!(!store.subscribe(ALICE, BOB).await?);
        assert!(store.is_subscribed(ALICE, BOB).await?);
        assert!(!store.is_subscribed(BOB, ALICE).await?);

        let selfish = store.subscribe(ALICE, ALICE).await;
        assert!(matches!(
            selfish,
            Err(StorageError::InvalidData {
                entity: EntityKind::Subscription,
                ..
            })
        ));

        assert!(store.unsubscribe(ALICE, BOB).await?);
        assert!(!store.unsubscribe(ALICE, BOB).await?);
        assert!(!store.is_subscribed(ALICE, BOB).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_subscriptions_page_authors_and_cap_recipes() -> StorageResult<()> {
        const CAROL: UserId = UserId::new(3);
        let store = InMemoryStore::new();
        let salt = store.insert_ingredient("Salt", "g")?;
        for name in ["soup", "bread", "stew"] {
            recipe(&store, name, vec![(salt.id, 1)]);
        }
        store.subscribe(BOB, ALICE).await?;
        store.subscribe(BOB, CAROL).await?;

        let page = store
            .subscriptions(
                BOB,
                &SubscriptionQuery {
                    offset: 0,
                    limit: 10,
                    recipes_limit: Some(2),
                },
            )
            .await?;
        assert_eq!(page.count, 2);
        let authors: Vec<_> = page.results.iter().map(|a| a.id).collect();
        assert_eq!(authors, vec![CAROL, ALICE]);

        let alice = &page.results[1];
        assert_eq!(alice.recipes_count, 3);
        let names: Vec<_> = alice.recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["stew", "bread"]);
        assert!(page.results[0].recipes.is_empty());

        let second = store
            .subscriptions(
                BOB,
                &SubscriptionQuery {
                    offset: 1,
                    limit: 1,
                    recipes_limit: None,
                },
            )
            .await?;
        assert_eq!(second.count, 2);
        assert_eq!(second.results[0].id, ALICE);
        assert_eq!(second.results[0].recipes.len(), 3);
        Ok(())
    }
}
