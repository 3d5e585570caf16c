//! Pantry Test Utilities
//!
//! Shared test infrastructure for the Pantry workspace:
//! - Proptest generators for ids, ingredient rows and cart contents
//! - A seeded in-memory kitchen for router and service tests
//! - Assertions for storage error variants

pub use pantry_core::{
    aggregate_amounts, AggregatedLine, Caller, EntityKind, IngredientAmount, IngredientId,
    PantryError, Recipe, RecipeId, RecipeList, StorageError, StorageResult, Tag, TagId, UserId,
};
pub use pantry_storage::{InMemoryStore, NewRecipe, NewTag};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Pantry types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        (1i64..10_000).prop_map(UserId::new)
    }

    pub fn arb_recipe_id() -> impl Strategy<Value = RecipeId> {
        (1i64..10_000).prop_map(RecipeId::new)
    }

    /// Names drawn from a small pool so that generated rows collide often.
    pub fn arb_ingredient_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Salt".to_string()),
            Just("Sugar".to_string()),
            Just("Flour".to_string()),
            Just("Яйца".to_string()),
            Just("Молоко".to_string()),
            "[a-z]{1,8}",
        ]
    }

    pub fn arb_measurement_unit() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("g".to_string()),
            Just("kg".to_string()),
            Just("ml".to_string()),
            Just("шт.".to_string()),
        ]
    }

    pub fn arb_ingredient_amount() -> impl Strategy<Value = IngredientAmount> {
        (arb_ingredient_name(), arb_measurement_unit(), 1u32..5_000)
            .prop_map(|(name, unit, amount)| IngredientAmount::new(name, unit, amount))
    }

    /// Rows as they come out of a cart join: any order, repeated keys.
    pub fn arb_cart_rows(max_len: usize) -> impl Strategy<Value = Vec<IngredientAmount>> {
        prop::collection::vec(arb_ingredient_amount(), 0..max_len)
    }

    /// Per-recipe ingredient lists: each recipe has distinct ingredient
    /// indices into a shared pool of `pool` ingredients.
    pub fn arb_recipe_ingredients(
        pool: usize,
        max_recipes: usize,
    ) -> impl Strategy<Value = Vec<Vec<(usize, u32)>>> {
        let pool = pool.max(1);
        let recipe = prop::collection::vec((0..pool, 1u32..1_000), 1..=pool).prop_map(|pairs| {
            let unique: std::collections::BTreeMap<usize, u32> = pairs.into_iter().collect();
            unique.into_iter().collect::<Vec<_>>()
        });
        prop::collection::vec(recipe, 0..max_recipes)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made data for common scenarios.

    use super::*;

    pub const AUTHOR: UserId = UserId::new(1);
    pub const SHOPPER: UserId = UserId::new(2);
    pub const OTHER_SHOPPER: UserId = UserId::new(3);

    pub fn breakfast_tag() -> NewTag {
        NewTag {
            name: "Завтрак".to_string(),
            color: "#E26C2D".to_string(),
            slug: "breakfast".to_string(),
        }
    }

    pub fn dinner_tag() -> NewTag {
        NewTag {
            name: "Ужин".to_string(),
            color: "#49B64E".to_string(),
            slug: "dinner".to_string(),
        }
    }

    pub fn new_recipe(
        author: UserId,
        name: &str,
        tag_ids: Vec<TagId>,
        ingredients: Vec<(IngredientId, u32)>,
    ) -> NewRecipe {
        NewRecipe {
            author,
            name: name.to_string(),
            image: format!("recipes/images/{}.png", name.to_lowercase()),
            text: format!("How to cook {}", name),
            cooking_time: 30,
            tag_ids,
            ingredients,
        }
    }

    /// A small in-memory data set.
    ///
    /// - tags: breakfast, dinner
    /// - ingredients: salt (g), apples (kg), salt (kg), a second "salt (g)" row
    /// - recipes: `soup` (dinner; salt g 5, apples 1), `stew` (dinner;
    ///   salt g 10, apples 1, salt kg 2), `porridge` (breakfast; duplicate
    ///   salt g 3), inserted in that order
    #[derive(Debug)]
    pub struct Kitchen {
        pub store: InMemoryStore,
        pub breakfast: Tag,
        pub dinner: Tag,
        pub salt_g: IngredientId,
        pub apples_kg: IngredientId,
        pub salt_kg: IngredientId,
        pub salt_g_duplicate: IngredientId,
        pub soup: RecipeId,
        pub stew: RecipeId,
        pub porridge: RecipeId,
    }

    impl Kitchen {
        pub fn new() -> StorageResult<Self> {
            let store = InMemoryStore::new();
            let breakfast = store.insert_tag(breakfast_tag())?;
            let dinner = store.insert_tag(dinner_tag())?;

            let salt_g = store.insert_ingredient("Salt", "g")?.id;
            let apples_kg = store.insert_ingredient("Apples", "kg")?.id;
            let salt_kg = store.insert_ingredient("Salt", "kg")?.id;
            let salt_g_duplicate = store.insert_ingredient("Salt", "g")?.id;

            let soup = store
                .insert_recipe(new_recipe(
                    AUTHOR,
                    "Soup",
                    vec![dinner.id],
                    vec![(salt_g, 5), (apples_kg, 1)],
                ))?
                .id;
            let stew = store
                .insert_recipe(new_recipe(
                    AUTHOR,
                    "Stew",
                    vec![dinner.id],
                    vec![(salt_g, 10), (apples_kg, 1), (salt_kg, 2)],
                ))?
                .id;
            let porridge = store
                .insert_recipe(new_recipe(
                    SHOPPER,
                    "Porridge",
                    vec![breakfast.id],
                    vec![(salt_g_duplicate, 3)],
                ))?
                .id;

            Ok(Self {
                store,
                breakfast,
                dinner,
                salt_g,
                apples_kg,
                salt_kg,
                salt_g_duplicate,
                soup,
                stew,
                porridge,
            })
        }

        /// Shopping list for a cart holding every recipe in the kitchen.
        pub fn full_cart_lines() -> Vec<AggregatedLine> {
            vec![
                AggregatedLine::new("Apples", "kg", 2),
                AggregatedLine::new("Salt", "g", 18),
                AggregatedLine::new("Salt", "kg", 2),
            ]
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Pantry-specific results.

    use super::*;

    pub fn assert_not_found<T: std::fmt::Debug>(result: &StorageResult<T>, expected: EntityKind) {
        match result {
            Err(StorageError::NotFound { entity, .. }) => assert_eq!(*entity, expected),
            other => panic!("Expected NotFound({}), got {:?}", expected, other),
        }
    }

    pub fn assert_already_exists<T: std::fmt::Debug>(result: &StorageResult<T>) {
        assert!(
            matches!(result, Err(StorageError::AlreadyExists { .. })),
            "Expected AlreadyExists, got {:?}",
            result
        );
    }

    pub fn assert_relation_missing<T: std::fmt::Debug>(result: &StorageResult<T>) {
        assert!(
            matches!(result, Err(StorageError::RelationMissing { .. })),
            "Expected RelationMissing, got {:?}",
            result
        );
    }

    /// Lines are strictly ordered by (name, unit) with no repeated key.
    pub fn assert_lines_sorted_unique(lines: &[AggregatedLine]) {
        for pair in lines.windows(2) {
            let a = (&pair[0].name, &pair[0].measurement_unit);
            let b = (&pair[1].name, &pair[1].measurement_unit);
            assert!(a < b, "Lines out of order or duplicated: {:?} then {:?}", a, b);
        }
    }

    pub fn assert_total_amount(lines: &[AggregatedLine], expected: u64) {
        let total: u64 = lines.iter().map(|l| l.amount).sum();
        assert_eq!(total, expected, "Total amount mismatch");
    }
}
