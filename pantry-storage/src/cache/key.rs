//! Cache key layout.

use pantry_core::UserId;

/// Key for a user's aggregated shopping list.
pub fn shopping_list_key(user: UserId) -> String {
    format!("ingredients_user_{}", user)
}
