//! Application services sitting between route handlers and the storage,
//! cache and rendering layers.

pub mod shopping_list;

pub use shopping_list::ShoppingListService;
