//! Pantry API - REST Layer and Shopping-List Export
//!
//! Axum routes over the [`pantry_storage::Store`] abstraction, the
//! PostgreSQL store, bearer-token caller resolution and the PDF renderer
//! behind `GET /api/recipes/download_shopping_cart`.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod render;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{
    authenticate, generate_jwt_token, validate_jwt_token, AuthConfig, Claims, JwtClock,
    SystemClock,
};
pub use config::{ApiConfig, RenderConfig, StorageBackend, StorageConfig};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthMiddlewareState, CallerExtractor};
pub use render::{PdfRenderer, RenderedDocument, ShoppingListRenderer};
pub use routes::{create_api_router, ApiRouterBuilder};
pub use services::ShoppingListService;
pub use state::AppState;
