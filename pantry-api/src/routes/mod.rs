//! REST API Routes Module
//!
//! Route handlers grouped by resource:
//! - Tags and ingredients (read-only reference data)
//! - Recipes, favorites and the shopping cart
//! - Author subscriptions
//! - Shopping-list PDF download
//! - Health check endpoints (Kubernetes-compatible)

pub mod health;
pub mod ingredients;
pub mod lists;
pub mod recipes;
pub mod tags;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::state::AppState;

pub use health::create_router as health_router;
pub use ingredients::create_router as ingredients_router;
pub use recipes::create_router as recipes_router;
pub use tags::create_router as tags_router;
pub use users::create_router as users_router;

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Check if running in a production environment.
fn is_production_environment() -> bool {
    std::env::var("PANTRY_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set PANTRY_CORS_ORIGINS.",
        ));
    }
    if config.cors_allow_credentials && config.cors_origins.iter().any(|o| o == "*") {
        return Err(ApiError::invalid_input(
            "CORS credentials cannot be combined with a '*' origin.",
        ));
    }
    Ok(())
}

// ============================================================================
// ROUTER BUILDER
// ============================================================================

/// Assembles the public router: `/api/*` behind the caller-resolving
/// middleware, `/health/*` without it.
pub struct ApiRouterBuilder {
    state: AppState,
    api_config: ApiConfig,
    auth_state: AuthMiddlewareState,
}

impl ApiRouterBuilder {
    pub fn new(state: AppState, api_config: ApiConfig, auth_config: AuthConfig) -> ApiResult<Self> {
        if is_production_environment() {
            auth_config.validate_for_production()?;
            validate_api_config_for_production(&api_config)?;
        }

        Ok(Self {
            state,
            api_config,
            auth_state: AuthMiddlewareState::new(auth_config),
        })
    }

    fn build_api_routes(&self) -> Router<AppState> {
        Router::new()
            .nest("/tags", tags::create_router())
            .nest("/ingredients", ingredients::create_router())
            .nest("/recipes", recipes::create_router())
            .nest("/users", users::create_router())
            .layer(from_fn_with_state(self.auth_state.clone(), auth_middleware))
    }

    pub fn build(self) -> Router {
        let cors = build_cors_layer(&self.api_config);

        Router::new()
            .nest("/api", self.build_api_routes())
            .nest("/health", health::create_router())
            .layer(TimeoutLayer::new(self.api_config.request_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state)
    }
}

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(std::time::Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Build the full application router.
pub fn create_api_router(
    state: AppState,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    ApiRouterBuilder::new(state, api_config.clone(), auth_config).map(ApiRouterBuilder::build)
}
