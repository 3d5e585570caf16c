//! Pantry API Server Entry Point
//!
//! Bootstraps configuration, picks the store and cache backends, and starts
//! the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use pantry_api::{
    create_api_router, telemetry::init_tracing, ApiConfig, ApiError, ApiResult, AppState,
    AuthConfig, DbConfig, PdfRenderer, PgStore, RenderConfig, ShoppingListService,
    StorageBackend, StorageConfig,
};
use pantry_core::PantryError;
use pantry_storage::{
    init_backend, Aggregator, CacheConfig, InMemoryStore, ShoppingListCache, Store,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing()?;

    let storage_config = StorageConfig::from_env().map_err(PantryError::from)?;
    let store: Arc<dyn Store> = match storage_config.backend {
        StorageBackend::Postgres => {
            let db_config = DbConfig::from_env();
            tracing::info!(
                host = %db_config.host,
                dbname = %db_config.dbname,
                max_size = db_config.max_size,
                "Using PostgreSQL store"
            );
            Arc::new(PgStore::from_config(&db_config)?)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Arc::new(InMemoryStore::new())
        }
    };

    let cache_config = CacheConfig::from_env();
    let cache_backend = init_backend(&cache_config).await;
    let cache = Arc::new(ShoppingListCache::new(
        Aggregator::new(store.clone()),
        cache_backend,
        cache_config,
    ));

    let renderer = Arc::new(PdfRenderer::new(RenderConfig::from_env()));
    let shopping_list = ShoppingListService::new(cache, renderer);
    let state = AppState::new(store, shopping_list);

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();
    let app: Router = create_api_router(state, &api_config, auth_config)?;

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Pantry API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("PANTRY_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("PANTRY_API_PORT").ok())
        .unwrap_or_else(|| "8000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
