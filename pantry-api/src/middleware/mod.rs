//! Middleware modules for the Pantry API
//!
//! - `auth`: resolves the [`Caller`](pantry_core::Caller) for every `/api` request

mod auth;

pub use auth::{auth_middleware, AuthMiddlewareError, AuthMiddlewareState, CallerExtractor};
