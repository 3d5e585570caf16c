//! Axum middleware that resolves the request's [`Caller`].
//!
//! Requests without an `Authorization` header continue as
//! [`Caller::Anonymous`]; endpoints that need an owner reject them later.
//! A header that is present but invalid is rejected here with 401.

use crate::auth::{authenticate, AuthConfig};
use crate::error::{ApiError, ErrorCode};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pantry_core::Caller;
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Resolve the caller and store it in request extensions.
///
/// ```ignore
/// let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
/// let app = Router::new()
///     .route("/api/tags", get(list_tags))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .map(|h| {
            h.to_str()
                .map_err(|_| ApiError::invalid_format("Authorization", "visible ASCII"))
        })
        .transpose()
        .map_err(AuthMiddlewareError)?;

    let caller = authenticate(&state.auth_config, auth_header).map_err(AuthMiddlewareError)?;

    if let Caller::User(user_id) = caller {
        tracing::trace!(user_id = user_id.get(), "Authenticated request");
    }

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Middleware rejection. Every credential problem is a 401 so clients can
/// treat them alike.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        let api_error = self.0;

        let status = match api_error.code {
            ErrorCode::Unauthorized
            | ErrorCode::InvalidToken
            | ErrorCode::TokenExpired
            | ErrorCode::InvalidFormat => StatusCode::UNAUTHORIZED,
            other => other.status_code(),
        };

        (status, axum::Json(api_error)).into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Handler extractor for the caller resolved by [`auth_middleware`].
///
/// Fails with 500 when the middleware was not applied to the route.
#[derive(Debug, Clone, Copy)]
pub struct CallerExtractor(pub Caller);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .copied()
            .map(CallerExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "Caller not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for CallerExtractor {
    type Target = Caller;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
