use std::sync::Arc;

use pantry_api::auth::{generate_jwt_token, AuthConfig, FixedClock, JwtSecret};
use pantry_core::UserId;

/// 2024-01-01 00:00:00 UTC
pub const TEST_NOW: i64 = 1704067200;

/// Auth configuration with a known secret and a pinned clock.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JwtSecret::new("test_secret_for_integration_tests".to_string())
            .expect("test secret is not empty"),
        clock: Arc::new(FixedClock(TEST_NOW)),
        ..AuthConfig::default()
    }
}

/// `Authorization` header value for `user`.
pub fn bearer(user: UserId) -> String {
    let token = generate_jwt_token(&test_auth_config(), user).expect("token should be minted");
    format!("Bearer {}", token)
}
