//! API Configuration Module
//!
//! HTTP, storage selection and document rendering settings. Everything is
//! loaded from `PANTRY_*` environment variables with development defaults.

use std::path::PathBuf;
use std::time::Duration;

use pantry_core::ConfigError;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP-facing settings: CORS and request limits.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Upper bound on handling a single request.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// - `PANTRY_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `PANTRY_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `PANTRY_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `PANTRY_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("PANTRY_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_allow_credentials: std::env::var("PANTRY_CORS_ALLOW_CREDENTIALS")
                .ok()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(defaults.cors_allow_credentials),
            cors_max_age_secs: std::env::var("PANTRY_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
            request_timeout: std::env::var("PANTRY_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    /// Strict CORS is in effect when origins are configured.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.example.org matches https://<sub>.example.org
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain
                        .strip_suffix(pattern)
                        .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1);
                }
            }
            false
        })
    }
}

// ============================================================================
// STORAGE SELECTION
// ============================================================================

/// Which [`Store`](pantry_storage::Store) implementation backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local store, empty at startup. For demos and local runs.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "PANTRY_STORAGE".to_string(),
                value: other.to_string(),
                reason: "expected 'postgres' or 'memory'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

impl StorageConfig {
    /// Read `PANTRY_STORAGE`. An unknown value is an error rather than a
    /// silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match std::env::var("PANTRY_STORAGE") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => StorageBackend::default(),
        };
        Ok(Self { backend })
    }
}

// ============================================================================
// DOCUMENT RENDERING
// ============================================================================

/// Title printed at the top of every shopping list.
pub const DEFAULT_PDF_TITLE: &str = "Список покупок";

/// Settings for the PDF shopping-list renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// TrueType font with Cyrillic coverage, read on every render. `None`
    /// uses the DejaVu Sans copy compiled into the binary.
    pub font_path: Option<PathBuf>,
    /// Point size for the title and every line.
    pub font_size: f32,
    pub title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 12.0,
            title: DEFAULT_PDF_TITLE.to_string(),
        }
    }
}

impl RenderConfig {
    /// - `PANTRY_PDF_FONT_PATH`: font file (default: embedded DejaVu Sans)
    /// - `PANTRY_PDF_FONT_SIZE`: point size (default: 12)
    /// - `PANTRY_PDF_TITLE`: document title
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            font_path: std::env::var("PANTRY_PDF_FONT_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .or(defaults.font_path),
            font_size: std::env::var("PANTRY_PDF_FONT_SIZE")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .filter(|size| *size > 0.0)
                .unwrap_or(defaults.font_size),
            title: std::env::var("PANTRY_PDF_TITLE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.title),
        }
    }
}
