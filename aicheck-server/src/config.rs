//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use aicheck_core::{DuplicateScope, PoolSettings};

/// Default address of the image processor gRPC service
pub const DEFAULT_IMAGE_PROCESSOR_ADDR: &str = "http://rust-service:50051";

/// Default max upload size in bytes (8 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8080)
    pub port: u16,
    /// Server host (default: 0.0.0.0)
    pub host: IpAddr,
    /// Allowed CORS origins, comma-separated (default: allow all)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 10)
    pub body_limit_mb: usize,
    /// Maximum image size in bytes (default: 8 MiB)
    pub max_upload_bytes: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Grace period for in-flight requests on shutdown (default: 15)
    pub shutdown_timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 10)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 5)
    pub database_min_connections: u32,
    /// Seconds to wait for a pooled connection (default: 5)
    pub database_acquire_timeout_secs: u64,
    /// Redis URL; the in-memory cache is used when unset
    pub redis_url: Option<String>,
    /// Image processor gRPC address
    pub image_processor_addr: String,
    /// Image processor connect timeout in seconds (default: 5)
    pub image_processor_connect_timeout_secs: u64,
    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: Option<String>,
    /// Audience the `aud` claim must contain, when set
    pub jwt_audience: Option<String>,
    /// Whose records count as duplicates (default: owner)
    pub duplicate_scope: DuplicateScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 10,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            timeout_secs: 30,
            shutdown_timeout_secs: 15,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 10,
            database_min_connections: 5,
            database_acquire_timeout_secs: 5,
            redis_url: None,
            image_processor_addr: DEFAULT_IMAGE_PROCESSOR_ADDR.to_string(),
            image_processor_connect_timeout_secs: 5,
            jwt_secret: None,
            jwt_audience: None,
            duplicate_scope: DuplicateScope::Owner,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|h| h.trim().parse().ok())
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let body_limit_mb = std::env::var("BODY_LIMIT_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit_mb);

        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_upload_bytes);

        let timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        let shutdown_timeout_secs = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.shutdown_timeout_secs);

        let rate_limit_per_sec = std::env::var("RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_per_sec);

        let rate_limit_burst = std::env::var("RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_burst);

        // Enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.database_max_connections);

        let database_min_connections = std::env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.database_min_connections);

        let database_acquire_timeout_secs = std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.database_acquire_timeout_secs);

        let image_processor_addr = non_empty_var("IMAGE_PROCESSOR_ADDR")
            .unwrap_or(defaults.image_processor_addr);

        let image_processor_connect_timeout_secs =
            std::env::var("IMAGE_PROCESSOR_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.image_processor_connect_timeout_secs);

        let duplicate_scope = match std::env::var("DUPLICATE_SCOPE") {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring DUPLICATE_SCOPE, using owner scope");
                DuplicateScope::Owner
            }),
            Err(_) => defaults.duplicate_scope,
        };

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb,
            max_upload_bytes,
            timeout_secs,
            shutdown_timeout_secs,
            rate_limit_enabled,
            rate_limit_per_sec,
            rate_limit_burst,
            database_url: non_empty_var("DATABASE_URL"),
            database_max_connections,
            database_min_connections,
            database_acquire_timeout_secs,
            redis_url: non_empty_var("REDIS_URL"),
            image_processor_addr,
            image_processor_connect_timeout_secs,
            jwt_secret: non_empty_var("JWT_SECRET"),
            jwt_audience: non_empty_var("JWT_AUDIENCE"),
            duplicate_scope,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Deadline given to every request context
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn image_processor_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.image_processor_connect_timeout_secs)
    }

    /// PostgreSQL pool bounds
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.database_max_connections,
            min_connections: self.database_min_connections,
            acquire_timeout: Duration::from_secs(self.database_acquire_timeout_secs),
            ..PoolSettings::default()
        }
    }
}

/// Trimmed value of `name`, treating blank values as unset
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
