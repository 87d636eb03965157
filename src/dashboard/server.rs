//! Dashboard server implementation
//!
//! Wires the event repository, detector and result cache into the API
//! router and runs it until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analytics::{BurstDetector, Granularity, Sensitivity};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::storage::SharedEventRepository;

use super::api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Event storage
    pub repo: SharedEventRepository,

    /// Configured detector
    pub detector: Arc<BurstDetector>,

    /// Finished analyses
    pub cache: Arc<ResultCache>,

    /// Granularity for queries that name none
    pub default_granularity: Granularity,

    /// Sensitivity for queries that name none
    pub default_sensitivity: Sensitivity,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Build state from configuration
    pub fn new(config: &Config, repo: SharedEventRepository) -> Result<Self, ServerError> {
        let detector = config
            .analysis
            .detector()
            .map_err(|e| ServerError::ConfigError(format!("{e:#}")))?;
        let default_sensitivity = config
            .analysis
            .sensitivity()
            .map_err(|e| ServerError::ConfigError(format!("{e:#}")))?;

        Ok(Self {
            repo,
            detector: Arc::new(detector),
            cache: Arc::new(ResultCache::new(&config.cache)),
            default_granularity: config.analysis.default_granularity,
            default_sensitivity,
            start_time: Instant::now(),
        })
    }
}

// ============================================================================
// Dashboard Server
// ============================================================================

/// HTTP server for the burst dashboard
pub struct DashboardServer {
    config: Config,
    bind_address: SocketAddr,
    state: AppState,
}

impl DashboardServer {
    /// Create a new dashboard server
    pub fn new(config: Config, repo: SharedEventRepository) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::ConfigError(format!("{e:#}")))?;
        let bind_address = config
            .bind_addr()
            .map_err(|e| ServerError::ConfigError(format!("{e:#}")))?;
        let state = AppState::new(&config, repo)?;

        Ok(Self {
            config,
            bind_address,
            state,
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.server.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.server.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        tracing::info!("Starting dashboard server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("Dashboard server shutdown complete");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.bind_address,
            default_granularity: self.state.default_granularity,
            default_sensitivity: self.state.default_sensitivity.value(),
            cache_enabled: self.state.cache.is_enabled(),
            cors_enabled: self.config.server.enable_cors,
            request_logging_enabled: self.config.server.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub default_granularity: Granularity,
    pub default_sensitivity: f64,
    pub cache_enabled: bool,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "Dashboard Server\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Default Granularity: {}\n\
             Default Sensitivity: {}\n\
             Result Cache: {}\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.default_granularity,
            self.default_sensitivity,
            if self.cache_enabled { "enabled" } else { "disabled" },
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::create_mock_repository;

    #[test]
    fn test_server_creation() {
        let server = DashboardServer::new(Config::default(), create_mock_repository());
        assert!(server.is_ok());
    }

    #[test]
    fn test_server_info() {
        let server = DashboardServer::new(Config::default(), create_mock_repository()).unwrap();
        let info = server.info();

        assert_eq!(info.bind_address.port(), 8050);
        assert_eq!(info.default_granularity, Granularity::Month);
        assert!(info.cache_enabled);
        assert!(info.cors_enabled);
        assert!(info.display().contains("Dashboard Server"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.analysis.default_sensitivity = f64::NAN;

        let err = DashboardServer::new(config, create_mock_repository())
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::ConfigError(_)));
    }

    #[test]
    fn test_state_uses_cache_config() {
        let mut config = Config::default();
        config.cache.enabled = false;

        let state = AppState::new(&config, create_mock_repository()).unwrap();
        assert!(!state.cache.is_enabled());
        assert_eq!(state.default_sensitivity, Sensitivity::default());
    }
}
