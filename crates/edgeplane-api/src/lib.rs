//! Agent-facing pull API
//!
//! Edge agents poll `/api/agent/config-version` and re-fetch
//! `/api/agent/config` when the version moved.

pub mod handlers;
pub mod models;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;

use edgeplane_control::AgentService;
use sea_orm::DatabaseConnection;

/// Application state shared across handlers
pub struct AppState {
    pub agent: AgentService,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Edgeplane Agent API",
        version = "0.1.0",
        description = "Configuration pull API for CDN edge agents"
    ),
    paths(
        handlers::config_version,
        handlers::agent_config,
        handlers::pending_tasks,
        handlers::update_task_status,
        handlers::certificate,
        handlers::health_check,
    ),
    components(
        schemas(
            models::ConfigVersionResponse,
            models::WebsiteHttps,
            models::Website,
            models::NodeGroup,
            models::LineGroup,
            models::AgentConfigResponse,
            models::TaskQuery,
            models::AgentTask,
            models::AgentTaskList,
            models::UpdateTaskStatusRequest,
            models::Certificate,
            models::HealthResponse,
            models::ErrorResponse,
        )
    ),
    tags(
        (name = "agent", description = "Edge agent endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
pub struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Permissive CORS (for development)
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8088)),
            enable_cors: false,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, db: DatabaseConnection) -> Self {
        let state = Arc::new(AppState {
            agent: AgentService::new(db),
        });

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_router = Router::new()
            .route("/api/health", get(handlers::health_check))
            .route("/api/agent/config-version", get(handlers::config_version))
            .route("/api/agent/config", get(handlers::agent_config))
            .route("/api/agent/tasks", get(handlers::pending_tasks))
            .route(
                "/api/agent/tasks/{id}/status",
                post(handlers::update_task_status),
            )
            .route("/api/agent/certificates/{id}", get(handlers::certificate))
            .with_state(self.state.clone());

        let router = Router::new()
            .route("/api/openapi.json", get(handlers::openapi))
            .merge(api_router)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_methods([Method::GET, Method::POST])
                    .allow_headers([header::CONTENT_TYPE])
                    .allow_origin(Any),
            )
        } else {
            router
        }
    }

    /// Serve until `cancel` fires
    pub async fn start(self, cancel: CancellationToken) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        info!("API server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["paths"]["/api/agent/config"].is_object());
        assert!(json["paths"]["/api/agent/tasks/{id}/status"]["post"].is_object());
    }
}
