//! HTTP front door: owns the listener, the middleware stack, and the
//! service-level endpoints (`/health`, `/openapi.json`, `/docs`).
//!
//! Feature modules hand in a plain `axum::Router`; it is nested under `/api`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Json, Router};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

mod config;
pub mod request_id;
mod web;

pub use config::ApiIngressConfig;

/// Prefix under which feature routers are mounted.
pub const API_PREFIX: &str = "/api";

pub struct ApiIngress {
    config: ApiIngressConfig,
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApiIngressConfig {
        &self.config
    }

    /// Assemble the full application router around `api`.
    pub fn build_router(&self, api: Router, openapi: Option<utoipa::openapi::OpenApi>) -> Router {
        let mut router = Router::new()
            .route("/health", get(web::health_check))
            .nest(API_PREFIX, api);

        if self.config.enable_docs {
            if let Some(doc) = openapi {
                router = router
                    .route(
                        "/openapi.json",
                        get(move || {
                            let doc = doc.clone();
                            async move { Json(doc) }
                        }),
                    )
                    .route("/docs", get(web::serve_docs));
            }
        }

        // Outermost to innermost: request ids and tracing -> Timeout -> CORS -> BodyLimit
        router = router.layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes));
        if self.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        router = router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(self.config.request_timeout_secs),
        ));
        request_id::with_request_ids(router)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.config
            .bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", self.config.bind_addr, e))
    }

    /// Bind and serve until `cancel` fires.
    pub async fn serve(&self, router: Router, cancel: CancellationToken) -> Result<()> {
        let addr = self.bind_addr()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP server bound on {}", addr);

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}
