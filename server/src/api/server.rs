//! API server initialization

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use super::auth::{AuthState, require_auth};
use super::middleware;
use super::openapi::{openapi_json, swagger_ui_html};
use super::rate_limit::{RateLimitState, rate_limit_middleware};
use super::routes::discovery::DiscoveryApiState;
use super::routes::ingest::IngestApiState;
use super::routes::system::SystemApiState;
use super::routes::{ReadApiState, architecture, discovery, health, ingest, system, workflows};
use crate::app::CoreApp;
use crate::core::constants::{DEFAULT_BODY_LIMIT, INGEST_BODY_LIMIT};
use crate::data::cache::RateLimitBucket;

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let app = self.app;

        let shutdown = app.shutdown.clone();
        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);

        let auth_state = AuthState {
            auth: app.auth.clone(),
        };
        let rate_limit_enabled = app.config.rate_limit.enabled;
        let make_rate_limit_state = |bucket: RateLimitBucket| RateLimitState {
            limiter: app.rate_limiter.clone(),
            bucket,
        };

        // Ingestion routes: auth, then per-tenant ingestion rate limit
        let ingest_state = IngestApiState {
            pipeline: app.ingest.clone(),
            max_span_bytes: app.config.ingest.max_span_bytes,
            max_batch_spans: app.config.ingest.max_batch_spans,
        };
        let ingest_routes = Router::new()
            .route("/ingest", post(ingest::ingest_span))
            .route("/ingest/batch", post(ingest::ingest_batch))
            .with_state(ingest_state)
            .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT));
        let ingest_routes = if rate_limit_enabled {
            ingest_routes.layer(axum::middleware::from_fn_with_state(
                make_rate_limit_state(RateLimitBucket::ingestion(
                    app.config.rate_limit.ingestion_rpm,
                )),
                rate_limit_middleware,
            ))
        } else {
            ingest_routes
        };

        // Analysis read routes: auth, then per-tenant API rate limit
        let read_state = ReadApiState {
            analysis: app.analysis.clone(),
            read_timeout: Duration::from_secs(app.config.read.timeout_secs),
        };
        let read_routes = Router::new()
            .route(
                "/architecture/current",
                get(architecture::get_current_architecture),
            )
            .route("/architecture/issues", get(architecture::get_issues))
            .route(
                "/architecture/analysis",
                get(architecture::get_graph_analysis),
            )
            .route(
                "/workflows/generated",
                get(workflows::get_generated_workflows),
            )
            .route(
                "/workflows/comparison",
                get(workflows::get_workflow_comparison),
            )
            .with_state(read_state);

        // Discovery and system routes share the API bucket
        let discovery_routes = Router::new()
            .route(
                "/discovery",
                put(discovery::put_discovery).get(discovery::list_discovery),
            )
            .with_state(DiscoveryApiState {
                database: app.database.clone(),
                cache: app.cache.clone(),
            });
        let system_routes = Router::new()
            .route("/system/stats", get(system::get_system_stats))
            .with_state(SystemApiState {
                database: app.database.clone(),
            });

        let api_routes = read_routes.merge(discovery_routes).merge(system_routes);
        let api_routes = if rate_limit_enabled {
            api_routes.layer(axum::middleware::from_fn_with_state(
                make_rate_limit_state(RateLimitBucket::api(app.config.rate_limit.api_rpm)),
                rate_limit_middleware,
            ))
        } else {
            api_routes
        };

        let authed_routes = ingest_routes.merge(api_routes).layer(
            axum::middleware::from_fn_with_state(auth_state, require_auth),
        );

        // Liveness is registered after the auth layer, so it stays open
        let v1_routes = authed_routes.route("/health", get(health::health));

        let router = Router::new()
            .route("/api/openapi.json", get(openapi_json))
            .route("/api/docs", get(swagger_ui_html))
            .nest("/api/v1", v1_routes)
            .fallback(middleware::handle_404)
            .layer(CompressionLayer::new())
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

        tracing::info!(%addr, "API server listening");

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}
