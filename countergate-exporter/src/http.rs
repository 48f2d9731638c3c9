//! HTTP server for the Prometheus scrape endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use countergate_common::SharedCounterStore;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::config::HttpConfig;
use crate::converter::to_text;
use crate::stats::{DeliveryStats, SharedStats};

/// Pull delivery: renders the aggregation buffer on demand.
///
/// Without a store every read returns an empty body.
#[derive(Clone)]
pub struct PullDelivery {
    store: Option<SharedCounterStore>,
    source: Option<String>,
    instance: Option<String>,
    stats: SharedStats,
}

impl PullDelivery {
    pub fn new(
        store: Option<SharedCounterStore>,
        source: Option<String>,
        instance: Option<String>,
    ) -> Self {
        Self {
            store,
            source,
            instance,
            stats: Arc::new(DeliveryStats::new()),
        }
    }

    /// Share delivery statistics with other components.
    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = stats;
        self
    }

    /// Render all buffered counters, leaving the buffer unchanged.
    pub fn read(&self) -> String {
        self.stats.record_scrape();
        let counters = self.store.as_ref().map(|s| s.get_all());
        to_text(
            counters.as_deref(),
            self.source.as_deref(),
            self.instance.as_deref(),
        )
    }

    /// Render all buffered counters, then reset them.
    ///
    /// The body reflects the values from before the reset.
    pub fn read_and_reset(&self) -> String {
        self.stats.record_reset();
        let counters = self.store.as_ref().map(|s| s.get_all_and_reset());
        to_text(
            counters.as_deref(),
            self.source.as_deref(),
            self.instance.as_deref(),
        )
    }
}

/// Create the HTTP router.
fn create_router(delivery: PullDelivery, config: &HttpConfig) -> Router {
    Router::new()
        .route(&config.metrics_path, get(metrics_handler))
        .route(&config.reset_path, get(metrics_and_reset_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(delivery)
}

fn text_response(body: String) -> Response {
    (StatusCode::OK, [("content-type", "text/plain")], body).into_response()
}

/// Handler for the metrics endpoint.
async fn metrics_handler(State(delivery): State<PullDelivery>) -> Response {
    let body = delivery.read();
    debug!(bytes = body.len(), "Served metrics");
    text_response(body)
}

/// Handler for the read-and-reset endpoint.
async fn metrics_and_reset_handler(State(delivery): State<PullDelivery>) -> Response {
    let body = delivery.read_and_reset();
    debug!(bytes = body.len(), "Served metrics and reset counters");
    text_response(body)
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    delivery: PullDelivery,
    listen_addr: SocketAddr,
    config: HttpConfig,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(delivery: PullDelivery, listen_addr: SocketAddr, config: HttpConfig) -> Self {
        Self {
            delivery,
            listen_addr,
            config,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.delivery, &self.config);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.config.metrics_path,
            reset_path = %self.config.reset_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
