//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use checkout_types::{CheckoutRepository, PaymentGateway};

use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::CheckoutService;

/// HTTP Server for the Checkout API.
pub struct HttpServer<R: CheckoutRepository, G: PaymentGateway> {
    state: Arc<AppState<R, G>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: CheckoutRepository, G: PaymentGateway> HttpServer<R, G> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: CheckoutService<R, G>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()), // 100 req/min default
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: CheckoutService<R, G>, requests_per_minute: u32) -> Self {
        use std::time::Duration;
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api-docs/openapi.json", get(handlers::openapi_json))
            .route("/api/products", post(handlers::create_product::<R, G>))
            .route("/api/products/{id}", get(handlers::get_product::<R, G>))
            .route(
                "/api/orders",
                post(handlers::create_order::<R, G>).get(handlers::list_orders::<R, G>),
            )
            .route("/api/orders/{id}", get(handlers::get_order::<R, G>))
            .route(
                "/api/orders/{id}/payment",
                post(handlers::process_payment::<R, G>),
            )
            .route("/api/orders/{id}/void", post(handlers::void_order::<R, G>))
            .route("/api/orders/{id}/sync", post(handlers::sync_order::<R, G>))
            .route(
                "/api/webhooks/gateway",
                post(handlers::gateway_webhook::<R, G>),
            )
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
