//! # Checkout Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter and the gateway client
//! - Create the checkout service
//! - Start the HTTP server

mod config;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_hex::{CheckoutService, inbound::HttpServer, outbound::HttpPaymentGateway};
use checkout_repo::build_repo;

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("checkout-service"), provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer()?;
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,checkout_app=debug,checkout_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting checkout server on port {}", config.port);
    tracing::info!("Using database: {}", config.database_url);
    tracing::info!("Using payment gateway: {}", config.gateway.base_url);

    // Build repository (handles connection and schema)
    let repo = build_repo(&config.database_url).await?;

    // Gateway client; the service enforces the same deadline around each call
    let gateway_timeout = config.gateway.timeout;
    let gateway = HttpPaymentGateway::new(config.gateway)?;

    let mut service = CheckoutService::new(repo, gateway).with_gateway_timeout(gateway_timeout);
    match config.events_secret {
        Some(secret) => service = service.with_events_secret(secret),
        None => tracing::warn!("GATEWAY_EVENTS_SECRET not set, webhook checksums are not verified"),
    }

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(service, config.rate_limit_per_minute);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}
