//! Paylane Reconciliation API
//!
//! HTTP service in front of the payment & subscription reconciliation
//! engine.
//!
//! ## Endpoints
//!
//! - `POST /webhooks/paystack` - Card/billing provider webhooks
//! - `POST /webhooks/stitch` - Bank-EFT/disbursement provider webhooks
//! - `GET /payments/callback` - Customer redirect after a bank payment
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

mod config;
mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use paylane_db::Repositories;
use paylane_recon::{PaystackClient, Reconciler, SignatureVerifier, StitchClient, Stores};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::state::AppState;

/// How often the subscription expiry sweep runs
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("recon_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Paylane Reconciliation API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        commission_bps = config.recon.commission_bps,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool
    let pool = paylane_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Create repositories and provider clients
    let repos = Repositories::new(pool.clone());
    let paystack = PaystackClient::new(&config.paystack_secret_key, config.provider_timeout);
    let stitch = StitchClient::new(&config.stitch_api_key, config.provider_timeout);

    // Create the engine
    let reconciler = Reconciler::new(
        Stores::postgres(&repos),
        Arc::new(paystack),
        Arc::new(stitch),
        config.recon.clone(),
    );
    let verifier = SignatureVerifier::new(
        config.paystack_webhook_secret.clone(),
        config.stitch_webhook_secret.clone(),
    );

    // Create application state
    let state = AppState::new(reconciler, verifier, pool, config.clone());

    // Periodic subscription expiry sweep
    tokio::spawn(expiry_sweep(state.reconciler.clone()));

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    run_http_server(app, addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // Webhook routes use raw bodies; no JSON extraction before the HMAC
    let webhook_routes = Router::new()
        .route("/webhooks/paystack", post(handlers::paystack_webhook))
        .route("/webhooks/stitch", post(handlers::stitch_webhook));

    // Customer-facing redirect callback
    let callback_routes =
        Router::new().route("/payments/callback", get(handlers::payment_callback));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    // Combine all routes
    Router::new()
        .merge(webhook_routes)
        .merge(callback_routes)
        .layer(middleware)
        .merge(health_routes) // Health routes without timeout
        .merge(metrics_route) // Metrics route without timeout
        .with_state(state)
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn expiry_sweep(reconciler: Arc<Reconciler>) {
    let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = reconciler.expire_due_subscriptions().await {
            tracing::error!(error = %e, "subscription expiry sweep failed");
        }
    }
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Webhook processing is storage-bound; callback reconciliation adds a
    // provider round-trip, hence the wider buckets.
    let recon_latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("recon_webhook_duration_seconds".to_string()),
        recon_latency_buckets,
    )?;

    let handle = builder.install_recorder()?;

    // Register metrics with descriptions
    metrics::describe_counter!(
        "recon_webhooks_processed_total",
        "Total webhook deliveries processed, by provider and result"
    );
    metrics::describe_counter!(
        "recon_webhook_duplicates_total",
        "Webhook deliveries already seen in the delivery ledger"
    );
    metrics::describe_counter!(
        "recon_stale_transitions_total",
        "Transitions rejected because the entity already left the expected state"
    );
    metrics::describe_counter!(
        "recon_disbursements_created_total",
        "Disbursements submitted to the payout provider"
    );
    metrics::describe_counter!(
        "recon_disbursements_failed_total",
        "Disbursement submissions that failed and were flagged for ops"
    );
    metrics::describe_histogram!(
        "recon_webhook_duration_seconds",
        "Webhook processing latency in seconds by provider"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
