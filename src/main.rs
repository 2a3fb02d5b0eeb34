//! Entitlement Service - Main Application Entry Point
//!
//! This is the REST API server owning account entitlement, API key
//! lifecycle, and quota gating for a metered execution product. It
//! reconciles billing provider webhooks into durable account state and
//! gates every metered execution on a fresh quota decision.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: identity-provider session for the dashboard API,
//!   SHA-256-hashed bearer keys for the execution endpoint
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

use entitlement_service::{AppState, config, db, handlers, middleware};

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let server_port = config.server_port;
    let state = AppState::new(pool, config)?;

    // Dashboard key-management routes (authenticated user session)
    let dashboard_routes = Router::new()
        .route("/api/v1/keys", post(handlers::keys::create_key))
        .route("/api/v1/keys", get(handlers::keys::list_keys))
        .route("/api/v1/keys/{id}/rotate", post(handlers::keys::rotate_key))
        .route("/api/v1/keys/{id}", delete(handlers::keys::revoke_key))
        .route("/api/v1/account/plan", get(handlers::account::get_plan))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::session_auth,
        ));

    // Metered execution route (bearer API key)
    let execution_routes = Router::new()
        .route("/api/v1/execute", post(handlers::execute::execute))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::api_key_auth,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Billing provider deliveries (authenticated by signature, not session)
        .route("/webhooks/billing", post(handlers::webhooks::billing_webhook))
        .merge(dashboard_routes)
        .merge(execution_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
