//! Biblos Server — School Library Circulation Backend

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblos_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{worker::JobWorker, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("biblos_server={},tower_http=debug", config.logging.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Biblos Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Arc::new(Services::new(repository));

    // Start the background job worker
    if config.worker.enabled {
        let worker = JobWorker::new(
            services.jobs.clone(),
            config.worker.worker_id(),
            Duration::from_secs(config.worker.poll_interval_secs),
        );
        tokio::spawn(worker.run());
    }

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Circulation
        .route("/circulation/checkout", post(api::circulation::checkout))
        .route("/circulation/checkin", post(api::circulation::checkin))
        .route("/loans", get(api::circulation::list_loans))
        .route("/loans/:id/renew", post(api::circulation::renew_loan))
        .route("/items/:barcode/status", post(api::circulation::set_item_status))
        // Holds
        .route("/holds", post(api::holds::create_hold))
        .route("/holds", get(api::holds::list_holds))
        .route("/holds/:id", get(api::holds::get_hold))
        .route("/holds/:id/cancel", post(api::holds::cancel_hold))
        .route("/holds/:id/fulfill", post(api::holds::fulfill_hold))
        .route(
            "/maintenance/holds/expire-ready",
            post(api::holds::expire_ready),
        )
        // Jobs
        .route("/jobs/expire-ready-holds", post(api::jobs::enqueue_expire_ready))
        .route("/jobs/:id", get(api::jobs::get_job))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
