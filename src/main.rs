use axum::{routing::get, Router};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qroll::api::middleware::auth::{require_instructor, require_student};
use qroll::api::middleware::session::{create_session_layer, AppState};
use qroll::config::Config;
use qroll::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qroll=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting QRoll server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create session layer
    let session_secret = config.session_secret.expose_secret().as_bytes();
    let session_layer = create_session_layer(pool.clone(), session_secret, &config.base_url).await?;
    tracing::info!("Session layer initialized");

    // Schedule the session expiry sweep
    let scheduler = JobScheduler::new().await?;
    let sweep_pool = pool.clone();
    scheduler
        .add(Job::new_async("0 */5 * * * *", move |_id, _lock| {
            let pool = sweep_pool.clone();
            Box::pin(async move {
                if let Err(e) = qroll::jobs::session_expirer::expire_overdue_sessions(&pool).await
                {
                    tracing::error!(error = %e, "Session expiry sweep failed");
                }
            })
        })?)
        .await?;
    scheduler.start().await?;
    tracing::info!("Session expiry sweep scheduled");

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
    };

    // Role-gated route trees
    let instructor_routes = qroll::api::sessions::router()
        .merge(qroll::api::analytics::router())
        .route_layer(axum::middleware::from_fn(require_instructor));

    let student_routes = qroll::api::attendance::router()
        .route_layer(axum::middleware::from_fn(require_student));

    // Build router
    let app = Router::new()
        .route("/health", get(qroll::api::health::health_check))
        .merge(qroll::api::auth::router())
        .merge(instructor_routes)
        .merge(student_routes)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
