use ccb_ops::config::Config;
use ccb_ops::db_storage::{self, PgDirectory, PgOperationStore};
use ccb_ops::handlers::{self, AppState};
use ccb_ops::identity::GoTrueClient;
use ccb_ops::lifecycle::LifecycleController;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool and the auth
/// client, then serves the API with body-size and per-IP rate limits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ccb_ops=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db_storage::connect(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let identity = GoTrueClient::new(config.auth_base_url.clone(), config.auth_api_key.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize auth client: {}", e))?;
    tracing::info!("✓ Auth client initialized: {}", config.auth_base_url);

    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let controller = LifecycleController::new(Arc::new(PgOperationStore::new(pool)));
    let app_state = Arc::new(AppState::new(
        controller,
        Arc::new(identity),
        directory.clone(),
        directory,
    ));

    // One token replenished every 1000/rate ms per IP, burst of twice the rate
    let replenish_ms = (1000 / config.rate_limit_per_second).max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms)
            .burst_size((config.rate_limit_per_second * 2) as u32)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = handlers::router(app_state)
        .layer(
            ServiceBuilder::new()
                // 1MB is far above any form or paste payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // The governor keys on the peer address when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
