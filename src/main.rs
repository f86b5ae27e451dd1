use axum::{routing::get, Router};
use banking_gate::access_guard::AccessGuard;
use banking_gate::config::Config;
use banking_gate::handlers::{self, AppState};
use banking_gate::identity_client::IdentityClient;
use banking_gate::session_events::{SessionEvents, DEFAULT_EVENT_CAPACITY};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The identity provider client and session event bus.
/// - The access guard and its account cache.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banking_gate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let identity_client = IdentityClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize identity client: {}", e))?;
    tracing::info!("✓ Identity client initialized: {}", config.provider_url);

    let session_events = SessionEvents::new(
        DEFAULT_EVENT_CAPACITY,
        Duration::from_secs(config.session_revocation_ttl_secs),
    );

    let guard = AccessGuard::new(
        identity_client,
        session_events,
        Duration::from_secs(config.account_cache_ttl_secs),
    );
    tracing::info!(
        "Account cache initialized ({}s TTL)",
        config.account_cache_ttl_secs
    );

    let app_state = Arc::new(AppState {
        config: config.clone(),
        guard,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: 64KB is plenty for decisions and simulations
            .layer(RequestBodyLimitLayer::new(64 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
