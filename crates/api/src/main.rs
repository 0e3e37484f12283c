//! Wallet push notification service binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use walletpush_common::config::AppConfig;
use walletpush_common::db::create_pool;
use walletpush_indexer::explorer::BlockscoutClient;
use walletpush_indexer::progress::PgProgressStore;
use walletpush_indexer::scheduler::PollScheduler;
use walletpush_notifier::dispatcher::{DispatcherConfig, NotificationDispatcher};
use walletpush_notifier::i18n::Catalog;
use walletpush_notifier::push::FcmPushBackend;
use walletpush_notifier::registry::PgDeviceRegistry;

use walletpush_api::routes::create_router;
use walletpush_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "walletpush_api=info,walletpush_indexer=info,walletpush_notifier=info,tower_http=info",
            )
        }))
        .init();

    tracing::info!("Starting wallet push notification service...");

    // Load configuration
    let config = AppConfig::from_env()?;
    if config.notifications_disabled {
        tracing::warn!(
            environment = %config.environment,
            "Push delivery disabled for local environment"
        );
    }

    // Progress store must be reachable before polling starts
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    let explorer = BlockscoutClient::new(
        config.explorer_api_url.clone(),
        Duration::from_millis(config.explorer_timeout_ms),
    )?;
    let push = FcmPushBackend::new(config.push_api_url.clone(), config.push_auth_token.clone())?;
    let catalog = Catalog::bundled(&config.default_locale)?;

    let dispatcher = NotificationDispatcher::new(
        Arc::new(PgDeviceRegistry::new(pool.clone())),
        Arc::new(push),
        Arc::new(catalog),
        DispatcherConfig {
            notification_ttl: Duration::from_millis(config.notification_ttl_ms),
            default_locale: config.default_locale.clone(),
            notifications_disabled: config.notifications_disabled,
        },
    );

    let scheduler = Arc::new(PollScheduler::from_config(
        &config,
        Arc::new(explorer),
        Arc::new(PgProgressStore::new(pool)),
        Arc::new(dispatcher),
    ));
    if scheduler.channels().is_empty() {
        tracing::warn!("No channels have tracked contracts; nothing will be polled");
    }
    scheduler.run().await;

    // Build router
    let port = config.port;
    let state = AppState::new(scheduler.clone(), config);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
