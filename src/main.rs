//! post-scheduler server entry point.
//!
//! Wires the stores, starts the dispatcher loop and the owner notifier, and
//! serves the admin API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use post_scheduler::api;
use post_scheduler::app_state::AppState;
use post_scheduler::channel::LogChannelSender;
use post_scheduler::config::SchedulerConfig;
use post_scheduler::domain::EventBus;
use post_scheduler::persistence::{
    AdminLogStore, MemoryAdminLog, MemoryPostRepository, PgAdminLog, PgPostRepository,
    PgSettingsStore, PostRepository,
};
use post_scheduler::service::{Dispatcher, DispatcherConfig, PostService, run_notifier};
use post_scheduler::settings::{MemorySettings, Settings, SettingsStore, keys};

type Stores = (
    Arc<dyn PostRepository>,
    Arc<dyn AdminLogStore>,
    Arc<dyn SettingsStore>,
);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SchedulerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting post-scheduler");

    let (repo, admin_log, settings_store) = build_stores(&config).await?;
    let settings = Settings::new(settings_store);
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Build service layer
    let post_service = PostService::new(
        repo,
        admin_log,
        settings.clone(),
        event_bus.clone(),
        config.schedule_utc_offset,
    );
    let dispatcher_config = DispatcherConfig {
        send_timeout: config.send_timeout(),
        slot_catch_up_minutes: config.slot_catch_up_minutes,
        utc_offset: config.schedule_utc_offset,
    };
    let dispatcher = if config.dry_run {
        let username = settings.store().get(keys::CHANNEL_USERNAME).await?;
        tracing::warn!("DRY_RUN set, posts are logged instead of sent");
        Dispatcher::new(
            post_service.clone(),
            Arc::new(LogChannelSender::new(username)),
            dispatcher_config,
        )
    } else {
        tracing::warn!("no channel sender configured, dispatch ticks will be skipped");
        Dispatcher::without_sender(post_service.clone(), dispatcher_config)
    };
    let dispatcher = Arc::new(dispatcher);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let notifier = {
        let bus = event_bus.clone();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { run_notifier(&bus, wait_for(rx)).await })
    };
    let dispatch_loop = {
        let dispatcher = Arc::clone(&dispatcher);
        let interval = config.dispatch_interval();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { dispatcher.run(interval, wait_for(rx)).await })
    };

    // Build application state
    let app_state = AppState {
        post_service: Arc::new(post_service),
        dispatcher,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = tokio::join!(dispatch_loop, notifier);
    tracing::info!("post-scheduler stopped");
    Ok(())
}

/// Connects to PostgreSQL and runs migrations, or falls back to in-memory
/// stores when persistence is disabled.
async fn build_stores(config: &SchedulerConfig) -> anyhow::Result<Stores> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, state is lost on restart");
        return Ok((
            Arc::new(MemoryPostRepository::new()),
            Arc::new(MemoryAdminLog::new()),
            Arc::new(MemorySettings::new()),
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("connecting to PostgreSQL")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;
    tracing::info!("database ready");

    Ok((
        Arc::new(PgPostRepository::new(pool.clone())),
        Arc::new(PgAdminLog::new(pool.clone())),
        Arc::new(PgSettingsStore::new(pool)),
    ))
}

/// Resolves once the shutdown flag flips (or its sender is gone).
async fn wait_for(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
