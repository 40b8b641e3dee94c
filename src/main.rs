// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::hex_aggregator::ResolutionLadder;
use crate::application::layer_service::LayerService;
use crate::application::map_view::MapView;
use crate::application::poller::SnapshotPoller;
use crate::domain::thing::EntityAssembler;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::dataset_api::HttpDatasetFeed;
use crate::infrastructure::feed_client::FeedClient;
use crate::infrastructure::frost_feed::HttpSensorFeed;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_dashboard_config().context("Failed to load config/dashboard")?;

    // Create feeds (infrastructure layer)
    let sensor_feed = Arc::new(HttpSensorFeed::new(
        FeedClient::new(config.sensor_feed.timeout())?,
        config.sensor_feed.url.clone(),
        config.sensor_feed.token.clone(),
    ));
    let dataset_feed = Arc::new(HttpDatasetFeed::new(
        FeedClient::new(config.dataset_feed.timeout())?,
        config.dataset_feed.url.clone(),
    ));

    // Start the map view and its refresh loop (application layer)
    let assembler = EntityAssembler::new(config.signal_policy(), config.staleness_policy());
    let (view, view_task) = MapView::new(
        assembler,
        config.locator(),
        ResolutionLadder::default(),
        config.view.initial_zoom,
    )
    .start();
    let poller = SnapshotPoller::new(
        sensor_feed.clone(),
        view.clone(),
        config.sensor_feed.refresh_interval(),
    )
    .spawn();

    // Create application state
    let state = Arc::new(AppState {
        view: view.clone(),
        sensor_feed,
        layers: LayerService::new(dataset_feed.clone(), view.clone()),
        dataset_feed,
        history_limit: config.sensor_feed.history_limit,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting sound-map service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Unmount: clear the view, then let the poller notice the closed channel
    if let Ok(cleared) = view.stop().await {
        tracing::info!("Cleared {} shapes on shutdown", cleared);
    }
    poller.abort();
    let _ = view_task.await;

    Ok(())
}
