pub mod allocator;
pub mod config;
pub mod error;
pub mod health;
pub mod registry;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use ultictactoe_core::net::protocol::{ALLOCATOR_PATH, ROOM_PATH_PREFIX};

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let room_route = format!("{ROOM_PATH_PREFIX}{{room_name}}/");

    let app = Router::new()
        .route(ALLOCATOR_PATH, get(allocator::allocator_handler))
        .route(&room_route, get(ws::room_handler))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .fallback_service(ServeDir::new(&web_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

/// Background task that drops allocator reservations nobody joined in time.
pub fn spawn_reservation_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(state.config.rooms.reservation_sweep_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = state.registry.write().await.cleanup_expired_reservations();
            if removed > 0 {
                tracing::debug!(removed, "Expired room code reservations swept");
            }
        }
    })
}
