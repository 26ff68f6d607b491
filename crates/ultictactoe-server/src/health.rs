use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
    pub members: usize,
    pub reserved_codes: usize,
}

/// Server status, connection count and room counts as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws = state.ws_connection_count.load(Ordering::Relaxed);
    let stats = state.registry.read().await.stats();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket: ws },
        rooms: RoomInfo {
            active: stats.rooms,
            members: stats.members,
            reserved_codes: stats.reservations,
        },
    })
}

/// Ready unless the server is at its WebSocket connection cap.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= state.config.limits.max_ws_connections {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready: connection limit reached",
        );
    }
    (StatusCode::OK, "ready")
}
