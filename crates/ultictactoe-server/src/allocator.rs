use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use tokio::sync::mpsc;

use ultictactoe_core::net::messages::{ClientMessage, CodeAllocatedMsg, ServerMessage};
use ultictactoe_core::net::protocol::decode_client_message;

use crate::error::AppError;
use crate::state::AppState;
use crate::ws::{
    ConnectionSlot, RateLimiter, acquire_slot, client_ip, queue_message, spawn_writer, upgrade,
};

/// Sent when every code is taken by a live room or a reservation.
pub const CODES_EXHAUSTED: &str = "No room codes available. Please try again later.";

/// `GET /ws/lobby/`: short-lived connection that hands out room codes.
pub async fn allocator_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let ip = client_ip(&request);
    let slot = acquire_slot(&state, ip).await?;
    let ws = upgrade(&state, request).await?;
    Ok(ws
        .on_upgrade(move |socket| handle_allocator_socket(socket, state, slot))
        .into_response())
}

async fn handle_allocator_socket(socket: WebSocket, state: AppState, _slot: ConnectionSlot) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.member_message_buffer);
    spawn_writer(ws_sender, rx);

    let limits = &state.config.limits;
    let mut rate_limiter = RateLimiter::new(limits.ws_rate_limit_per_sec, limits.ws_rate_limit_per_sec);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        if !rate_limiter.allow() {
            tracing::warn!("Allocator connection rate limited");
            continue;
        }
        if text.len() > limits.max_message_size {
            continue;
        }

        match decode_client_message(text.as_str()) {
            Ok(ClientMessage::RequestCode) => {
                let allocated = state.registry.write().await.allocate_code();
                let reply = match allocated {
                    Some(code) => {
                        tracing::info!(%code, "Room code allocated");
                        ServerMessage::CodeAllocated(CodeAllocatedMsg { code })
                    },
                    None => ServerMessage::error(CODES_EXHAUSTED),
                };
                queue_message(&tx, &reply);
            },
            Ok(other) => {
                tracing::debug!(action = other.action(), "Ignoring action on allocator connection");
            },
            Err(e) => tracing::debug!(error = %e, "Dropping undecodable allocator frame"),
        }
    }

    tracing::debug!("Allocator connection closed");
}
