use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{ConnectInfo, FromRequest, Path, Request, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use ultictactoe_core::net::messages::{ClientMessage, JoinedMsg, ServerMessage, StartMsg};
use ultictactoe_core::net::protocol::{decode_client_message, encode_server_message};
use ultictactoe_core::player::ClientId;
use ultictactoe_core::room::RoomCode;

use crate::error::AppError;
use crate::registry::{MemberSender, StartError};
use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

/// Connection-cap slots held for the lifetime of one socket.
pub struct ConnectionSlot {
    _ip: IpConnectionGuard,
    _count: ConnectionGuard,
}

/// Peer address recorded by `into_make_service_with_connect_info`.
pub fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Enforce the global and per-IP connection caps before an upgrade.
pub async fn acquire_slot(state: &AppState, ip: IpAddr) -> Result<ConnectionSlot, AppError> {
    let max_ws = state.config.limits.max_ws_connections;
    let Some(count_guard) =
        ConnectionGuard::try_acquire(Arc::clone(&state.ws_connection_count), max_ws)
    else {
        tracing::warn!(max = max_ws, "WS connection limit reached");
        return Err(AppError::Unavailable(
            "Server is at its connection limit".to_string(),
        ));
    };

    let max_per_ip = state.config.limits.max_ws_per_ip;
    let Some(ip_guard) =
        IpConnectionGuard::try_acquire(ip, Arc::clone(&state.ws_per_ip), max_per_ip).await
    else {
        tracing::warn!(%ip, max_per_ip, "Per-IP WS connection limit reached");
        return Err(AppError::TooManyConnections(
            "Too many connections from this address".to_string(),
        ));
    };

    Ok(ConnectionSlot {
        _ip: ip_guard,
        _count: count_guard,
    })
}

/// Complete the WebSocket handshake for an already admitted request.
pub async fn upgrade(state: &AppState, request: Request) -> Result<WebSocketUpgrade, AppError> {
    WebSocketUpgrade::from_request(request, state)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// `GET /ws/game/{room_name}/`: one room session per connection.
pub async fn room_handler(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let code = RoomCode::parse(&room_name)
        .map_err(|e| AppError::BadRequest(format!("Invalid room name: {e}")))?;
    let ip = client_ip(&request);
    let slot = acquire_slot(&state, ip).await?;
    let ws = upgrade(&state, request).await?;

    Ok(ws
        .on_upgrade(move |socket| handle_room_socket(socket, state, code, slot))
        .into_response())
}

async fn handle_room_socket(socket: WebSocket, state: AppState, code: RoomCode, _slot: ConnectionSlot) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.member_message_buffer);
    spawn_writer(ws_sender, rx);

    tracing::debug!(room = %code, "Room connection opened");

    let member = read_loop(&mut ws_receiver, &state, &code, &tx).await;

    let Some(member_id) = member else {
        tracing::debug!(room = %code, "Connection closed before joining");
        return;
    };

    let mut registry = state.registry.write().await;
    if let Some(outcome) = registry.leave(&code, &member_id) {
        if let Some(new_host) = &outcome.new_host {
            tracing::info!(room = %code, host = %new_host, "Host role migrated");
        }
        if outcome.broadcast {
            registry.broadcast_player_list(&code);
        }
    }
    drop(registry);

    tracing::info!(member = %member_id, room = %code, "Member disconnected");
}

/// Handle inbound frames until the socket closes. Returns the member id if
/// the connection joined the room.
async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    code: &RoomCode,
    tx: &MemberSender,
) -> Option<ClientId> {
    let limits = &state.config.limits;
    let mut rate_limiter = RateLimiter::new(limits.ws_rate_limit_per_sec, limits.ws_rate_limit_per_sec);
    let mut member: Option<ClientId> = None;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(room = %code, "Rate limited");
            continue;
        }
        if text.len() > limits.max_message_size {
            continue;
        }

        let client_msg = match decode_client_message(text.as_str()) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(room = %code, error = %e, "Dropping undecodable frame");
                continue;
            },
        };

        match client_msg {
            ClientMessage::CreateOrJoin(join) => {
                if member.is_some() {
                    tracing::debug!(room = %code, "Ignoring repeated create_or_join");
                    continue;
                }
                member = handle_join(state, code, &join.nickname, tx).await;
            },
            ClientMessage::StartGame => handle_start(state, code, member.as_ref(), tx).await,
            ClientMessage::GameMove(mv) => {
                if let Some(id) = &member {
                    state.registry.read().await.relay_move(code, id, mv.big, mv.small);
                }
            },
            ClientMessage::RequestCode => {
                tracing::debug!(room = %code, "Ignoring request_code on a room connection");
            },
        }
    }

    member
}

async fn handle_join(
    state: &AppState,
    code: &RoomCode,
    nickname: &str,
    tx: &MemberSender,
) -> Option<ClientId> {
    let mut registry = state.registry.write().await;
    match registry.join(code, nickname, tx.clone()) {
        Ok(admission) => {
            // `joined` is queued before the first `player_list` on the same
            // channel, so the client always sees them in that order.
            let joined = ServerMessage::Joined(JoinedMsg {
                room: code.clone(),
                your_id: admission.member_id.clone(),
                you_are_host: admission.is_host,
            });
            registry.send_to_member(code, &admission.member_id, &joined);
            registry.broadcast_player_list(code);
            drop(registry);

            tracing::info!(
                member = %admission.member_id,
                room = %code,
                host = admission.is_host,
                "Member joined"
            );
            Some(admission.member_id)
        },
        Err(e) => {
            drop(registry);
            tracing::info!(room = %code, error = %e, "Join rejected");
            queue_message(tx, &ServerMessage::error(e.to_string()));
            None
        },
    }
}

async fn handle_start(
    state: &AppState,
    code: &RoomCode,
    member: Option<&ClientId>,
    tx: &MemberSender,
) {
    let Some(member_id) = member else {
        queue_message(tx, &ServerMessage::error(StartError::NotHost.to_string()));
        return;
    };

    let mut registry = state.registry.write().await;
    match registry.start_game(code, member_id) {
        Ok(url) => {
            tracing::info!(member = %member_id, room = %code, %url, "Game starting");
            registry.broadcast_to_room(code, &ServerMessage::Start(StartMsg { url }));
        },
        Err(e) => {
            tracing::debug!(member = %member_id, room = %code, error = %e, "Start rejected");
            registry.send_to_member(code, member_id, &ServerMessage::error(e.to_string()));
        },
    }
}

/// Encode and queue a frame on a connection's own writer channel.
pub fn queue_message(tx: &MemberSender, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(text) => {
            if let Err(e) = tx.try_send(Utf8Bytes::from(text)) {
                tracing::debug!(event = msg.event(), error = %e, "Failed to queue message");
            }
        },
        Err(e) => tracing::warn!(event = msg.event(), error = %e, "Failed to encode message"),
    }
}

/// Forward queued frames to the socket until every sender is gone.
pub fn spawn_writer(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Utf8Bytes>) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
pub(crate) struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    pub(crate) fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    pub(crate) fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
