//! Lobby controller: sequences the allocator exchange and the room session
//! over browser WebSockets and reports what the page should show.
//!
//! The controller owns at most one connection at a time. A room session is
//! only opened after the allocator connection has reported closed, so the
//! two never overlap.

use ultictactoe_core::allocator::{AllocationEvent, CodeRequest};
use ultictactoe_core::error::LobbyError;
use ultictactoe_core::net::messages::ClientMessage;
use ultictactoe_core::net::protocol::{
    ALLOCATOR_PATH, CLOSE_NORMAL, LEAVE_REASON, encode_client_message, room_path,
};
use ultictactoe_core::player::Member;
use ultictactoe_core::room::RoomCode;
use ultictactoe_core::session::{RoomSession, SessionEvent};

use crate::diag::{console_log, console_warn};
use crate::net_client::{WsClient, WsEvent};

/// Something the page should reflect after a [`LobbyController::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyUpdate {
    Status(String),
    /// Admission confirmed; show the lobby with an empty member list.
    LobbyOpened { room: RoomCode, is_host: bool },
    Members {
        members: Vec<Member>,
        count: usize,
        can_start: bool,
    },
    /// Hide the lobby; nothing is left of the session.
    LobbyClosed,
    Error(LobbyError),
    Navigate(String),
}

#[derive(Default)]
enum Stage {
    #[default]
    Idle,
    Allocating {
        request: CodeRequest,
        socket: WsClient,
        nickname: String,
    },
    /// Code received; waiting for the allocator connection to finish closing.
    AwaitingAllocatorClose {
        code: RoomCode,
        nickname: String,
        socket: WsClient,
    },
    InRoom {
        session: RoomSession,
        socket: WsClient,
    },
}

pub struct LobbyController {
    /// `ws://host` or `wss://host` of the page.
    ws_base: String,
    stage: Stage,
}

impl LobbyController {
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into(),
            stage: Stage::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.stage, Stage::Idle)
    }

    /// The active room session, if one is open.
    pub fn session(&self) -> Option<&RoomSession> {
        match &self.stage {
            Stage::InRoom { session, .. } => Some(session),
            _ => None,
        }
    }

    /// The connection currently owned by the controller.
    pub fn socket(&self) -> Option<&WsClient> {
        match &self.stage {
            Stage::Idle => None,
            Stage::Allocating { socket, .. }
            | Stage::AwaitingAllocatorClose { socket, .. }
            | Stage::InRoom { socket, .. } => Some(socket),
        }
    }

    /// Request a fresh room code, then join it as `nickname`.
    pub fn create_game(&mut self, nickname: &str) -> Result<(), LobbyError> {
        self.leave();
        let mut socket = WsClient::new();
        socket
            .connect(&format!("{}{ALLOCATOR_PATH}", self.ws_base))
            .map_err(|e| LobbyError::AllocationFailure(e.to_string()))?;
        self.stage = Stage::Allocating {
            request: CodeRequest::new(),
            socket,
            nickname: nickname.to_string(),
        };
        Ok(())
    }

    /// Join (or create) the room named by user input.
    pub fn join_game(&mut self, raw_code: &str, nickname: &str) -> Result<(), LobbyError> {
        let code = RoomCode::parse(raw_code)
            .map_err(|_| LobbyError::ValidationError("Enter a room code first.".to_string()))?;
        self.leave();
        self.open_room(code, nickname)
    }

    /// Ask the server to start the game. Refused locally unless this client
    /// is the host of a room with enough members.
    pub fn request_start(&mut self) -> Result<(), LobbyError> {
        let Stage::InRoom { session, socket } = &self.stage else {
            return Err(LobbyError::ValidationError(
                "You are not in a lobby.".to_string(),
            ));
        };
        let msg = session.request_start()?;
        send(socket, &msg).map_err(|_| LobbyError::TransportClosed)
    }

    /// Close whatever connection is open. Safe to call in any stage.
    pub fn leave(&mut self) {
        match std::mem::take(&mut self.stage) {
            Stage::Idle => {},
            Stage::InRoom { session, socket } => {
                let (code, reason) = session.leave();
                close(&socket, code, reason);
            },
            Stage::Allocating { socket, .. } | Stage::AwaitingAllocatorClose { socket, .. } => {
                close(&socket, CLOSE_NORMAL, LEAVE_REASON);
            },
        }
    }

    /// Process every queued transport event.
    pub fn poll(&mut self) -> Vec<LobbyUpdate> {
        let mut updates = Vec::new();
        loop {
            let events = match self.socket() {
                Some(socket) => socket.drain_events(),
                None => break,
            };
            if events.is_empty() {
                break;
            }
            for event in events {
                if self.apply(event, &mut updates) {
                    // Connection replaced; the old one's leftovers are stale.
                    break;
                }
            }
        }
        updates
    }

    /// Feed one event. Returns true when the owned connection changed.
    fn apply(&mut self, event: WsEvent, updates: &mut Vec<LobbyUpdate>) -> bool {
        match std::mem::take(&mut self.stage) {
            Stage::Idle => false,
            Stage::Allocating {
                mut request,
                socket,
                nickname,
            } => {
                let outcome = match event {
                    WsEvent::Open => request.on_open(),
                    WsEvent::Text(text) => request.on_text(&text),
                    WsEvent::Error => request.on_error(),
                    WsEvent::Closed => request.on_close(),
                };
                match outcome {
                    AllocationEvent::Send(msg) => {
                        if let Err(e) = send(&socket, &msg) {
                            console_warn!("Failed to request a room code: {e}");
                        }
                        updates.push(LobbyUpdate::Status("Requesting a room code…".to_string()));
                    },
                    AllocationEvent::Allocated(code) => {
                        close(&socket, CLOSE_NORMAL, "");
                        self.stage = Stage::AwaitingAllocatorClose {
                            code,
                            nickname,
                            socket,
                        };
                        return false;
                    },
                    AllocationEvent::Failed(e) => {
                        close(&socket, CLOSE_NORMAL, LEAVE_REASON);
                        updates.push(LobbyUpdate::Error(e));
                        return true;
                    },
                    AllocationEvent::Ignored => {},
                }
                self.stage = Stage::Allocating {
                    request,
                    socket,
                    nickname,
                };
                false
            },
            Stage::AwaitingAllocatorClose {
                code,
                nickname,
                socket,
            } => match event {
                WsEvent::Closed | WsEvent::Error => {
                    drop(socket);
                    if let Err(e) = self.open_room(code, &nickname) {
                        updates.push(LobbyUpdate::Error(e));
                    }
                    true
                },
                _ => {
                    self.stage = Stage::AwaitingAllocatorClose {
                        code,
                        nickname,
                        socket,
                    };
                    false
                },
            },
            Stage::InRoom {
                mut session,
                socket,
            } => {
                let outcome = match event {
                    WsEvent::Open => session.on_open(),
                    WsEvent::Text(text) => session.handle_text(&text),
                    WsEvent::Error | WsEvent::Closed => session.on_close(),
                };
                self.apply_session_event(outcome, session, socket, updates)
            },
        }
    }

    fn apply_session_event(
        &mut self,
        event: SessionEvent,
        session: RoomSession,
        socket: WsClient,
        updates: &mut Vec<LobbyUpdate>,
    ) -> bool {
        match event {
            SessionEvent::Send(msg) => {
                if let Err(e) = send(&socket, &msg) {
                    console_warn!("Failed to send {}: {e}", msg.action());
                }
                updates.push(LobbyUpdate::Status(format!(
                    "Connected to lobby {}, waiting for players…",
                    session.room_code()
                )));
            },
            SessionEvent::Joined { room, is_host } => {
                console_log!("Joined lobby {room} (host: {is_host})");
                updates.push(LobbyUpdate::LobbyOpened { room, is_host });
            },
            SessionEvent::MembershipChanged { can_start } => {
                let membership = session.membership();
                updates.push(LobbyUpdate::Members {
                    members: membership.members().to_vec(),
                    count: membership.count(),
                    can_start,
                });
            },
            SessionEvent::Failed(e) => {
                close(&socket, CLOSE_NORMAL, LEAVE_REASON);
                updates.push(LobbyUpdate::LobbyClosed);
                updates.push(LobbyUpdate::Error(e));
                return true;
            },
            SessionEvent::Closed => {
                updates.push(LobbyUpdate::LobbyClosed);
                return true;
            },
            SessionEvent::Navigate(url) => {
                updates.push(LobbyUpdate::LobbyClosed);
                updates.push(LobbyUpdate::Navigate(url));
            },
            SessionEvent::Ignored => {},
        }
        self.stage = Stage::InRoom { session, socket };
        false
    }

    fn open_room(&mut self, code: RoomCode, nickname: &str) -> Result<(), LobbyError> {
        let mut socket = WsClient::new();
        let url = format!("{}{}", self.ws_base, room_path(&code));
        socket.connect(&url).map_err(|e| {
            console_warn!("Failed to open room connection: {e}");
            LobbyError::TransportClosed
        })?;
        self.stage = Stage::InRoom {
            session: RoomSession::new(code, nickname),
            socket,
        };
        Ok(())
    }
}

fn send(socket: &WsClient, msg: &ClientMessage) -> Result<(), crate::net_client::NetError> {
    match encode_client_message(msg) {
        Ok(text) => socket.send_text(&text),
        Err(e) => {
            console_warn!("Failed to encode {}: {e}", msg.action());
            Ok(())
        },
    }
}

fn close(socket: &WsClient, code: u16, reason: &str) {
    if let Err(e) = socket.close(code, reason) {
        console_warn!("Failed to close connection: {e}");
    }
}
