//! Client-side room session state machine.
//!
//! [`RoomSession`] owns everything a browser tab knows about its lobby: the
//! room code, nickname, the id the server bound to this connection and the
//! last member list. It never touches a transport. The caller feeds it
//! transport events (`on_open`, `handle_text`, `on_close`) and acts on the
//! returned [`SessionEvent`], which keeps every transition testable without
//! a socket.

use crate::error::LobbyError;
use crate::net::messages::{
    ClientMessage, CreateOrJoinMsg, JoinedMsg, PlayerListMsg, ServerMessage,
};
use crate::net::protocol::{CLOSE_NORMAL, LEAVE_REASON, decode_server_message};
use crate::player::{ClientId, DEFAULT_NICKNAME, Membership};
use crate::room::{MIN_MEMBERS_TO_START, RoomCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Transport not open yet.
    Connecting,
    /// `create_or_join` sent, waiting for `joined`.
    Joining,
    Joined,
    /// Terminal. Session state has been cleared.
    Failed,
    /// Terminal. The game is starting elsewhere.
    Started,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Started)
    }
}

/// Side effect requested by the session after an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Send this frame over the room connection.
    Send(ClientMessage),
    /// Admission confirmed; show the lobby for `room`.
    Joined { room: RoomCode, is_host: bool },
    /// Member list replaced; re-render it and toggle the start control.
    MembershipChanged { can_start: bool },
    /// Tear down the lobby UI and show the error.
    Failed(LobbyError),
    /// Tear down the lobby UI without a message (never admitted).
    Closed,
    /// Navigate the page to this URL.
    Navigate(String),
    Ignored,
}

/// One client's bound connection state for a single room.
#[derive(Debug)]
pub struct RoomSession {
    room_code: RoomCode,
    nickname: String,
    phase: SessionPhase,
    self_id: Option<ClientId>,
    /// `you_are_host` from `joined`, used until a member list names us.
    host_hint: bool,
    membership: Membership,
}

impl RoomSession {
    pub fn new(room_code: RoomCode, nickname: &str) -> Self {
        let nickname = match nickname.trim() {
            "" => DEFAULT_NICKNAME.to_string(),
            name => name.to_string(),
        };
        Self {
            room_code,
            nickname,
            phase: SessionPhase::Connecting,
            self_id: None,
            host_hint: false,
            membership: Membership::default(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn self_id(&self) -> Option<&ClientId> {
        self.self_id.as_ref()
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// Whether this client holds the host role, as far as it knows.
    pub fn is_host(&self) -> bool {
        let Some(id) = &self.self_id else {
            return false;
        };
        match self.membership.get(id) {
            Some(member) => member.is_host,
            None => self.host_hint,
        }
    }

    /// Start control is offered only to the host of a room with at least
    /// two members.
    pub fn can_start(&self) -> bool {
        self.phase == SessionPhase::Joined
            && self
                .self_id
                .as_ref()
                .is_some_and(|id| self.membership.is_host(id))
            && self.membership.count() >= MIN_MEMBERS_TO_START
    }

    /// Transport opened: ask to create or join the room.
    pub fn on_open(&mut self) -> SessionEvent {
        if self.phase != SessionPhase::Connecting {
            return SessionEvent::Ignored;
        }
        self.phase = SessionPhase::Joining;
        tracing::debug!(room = %self.room_code, nickname = %self.nickname, "Joining room");
        SessionEvent::Send(ClientMessage::CreateOrJoin(CreateOrJoinMsg {
            nickname: self.nickname.clone(),
        }))
    }

    /// Feed one text frame from the room connection.
    pub fn handle_text(&mut self, text: &str) -> SessionEvent {
        match decode_server_message(text) {
            Ok(msg) => self.handle(msg),
            Err(e) => {
                tracing::debug!(room = %self.room_code, error = %e, "Ignoring undecodable frame");
                SessionEvent::Ignored
            },
        }
    }

    /// Single dispatch point for server events.
    pub fn handle(&mut self, msg: ServerMessage) -> SessionEvent {
        if self.phase.is_terminal() {
            tracing::debug!(
                room = %self.room_code,
                event = msg.event(),
                phase = ?self.phase,
                "Dropping event after terminal state"
            );
            return SessionEvent::Ignored;
        }

        match msg {
            ServerMessage::Joined(joined) => self.on_joined(joined),
            ServerMessage::PlayerList(list) => self.on_player_list(list),
            ServerMessage::Error(err) => {
                self.teardown(SessionPhase::Failed);
                SessionEvent::Failed(LobbyError::JoinRejected(err.message))
            },
            ServerMessage::Start(start) => {
                if self.phase != SessionPhase::Joined {
                    tracing::warn!(room = %self.room_code, phase = ?self.phase, "start before joined");
                    return SessionEvent::Ignored;
                }
                self.phase = SessionPhase::Started;
                SessionEvent::Navigate(start.url)
            },
            ServerMessage::CodeAllocated(_) | ServerMessage::Move(_) => SessionEvent::Ignored,
        }
    }

    fn on_joined(&mut self, joined: JoinedMsg) -> SessionEvent {
        if let Some(bound) = &self.self_id {
            if *bound == joined.your_id {
                self.host_hint = joined.you_are_host;
            } else {
                tracing::warn!(
                    room = %self.room_code,
                    bound = %bound,
                    offered = %joined.your_id,
                    "Ignoring joined with a different id"
                );
            }
            return SessionEvent::Ignored;
        }

        if joined.room != self.room_code {
            tracing::warn!(
                requested = %self.room_code,
                admitted = %joined.room,
                "Server admitted us to a different room code"
            );
            self.room_code = joined.room;
        }
        self.self_id = Some(joined.your_id);
        self.host_hint = joined.you_are_host;
        self.phase = SessionPhase::Joined;
        SessionEvent::Joined {
            room: self.room_code.clone(),
            is_host: self.is_host(),
        }
    }

    fn on_player_list(&mut self, list: PlayerListMsg) -> SessionEvent {
        self.membership = Membership::from_wire(list.players, list.count);
        SessionEvent::MembershipChanged {
            can_start: self.can_start(),
        }
    }

    /// Transport closed (or errored) from the other side.
    pub fn on_close(&mut self) -> SessionEvent {
        if self.phase.is_terminal() {
            return SessionEvent::Ignored;
        }
        let was_joined = self.phase == SessionPhase::Joined;
        self.teardown(SessionPhase::Failed);
        if was_joined {
            SessionEvent::Failed(LobbyError::TransportClosed)
        } else {
            SessionEvent::Closed
        }
    }

    /// Build the `start_game` frame, refusing when this client may not start.
    pub fn request_start(&self) -> Result<ClientMessage, LobbyError> {
        if !self.can_start() {
            return Err(LobbyError::ValidationError(format!(
                "Only the host can start, once {MIN_MEMBERS_TO_START} players are in the lobby."
            )));
        }
        Ok(ClientMessage::StartGame)
    }

    /// End the session voluntarily. Returns the close code and reason to
    /// send on the transport.
    pub fn leave(mut self) -> (u16, &'static str) {
        tracing::debug!(room = %self.room_code, "Leaving room");
        self.teardown(SessionPhase::Failed);
        (CLOSE_NORMAL, LEAVE_REASON)
    }

    fn teardown(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.self_id = None;
        self.host_hint = false;
        self.membership.clear();
    }
}
