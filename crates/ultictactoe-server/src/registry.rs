use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use ultictactoe_core::net::messages::{MoveMsg, PlayerListMsg, ServerMessage};
use ultictactoe_core::net::protocol::{MAX_CELL_INDEX, encode_server_message, play_url};
use ultictactoe_core::player::{ClientId, Member, NicknameError, normalize_nickname};
use ultictactoe_core::room::{RoomCode, RoomPhase, generate_room_code};

use crate::config::RoomsConfig;

/// Per-member sender for outbound WebSocket text frames.
/// Bounded so a slow client cannot grow server memory; `Utf8Bytes` clones
/// are cheap when the same frame goes to every member.
pub type MemberSender = mpsc::Sender<Utf8Bytes>;

/// Attempts at drawing a free code before allocation gives up.
const MAX_ALLOCATION_ATTEMPTS: usize = 10_000;

struct RoomMember {
    id: ClientId,
    nickname: String,
    sender: MemberSender,
}

struct RoomEntry {
    /// Join order; the first member inherits the host role.
    members: Vec<RoomMember>,
    host: Option<ClientId>,
    phase: RoomPhase,
}

impl RoomEntry {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            host: None,
            phase: RoomPhase::Lobby,
        }
    }

    fn player_list(&self) -> PlayerListMsg {
        let players: Vec<Member> = self
            .members
            .iter()
            .map(|m| Member {
                id: m.id.clone(),
                name: m.nickname.clone(),
                is_host: self.host.as_ref() == Some(&m.id),
            })
            .collect();
        let count = players.len();
        PlayerListMsg {
            players,
            count: Some(count),
        }
    }
}

/// Result of a successful `create_or_join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub member_id: ClientId,
    pub is_host: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    Full { max: usize },
    AlreadyStarted,
    InvalidNickname(NicknameError),
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full { max } => write!(f, "Lobby is full (max. {max} players)."),
            Self::AlreadyStarted => write!(f, "The game has already started."),
            Self::InvalidNickname(e) => write!(f, "Invalid nickname: {e}."),
        }
    }
}

impl std::error::Error for JoinError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    RoomNotFound,
    NotHost,
    NotEnoughMembers { min: usize },
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound => write!(f, "Room not found."),
            Self::NotHost => write!(f, "Only the host can start the game."),
            Self::NotEnoughMembers { min } => write!(f, "At least {min} players are required."),
        }
    }
}

impl std::error::Error for StartError {}

/// What happened to a room when a member left it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The room became empty and was dropped.
    pub destroyed: bool,
    /// Set when the host left and the role moved to this member.
    pub new_host: Option<ClientId>,
    /// Whether the remaining members should get a fresh `player_list`.
    pub broadcast: bool,
}

/// Counts reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub rooms: usize,
    pub members: usize,
    pub reservations: usize,
}

/// Live rooms, their members and host assignment, plus codes handed out by
/// the allocator that nobody has joined yet.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomEntry>,
    reservations: HashMap<RoomCode, Instant>,
    max_members: usize,
    min_members_to_start: usize,
    reservation_ttl: Duration,
    play_path_prefix: String,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(&RoomsConfig::default())
    }
}

impl RoomRegistry {
    pub fn new(config: &RoomsConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            reservations: HashMap::new(),
            max_members: config.max_members,
            min_members_to_start: config.min_members_to_start,
            reservation_ttl: Duration::from_secs(config.code_reservation_secs),
            play_path_prefix: config.play_path_prefix.clone(),
        }
    }

    fn is_reserved(&self, code: &RoomCode) -> bool {
        self.reservations
            .get(code)
            .is_some_and(|at| at.elapsed() < self.reservation_ttl)
    }

    /// Draw a code that is neither a live room nor reserved, and reserve
    /// it. Returns `None` when the code space is exhausted.
    pub fn allocate_code(&mut self) -> Option<RoomCode> {
        let mut rng = rand::rng();
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let code = generate_room_code(&mut rng);
            if !self.rooms.contains_key(&code) && !self.is_reserved(&code) {
                self.reservations.insert(code.clone(), Instant::now());
                return Some(code);
            }
        }
        tracing::warn!(
            rooms = self.rooms.len(),
            reservations = self.reservations.len(),
            "Room code space exhausted"
        );
        None
    }

    /// Admit a member to `code`, creating the room if it does not exist.
    pub fn join(
        &mut self,
        code: &RoomCode,
        nickname: &str,
        sender: MemberSender,
    ) -> Result<Admission, JoinError> {
        let nickname = normalize_nickname(nickname).map_err(JoinError::InvalidNickname)?;

        if let Some(entry) = self.rooms.get(code) {
            if entry.phase == RoomPhase::Starting {
                return Err(JoinError::AlreadyStarted);
            }
            if entry.members.len() >= self.max_members {
                return Err(JoinError::Full {
                    max: self.max_members,
                });
            }
        }

        if !self.rooms.contains_key(code) {
            self.reservations.remove(code);
            tracing::info!(room = %code, "Room created");
        }
        let entry = self.rooms.entry(code.clone()).or_insert_with(RoomEntry::new);

        let member_id = ClientId::generate();
        let is_host = entry.host.is_none();
        if is_host {
            entry.host = Some(member_id.clone());
        }
        entry.members.push(RoomMember {
            id: member_id.clone(),
            nickname,
            sender,
        });

        Ok(Admission { member_id, is_host })
    }

    /// Remove a member. Returns `None` if it was not in the room.
    pub fn leave(&mut self, code: &RoomCode, member_id: &ClientId) -> Option<LeaveOutcome> {
        let entry = self.rooms.get_mut(code)?;
        let index = entry.members.iter().position(|m| &m.id == member_id)?;
        entry.members.remove(index);

        if entry.members.is_empty() {
            self.rooms.remove(code);
            tracing::info!(room = %code, "Room destroyed (empty)");
            return Some(LeaveOutcome {
                destroyed: true,
                new_host: None,
                broadcast: false,
            });
        }

        let mut new_host = None;
        if entry.host.as_ref() == Some(member_id)
            && let Some(next) = entry.members.first()
        {
            entry.host = Some(next.id.clone());
            new_host = Some(next.id.clone());
        }

        Some(LeaveOutcome {
            destroyed: false,
            new_host,
            broadcast: entry.phase == RoomPhase::Lobby,
        })
    }

    /// Validate a start request and move the room to `Starting`. Returns the
    /// game page URL to announce.
    pub fn start_game(
        &mut self,
        code: &RoomCode,
        requester: &ClientId,
    ) -> Result<String, StartError> {
        let entry = self.rooms.get_mut(code).ok_or(StartError::RoomNotFound)?;

        if entry.host.as_ref() != Some(requester) {
            return Err(StartError::NotHost);
        }
        if entry.members.len() < self.min_members_to_start {
            return Err(StartError::NotEnoughMembers {
                min: self.min_members_to_start,
            });
        }

        entry.phase = RoomPhase::Starting;
        Ok(play_url(&self.play_path_prefix, code))
    }

    /// Validate a move and broadcast it to the whole room, sender included.
    /// Returns false when the move was dropped.
    pub fn relay_move(&self, code: &RoomCode, from: &ClientId, big: u8, small: u8) -> bool {
        if big > MAX_CELL_INDEX || small > MAX_CELL_INDEX {
            tracing::debug!(room = %code, big, small, "Dropping out-of-range move");
            return false;
        }
        if !self.is_member(code, from) {
            tracing::debug!(room = %code, member = %from, "Dropping move from non-member");
            return false;
        }
        self.broadcast_to_room(code, &ServerMessage::Move(MoveMsg { big, small }));
        true
    }

    pub fn is_member(&self, code: &RoomCode, member_id: &ClientId) -> bool {
        self.rooms
            .get(code)
            .is_some_and(|e| e.members.iter().any(|m| &m.id == member_id))
    }

    pub fn room_phase(&self, code: &RoomCode) -> Option<RoomPhase> {
        self.rooms.get(code).map(|e| e.phase)
    }

    pub fn player_list(&self, code: &RoomCode) -> Option<PlayerListMsg> {
        self.rooms.get(code).map(RoomEntry::player_list)
    }

    /// Send one message to a single member.
    pub fn send_to_member(&self, code: &RoomCode, member_id: &ClientId, msg: &ServerMessage) {
        let Some(member) = self
            .rooms
            .get(code)
            .and_then(|e| e.members.iter().find(|m| &m.id == member_id))
        else {
            return;
        };
        let Some(frame) = encode_frame(msg) else {
            return;
        };
        if let Err(e) = member.sender.try_send(frame) {
            tracing::debug!(
                member = %member_id, room = %code, error = %e,
                "Failed to send to member (slow or disconnected)"
            );
        }
    }

    /// Encode once and send to every member of the room.
    pub fn broadcast_to_room(&self, code: &RoomCode, msg: &ServerMessage) {
        let Some(entry) = self.rooms.get(code) else {
            return;
        };
        let Some(frame) = encode_frame(msg) else {
            return;
        };
        for member in &entry.members {
            if let Err(e) = member.sender.try_send(frame.clone()) {
                tracing::debug!(
                    member = %member.id, room = %code, event = msg.event(), error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }

    /// Build and broadcast the current member list.
    pub fn broadcast_player_list(&self, code: &RoomCode) {
        if let Some(list) = self.player_list(code) {
            self.broadcast_to_room(code, &ServerMessage::PlayerList(list));
        }
    }

    /// Drop reservations older than the TTL. Returns the number removed.
    pub fn cleanup_expired_reservations(&mut self) -> usize {
        let ttl = self.reservation_ttl;
        let before = self.reservations.len();
        self.reservations.retain(|_, at| at.elapsed() < ttl);
        before - self.reservations.len()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            rooms: self.rooms.len(),
            members: self.rooms.values().map(|e| e.members.len()).sum(),
            reservations: self.reservations.len(),
        }
    }

    #[cfg(test)]
    pub fn room_exists(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }
}

fn encode_frame(msg: &ServerMessage) -> Option<Utf8Bytes> {
    match encode_server_message(msg) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(e) => {
            tracing::warn!(event = msg.event(), error = %e, "Failed to encode server message");
            None
        },
    }
}
