use serde::{Deserialize, Serialize};

use crate::player::{ClientId, Member};
use crate::room::RoomCode;

// ============================================================================
// Client -> Server
// ============================================================================

/// Messages a client sends, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask the allocator endpoint for a fresh room code.
    RequestCode,
    CreateOrJoin(CreateOrJoinMsg),
    StartGame,
    GameMove(GameMoveMsg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrJoinMsg {
    #[serde(default)]
    pub nickname: String,
}

/// A move on the 9x9 board: `big` picks the sub-board, `small` the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMoveMsg {
    pub big: u8,
    pub small: u8,
}

// ============================================================================
// Server -> Client
// ============================================================================

/// Messages the server sends, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    CodeAllocated(CodeAllocatedMsg),
    Joined(JoinedMsg),
    PlayerList(PlayerListMsg),
    Error(ErrorMsg),
    Start(StartMsg),
    Move(MoveMsg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAllocatedMsg {
    pub code: RoomCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedMsg {
    pub room: RoomCode,
    pub your_id: ClientId,
    pub you_are_host: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerListMsg {
    pub players: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMsg {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveMsg {
    pub big: u8,
    pub small: u8,
}

impl ClientMessage {
    /// Wire tag, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            Self::RequestCode => "request_code",
            Self::CreateOrJoin(_) => "create_or_join",
            Self::StartGame => "start_game",
            Self::GameMove(_) => "game_move",
        }
    }
}

impl ServerMessage {
    /// Wire tag, for logging.
    pub fn event(&self) -> &'static str {
        match self {
            Self::CodeAllocated(_) => "code_allocated",
            Self::Joined(_) => "joined",
            Self::PlayerList(_) => "player_list",
            Self::Error(_) => "error",
            Self::Start(_) => "start",
            Self::Move(_) => "move",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorMsg {
            message: message.into(),
        })
    }
}
