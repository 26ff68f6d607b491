use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nickname used when a client sends an empty one.
pub const DEFAULT_NICKNAME: &str = "Player";

/// Longest nickname the server admits, in characters.
pub const MAX_NICKNAME_LEN: usize = 32;

/// Opaque per-connection identity assigned by the server on admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identity (v4 UUID).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of a room's member list, as sent in `player_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: ClientId,
    pub name: String,
    pub is_host: bool,
}

/// Ordered member list of a room (join order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    members: Vec<Member>,
    count: usize,
}

impl Membership {
    /// Build from a `player_list` payload. `count` falls back to the number
    /// of listed members when the server omits it.
    pub fn from_wire(members: Vec<Member>, count: Option<usize>) -> Self {
        let count = count.unwrap_or(members.len());
        Self { members, count }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Member count as reported by the server.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn host(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.is_host)
    }

    pub fn get(&self, id: &ClientId) -> Option<&Member> {
        self.members.iter().find(|m| &m.id == id)
    }

    pub fn is_host(&self, id: &ClientId) -> bool {
        self.get(id).is_some_and(|m| m.is_host)
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.count = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NicknameError {
    TooLong(usize),
    ControlCharacter,
}

impl fmt::Display for NicknameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong(len) => {
                write!(f, "nickname too long: {len} chars (max {MAX_NICKNAME_LEN})")
            },
            Self::ControlCharacter => write!(f, "nickname contains control characters"),
        }
    }
}

impl std::error::Error for NicknameError {}

/// Trim a requested nickname, substituting [`DEFAULT_NICKNAME`] when blank.
pub fn normalize_nickname(raw: &str) -> Result<String, NicknameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(DEFAULT_NICKNAME.to_string());
    }
    let len = name.chars().count();
    if len > MAX_NICKNAME_LEN {
        return Err(NicknameError::TooLong(len));
    }
    if name.chars().any(char::is_control) {
        return Err(NicknameError::ControlCharacter);
    }
    Ok(name.to_string())
}
