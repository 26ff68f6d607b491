use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Longest room code accepted on input; longer input is truncated.
pub const MAX_ROOM_CODE_LEN: usize = 90;

/// Number of decimal digits in a server-generated room code.
pub const GENERATED_CODE_DIGITS: usize = 4;

/// Default room capacity.
pub const DEFAULT_MAX_MEMBERS: usize = 2;

/// Members required before the host may start the game.
pub const MIN_MEMBERS_TO_START: usize = 2;

/// Short identifier of a live room.
///
/// Codes are case-insensitive on input: [`RoomCode::parse`] trims the raw
/// text, replaces anything outside `[A-Za-z0-9._-]` with `_`, truncates to
/// [`MAX_ROOM_CODE_LEN`] characters and uppercases the result, so `"ab12"`
/// and `" AB12 "` name the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCodeError {
    Empty,
}

impl fmt::Display for RoomCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "room code is empty"),
        }
    }
}

impl std::error::Error for RoomCodeError {}

impl RoomCode {
    pub fn parse(raw: &str) -> Result<Self, RoomCodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RoomCodeError::Empty);
        }
        let code = trimmed
            .chars()
            .take(MAX_ROOM_CODE_LEN)
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Generate a random zero-padded 4-digit room code (e.g. `"0042"`).
/// Uniqueness against live rooms is the caller's job.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    let n: u32 = rng.random_range(0..10_000);
    RoomCode(format!("{n:0width$}", width = GENERATED_CODE_DIGITS))
}

/// Lifecycle of a room on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    /// Members are gathering; departures are broadcast.
    #[default]
    Lobby,
    /// The host started the game and members are moving to the game page.
    Starting,
}
