use serde::Serialize;
use serde::de::DeserializeOwned;

use super::messages::{ClientMessage, ServerMessage};
use crate::room::RoomCode;

/// Maximum text frame size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

/// Allocator endpoint path.
pub const ALLOCATOR_PATH: &str = "/ws/lobby/";

/// Prefix of the per-room endpoint; the room code and a trailing slash follow.
pub const ROOM_PATH_PREFIX: &str = "/ws/game/";

/// Default prefix of the game page URL sent in `start`.
pub const DEFAULT_PLAY_PATH_PREFIX: &str = "/play/lobby/";

/// WebSocket close code for a voluntary leave.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close reason sent with [`CLOSE_NORMAL`] when a client leaves the lobby.
pub const LEAVE_REASON: &str = "leave";

/// Highest valid board index for `big` and `small` in a move.
pub const MAX_CELL_INDEX: u8 = 8;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

fn encode<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    let text =
        serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(text)
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Encode a `ClientMessage` as a JSON text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

/// Encode a `ServerMessage` as a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

/// Decode a JSON text frame into a `ClientMessage`.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    decode(text)
}

/// Decode a JSON text frame into a `ServerMessage`.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    decode(text)
}

/// Path of the room endpoint for `code`, e.g. `/ws/game/0042/`.
pub fn room_path(code: &RoomCode) -> String {
    format!("{ROOM_PATH_PREFIX}{code}/")
}

/// Game page URL announced in `start`.
pub fn play_url(prefix: &str, code: &RoomCode) -> String {
    let prefix = prefix.trim_end_matches('/');
    format!("{prefix}/{code}/")
}

/// `ws://host` or `wss://host` depending on whether the page was served
/// over TLS.
pub fn ws_base(secure: bool, host: &str) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!("{scheme}://{host}")
}
