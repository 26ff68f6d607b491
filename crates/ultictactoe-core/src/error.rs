/// Failures surfaced to the user-facing layer. None of them are fatal and
/// none are retried automatically; the user may always try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyError {
    /// The allocator connection ended before a room code arrived.
    AllocationFailure(String),
    /// The server answered with an `error` event.
    JoinRejected(String),
    /// The room connection closed unexpectedly.
    TransportClosed,
    /// The action is not allowed in the current session state.
    ValidationError(String),
}

impl LobbyError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> &str {
        match self {
            Self::AllocationFailure(_) => "Could not request a room code.",
            Self::JoinRejected(m) | Self::ValidationError(m) => m,
            Self::TransportClosed => "Connection to the lobby was lost.",
        }
    }
}

impl std::fmt::Display for LobbyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllocationFailure(reason) => write!(f, "room code allocation failed: {reason}"),
            Self::JoinRejected(m) => write!(f, "join rejected: {m}"),
            Self::TransportClosed => write!(f, "connection closed"),
            Self::ValidationError(m) => write!(f, "not allowed: {m}"),
        }
    }
}

impl std::error::Error for LobbyError {}
