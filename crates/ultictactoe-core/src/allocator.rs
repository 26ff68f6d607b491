use crate::error::LobbyError;
use crate::net::messages::{ClientMessage, ServerMessage};
use crate::net::protocol::decode_server_message;
use crate::room::RoomCode;

/// Progress of a single room-code request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPhase {
    /// Allocator connection not open yet.
    Connecting,
    /// `request_code` sent, waiting for `code_allocated`.
    Requested,
    /// Code received; the connection should now be closed.
    Allocated,
    Failed,
}

/// What the caller has to do after feeding an input to a [`CodeRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationEvent {
    Send(ClientMessage),
    /// Close the allocator connection, then open the room session.
    Allocated(RoomCode),
    Failed(LobbyError),
    Ignored,
}

/// Client side of the allocator exchange over one ephemeral connection.
///
/// A request fails at most once; after a code arrives or the request fails,
/// further inputs are ignored. Retrying means creating a new `CodeRequest`.
#[derive(Debug)]
pub struct CodeRequest {
    phase: AllocationPhase,
    code: Option<RoomCode>,
}

impl Default for CodeRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeRequest {
    pub fn new() -> Self {
        Self {
            phase: AllocationPhase::Connecting,
            code: None,
        }
    }

    pub fn phase(&self) -> AllocationPhase {
        self.phase
    }

    pub fn code(&self) -> Option<&RoomCode> {
        self.code.as_ref()
    }

    fn is_settled(&self) -> bool {
        matches!(
            self.phase,
            AllocationPhase::Allocated | AllocationPhase::Failed
        )
    }

    pub fn on_open(&mut self) -> AllocationEvent {
        if self.phase != AllocationPhase::Connecting {
            return AllocationEvent::Ignored;
        }
        self.phase = AllocationPhase::Requested;
        AllocationEvent::Send(ClientMessage::RequestCode)
    }

    pub fn on_text(&mut self, text: &str) -> AllocationEvent {
        match decode_server_message(text) {
            Ok(msg) => self.on_message(msg),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable allocator frame");
                AllocationEvent::Ignored
            },
        }
    }

    pub fn on_message(&mut self, msg: ServerMessage) -> AllocationEvent {
        if self.is_settled() {
            return AllocationEvent::Ignored;
        }
        match msg {
            ServerMessage::CodeAllocated(m) => {
                tracing::debug!(code = %m.code, "Room code allocated");
                self.phase = AllocationPhase::Allocated;
                self.code = Some(m.code.clone());
                AllocationEvent::Allocated(m.code)
            },
            ServerMessage::Error(m) => self.fail(m.message),
            other => {
                tracing::debug!(event = other.event(), "Unexpected allocator event");
                AllocationEvent::Ignored
            },
        }
    }

    pub fn on_error(&mut self) -> AllocationEvent {
        if self.is_settled() {
            return AllocationEvent::Ignored;
        }
        self.fail("connection error".to_string())
    }

    pub fn on_close(&mut self) -> AllocationEvent {
        if self.is_settled() {
            return AllocationEvent::Ignored;
        }
        self.fail("connection closed before a code arrived".to_string())
    }

    fn fail(&mut self, reason: String) -> AllocationEvent {
        tracing::debug!(%reason, "Room code request failed");
        self.phase = AllocationPhase::Failed;
        AllocationEvent::Failed(LobbyError::AllocationFailure(reason))
    }
}
