pub mod allocator;
pub mod error;
pub mod net;
pub mod player;
pub mod room;
pub mod session;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::net::messages::{JoinedMsg, PlayerListMsg, ServerMessage};
    use crate::player::{ClientId, Member};
    use crate::room::RoomCode;
    use crate::session::RoomSession;

    /// `n` members with ids `u1..=un`; the first one is host.
    pub fn make_members(n: usize) -> Vec<Member> {
        (0..n)
            .map(|i| Member {
                id: ClientId::new(format!("u{}", i + 1)),
                name: format!("Player{}", i + 1),
                is_host: i == 0,
            })
            .collect()
    }

    /// A `player_list` event carrying `make_members(n)`.
    pub fn player_list(n: usize) -> ServerMessage {
        ServerMessage::PlayerList(PlayerListMsg {
            players: make_members(n),
            count: Some(n),
        })
    }

    /// A session for `code` that has opened and been admitted as `your_id`.
    pub fn joined_session(code: &str, your_id: &str, you_are_host: bool) -> RoomSession {
        let room = RoomCode::parse(code).unwrap_or_else(|e| panic!("bad test code {code}: {e}"));
        let mut session = RoomSession::new(room.clone(), "Tester");
        session.on_open();
        session.handle(ServerMessage::Joined(JoinedMsg {
            room,
            your_id: ClientId::new(your_id),
            you_are_host,
        }));
        session
    }
}
