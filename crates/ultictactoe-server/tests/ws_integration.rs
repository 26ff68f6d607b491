#[allow(dead_code)]
mod common;

use ultictactoe_core::net::messages::{ClientMessage, GameMoveMsg, MoveMsg, ServerMessage};
use ultictactoe_core::room::RoomCode;
use ultictactoe_server::allocator::CODES_EXHAUSTED;
use ultictactoe_server::config::ServerConfig;

use common::{
    TestServer, allocate_code, expect_error, expect_player_list, join_room, ws_connect,
    ws_create_or_join, ws_read_server_msg, ws_send_client_msg, ws_try_read_text,
};

#[tokio::test]
async fn allocator_hands_out_four_digit_codes() {
    let server = TestServer::new().await;
    let code = allocate_code(&server).await;
    assert_eq!(code.as_str().len(), 4);
    assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn allocator_codes_are_distinct_on_one_connection() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.allocator_url()).await;

    let mut codes = Vec::new();
    for _ in 0..5 {
        ws_send_client_msg(&mut stream, &ClientMessage::RequestCode).await;
        match ws_read_server_msg(&mut stream).await {
            ServerMessage::CodeAllocated(m) => codes.push(m.code),
            other => panic!("Expected CodeAllocated, got: {other:?}"),
        }
    }
    let mut deduped = codes.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), codes.len());
}

#[tokio::test]
async fn allocator_ignores_room_actions() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.allocator_url()).await;
    ws_send_client_msg(&mut stream, &ClientMessage::StartGame).await;
    assert!(ws_try_read_text(&mut stream, 200).await.is_none());
}

#[tokio::test]
async fn allocator_reports_exhausted_code_space() {
    let server = TestServer::new().await;
    {
        let mut registry = server.state.registry.write().await;
        for n in 0..10_000u32 {
            let (tx, _rx) = tokio::sync::mpsc::channel(1);
            let code = RoomCode::parse(&format!("{n:04}")).unwrap();
            registry.join(&code, "Filler", tx).unwrap();
        }
    }

    let mut stream = ws_connect(&server.allocator_url()).await;
    ws_send_client_msg(&mut stream, &ClientMessage::RequestCode).await;
    match ws_read_server_msg(&mut stream).await {
        ServerMessage::Error(e) => assert_eq!(e.message, CODES_EXHAUSTED),
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn first_joiner_becomes_host() {
    let server = TestServer::new().await;
    let code = allocate_code(&server).await;

    let (mut alice, joined) = join_room(&server, code.as_str(), "Alice").await;
    assert_eq!(joined.room, code);
    assert!(joined.you_are_host);

    let list = expect_player_list(&mut alice).await;
    assert_eq!(list.count, Some(1));
    assert_eq!(list.players.len(), 1);
    assert_eq!(list.players[0].name, "Alice");
    assert_eq!(list.players[0].id, joined.your_id);
    assert!(list.players[0].is_host);
}

#[tokio::test]
async fn second_joiner_is_guest_and_both_see_list() {
    let server = TestServer::new().await;
    let (mut alice, alice_joined) = join_room(&server, "4242", "Alice").await;
    let _ = expect_player_list(&mut alice).await;

    let (mut bob, bob_joined) = join_room(&server, "4242", "Bob").await;
    assert!(!bob_joined.you_are_host);
    assert_ne!(bob_joined.your_id, alice_joined.your_id);

    for stream in [&mut alice, &mut bob] {
        let list = expect_player_list(stream).await;
        assert_eq!(list.count, Some(2));
        assert_eq!(list.players[0].name, "Alice");
        assert!(list.players[0].is_host);
        assert_eq!(list.players[1].name, "Bob");
        assert!(!list.players[1].is_host);
    }
}

#[tokio::test]
async fn room_paths_are_case_insensitive() {
    let server = TestServer::new().await;
    let (mut alice, joined) = join_room(&server, "ab12", "Alice").await;
    assert_eq!(joined.room.as_str(), "AB12");
    let _ = expect_player_list(&mut alice).await;

    let (_bob, bob_joined) = join_room(&server, "AB12", "Bob").await;
    assert!(!bob_joined.you_are_host);
    assert_eq!(expect_player_list(&mut alice).await.count, Some(2));
}

#[tokio::test]
async fn third_joiner_is_rejected_without_broadcast() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0100", "Alice").await;
    let _ = expect_player_list(&mut alice).await;
    let (mut bob, _) = join_room(&server, "0100", "Bob").await;
    let _ = expect_player_list(&mut alice).await;
    let _ = expect_player_list(&mut bob).await;

    let mut carol = ws_connect(&server.room_url("0100")).await;
    match ws_create_or_join(&mut carol, "Carol").await {
        ServerMessage::Error(e) => assert_eq!(e.message, "Lobby is full (max. 2 players)."),
        other => panic!("Expected Error, got: {other:?}"),
    }

    assert!(ws_try_read_text(&mut alice, 200).await.is_none());
    assert!(ws_try_read_text(&mut bob, 200).await.is_none());
}

#[tokio::test]
async fn configured_member_cap_is_enforced() {
    let mut config = ServerConfig::default();
    config.rooms.max_members = 3;
    let server = TestServer::from_config(config).await;

    let (_a, _) = join_room(&server, "0300", "A").await;
    let (_b, _) = join_room(&server, "0300", "B").await;
    let (_c, c_joined) = join_room(&server, "0300", "C").await;
    assert!(!c_joined.you_are_host);

    let mut d = ws_connect(&server.room_url("0300")).await;
    match ws_create_or_join(&mut d, "D").await {
        ServerMessage::Error(e) => assert_eq!(e.message, "Lobby is full (max. 3 players)."),
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn blank_nickname_becomes_player() {
    let server = TestServer::new().await;
    let (mut stream, _) = join_room(&server, "0200", "   ").await;
    let list = expect_player_list(&mut stream).await;
    assert_eq!(list.players[0].name, "Player");
}

#[tokio::test]
async fn overlong_nickname_is_rejected() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.room_url("0201")).await;
    match ws_create_or_join(&mut stream, &"n".repeat(40)).await {
        ServerMessage::Error(e) => assert!(e.message.starts_with("Invalid nickname")),
        other => panic!("Expected Error, got: {other:?}"),
    }
}

#[tokio::test]
async fn repeated_create_or_join_is_ignored() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0202", "Alice").await;
    let _ = expect_player_list(&mut alice).await;

    ws_create_or_join_no_reply(&mut alice).await;
    assert!(ws_try_read_text(&mut alice, 200).await.is_none());
}

async fn ws_create_or_join_no_reply(stream: &mut common::WsStream) {
    let msg = ClientMessage::CreateOrJoin(ultictactoe_core::net::messages::CreateOrJoinMsg {
        nickname: "Again".to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
}

#[tokio::test]
async fn start_needs_two_members() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0400", "Alice").await;
    let _ = expect_player_list(&mut alice).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartGame).await;
    assert_eq!(
        expect_error(&mut alice).await,
        "At least 2 players are required."
    );
}

#[tokio::test]
async fn only_host_may_start() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0401", "Alice").await;
    let _ = expect_player_list(&mut alice).await;
    let (mut bob, _) = join_room(&server, "0401", "Bob").await;
    let _ = expect_player_list(&mut alice).await;
    let _ = expect_player_list(&mut bob).await;

    ws_send_client_msg(&mut bob, &ClientMessage::StartGame).await;
    assert_eq!(
        expect_error(&mut bob).await,
        "Only the host can start the game."
    );
    assert!(ws_try_read_text(&mut alice, 200).await.is_none());
}

#[tokio::test]
async fn start_before_join_is_rejected() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.room_url("0402")).await;
    ws_send_client_msg(&mut stream, &ClientMessage::StartGame).await;
    assert_eq!(
        expect_error(&mut stream).await,
        "Only the host can start the game."
    );
}

#[tokio::test]
async fn host_start_broadcasts_game_url() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0403", "Alice").await;
    let _ = expect_player_list(&mut alice).await;
    let (mut bob, _) = join_room(&server, "0403", "Bob").await;
    let _ = expect_player_list(&mut alice).await;
    let _ = expect_player_list(&mut bob).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartGame).await;
    for stream in [&mut alice, &mut bob] {
        match ws_read_server_msg(stream).await {
            ServerMessage::Start(s) => assert_eq!(s.url, "/play/lobby/0403/"),
            other => panic!("Expected Start, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn host_departure_promotes_remaining_member() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0500", "Alice").await;
    let _ = expect_player_list(&mut alice).await;
    let (mut bob, bob_joined) = join_room(&server, "0500", "Bob").await;
    let _ = expect_player_list(&mut alice).await;
    let _ = expect_player_list(&mut bob).await;

    alice.close(None).await.unwrap();

    let list = expect_player_list(&mut bob).await;
    assert_eq!(list.count, Some(1));
    assert_eq!(list.players[0].id, bob_joined.your_id);
    assert!(list.players[0].is_host);

    // The promoted host can start once someone else arrives.
    let (mut carol, _) = join_room(&server, "0500", "Carol").await;
    let _ = expect_player_list(&mut bob).await;
    let _ = expect_player_list(&mut carol).await;
    ws_send_client_msg(&mut bob, &ClientMessage::StartGame).await;
    assert!(matches!(
        ws_read_server_msg(&mut carol).await,
        ServerMessage::Start(_)
    ));
}

#[tokio::test]
async fn departures_after_start_are_not_broadcast() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0501", "Alice").await;
    let _ = expect_player_list(&mut alice).await;
    let (mut bob, _) = join_room(&server, "0501", "Bob").await;
    let _ = expect_player_list(&mut alice).await;
    let _ = expect_player_list(&mut bob).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartGame).await;
    let _ = ws_read_server_msg(&mut alice).await;
    let _ = ws_read_server_msg(&mut bob).await;

    alice.close(None).await.unwrap();
    assert!(ws_try_read_text(&mut bob, 300).await.is_none());
}

#[tokio::test]
async fn joining_a_started_room_is_rejected() {
    let mut config = ServerConfig::default();
    config.rooms.max_members = 3;
    let server = TestServer::from_config(config).await;
    let (mut alice, _) = join_room(&server, "0502", "Alice").await;
    let _ = expect_player_list(&mut alice).await;
    let (mut bob, _) = join_room(&server, "0502", "Bob").await;
    let _ = expect_player_list(&mut alice).await;
    let _ = expect_player_list(&mut bob).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartGame).await;
    let _ = ws_read_server_msg(&mut alice).await;
    let _ = ws_read_server_msg(&mut bob).await;

    let mut carol = ws_connect(&server.room_url("0502")).await;
    match ws_create_or_join(&mut carol, "Carol").await {
        ServerMessage::Error(e) => assert_eq!(e.message, "The game has already started."),
        other => panic!("Expected Error, got: {other:?}"),
    }
    assert!(ws_try_read_text(&mut alice, 300).await.is_none());
}

#[tokio::test]
async fn moves_are_relayed_to_the_room() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0600", "Alice").await;
    let _ = expect_player_list(&mut alice).await;
    let (mut bob, _) = join_room(&server, "0600", "Bob").await;
    let _ = expect_player_list(&mut alice).await;
    let _ = expect_player_list(&mut bob).await;

    // Out of range: dropped.
    ws_send_client_msg(
        &mut alice,
        &ClientMessage::GameMove(GameMoveMsg { big: 9, small: 0 }),
    )
    .await;
    ws_send_client_msg(
        &mut alice,
        &ClientMessage::GameMove(GameMoveMsg { big: 4, small: 7 }),
    )
    .await;

    for stream in [&mut alice, &mut bob] {
        assert_eq!(
            ws_read_server_msg(stream).await,
            ServerMessage::Move(MoveMsg { big: 4, small: 7 })
        );
    }
}

#[tokio::test]
async fn moves_before_join_are_dropped() {
    let server = TestServer::new().await;
    let (mut alice, _) = join_room(&server, "0601", "Alice").await;
    let _ = expect_player_list(&mut alice).await;

    let mut stranger = ws_connect(&server.room_url("0601")).await;
    ws_send_client_msg(
        &mut stranger,
        &ClientMessage::GameMove(GameMoveMsg { big: 0, small: 0 }),
    )
    .await;
    assert!(ws_try_read_text(&mut alice, 200).await.is_none());
}

#[tokio::test]
async fn garbage_frames_do_not_close_the_connection() {
    use futures::SinkExt;
    use tokio_tungstenite::tungstenite::Message;

    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.room_url("0700")).await;
    stream
        .send(Message::Text("not json".into()))
        .await
        .unwrap();
    stream
        .send(Message::Text(r#"{"action":"dance"}"#.into()))
        .await
        .unwrap();

    match ws_create_or_join(&mut stream, "Alice").await {
        ServerMessage::Joined(j) => assert!(j.you_are_host),
        other => panic!("Expected Joined, got: {other:?}"),
    }
}
