use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use ultictactoe_core::net::messages::{
    ClientMessage, CreateOrJoinMsg, JoinedMsg, PlayerListMsg, ServerMessage,
};
use ultictactoe_core::net::protocol::{
    ALLOCATOR_PATH, ROOM_PATH_PREFIX, decode_server_message, encode_client_message,
};
use ultictactoe_core::room::RoomCode;

use ultictactoe_server::build_app;
use ultictactoe_server::config::ServerConfig;
use ultictactoe_server::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn allocator_url(&self) -> String {
        format!("ws://{}{ALLOCATOR_PATH}", self.addr)
    }

    /// Room endpoint for `code` exactly as typed, so tests exercise the
    /// server-side normalization.
    pub fn room_url(&self, code: &str) -> String {
        format!("ws://{}{ROOM_PATH_PREFIX}{code}/", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage as a text frame.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Read the next text frame (5s timeout).
pub async fn ws_read_text(stream: &mut WsStream) -> String {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read a text frame, returning None on timeout.
pub async fn ws_try_read_text(stream: &mut WsStream, timeout_ms: u64) -> Option<String> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let text = ws_read_text(stream).await;
    decode_server_message(&text).unwrap()
}

/// Ask the allocator for a code over a fresh connection, then close it.
pub async fn allocate_code(server: &TestServer) -> RoomCode {
    let mut stream = ws_connect(&server.allocator_url()).await;
    ws_send_client_msg(&mut stream, &ClientMessage::RequestCode).await;
    let code = match ws_read_server_msg(&mut stream).await {
        ServerMessage::CodeAllocated(m) => m.code,
        other => panic!("Expected CodeAllocated, got: {other:?}"),
    };
    stream.close(None).await.unwrap();
    code
}

/// Send `create_or_join` and return the raw reply.
pub async fn ws_create_or_join(stream: &mut WsStream, nickname: &str) -> ServerMessage {
    let msg = ClientMessage::CreateOrJoin(CreateOrJoinMsg {
        nickname: nickname.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
    ws_read_server_msg(stream).await
}

/// Connect to a room, join it, and consume the `joined` reply.
pub async fn join_room(server: &TestServer, code: &str, nickname: &str) -> (WsStream, JoinedMsg) {
    let mut stream = ws_connect(&server.room_url(code)).await;
    match ws_create_or_join(&mut stream, nickname).await {
        ServerMessage::Joined(joined) => (stream, joined),
        other => panic!("Expected Joined, got: {other:?}"),
    }
}

/// Read the next message and require it to be a `player_list`.
pub async fn expect_player_list(stream: &mut WsStream) -> PlayerListMsg {
    match ws_read_server_msg(stream).await {
        ServerMessage::PlayerList(pl) => pl,
        other => panic!("Expected PlayerList, got: {other:?}"),
    }
}

/// Read the next message and require it to be an `error`.
pub async fn expect_error(stream: &mut WsStream) -> String {
    match ws_read_server_msg(stream).await {
        ServerMessage::Error(e) => e.message,
        other => panic!("Expected Error, got: {other:?}"),
    }
}
