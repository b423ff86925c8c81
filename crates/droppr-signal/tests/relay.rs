//! End-to-end tests against a running signal server

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use droppr_core::{ChannelId, Config, Role};
use droppr_signal::SignalServer;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (SignalServer, SocketAddr) {
    start_with(Config::default()).await
}

async fn start_with(config: Config) -> (SignalServer, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = SignalServer::new(config);

    let background = server.clone();
    tokio::spawn(async move { background.serve_listener(listener).await });
    (server, addr)
}

async fn try_connect(addr: SocketAddr, cookie: Option<&str>) -> Result<Client, WsError> {
    let mut request = format!("ws://{}/sc", addr).into_client_request().unwrap();
    if let Some(cookie) = cookie {
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
    }
    connect_async(request).await.map(|(ws, _)| ws)
}

async fn connect(server: &SignalServer, addr: SocketAddr, id: &str, role: Role) -> Client {
    let cookie = format!("drop_id={}; drop_role={}", id, role);
    let ws = assert_ok!(try_connect(addr, Some(&cookie)).await);
    wait_claimed(server, id, role).await;
    ws
}

async fn wait_claimed(server: &SignalServer, id: &str, role: Role) {
    let id = ChannelId::from(id);
    for _ in 0..200 {
        if let Some(channel) = server.registry().get(&id) {
            if channel.is_claimed(role).await {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{} never claimed channel {}", role, id);
}

async fn next_message(ws: &mut Client) -> Option<Message> {
    tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a message")
        .and_then(Result::ok)
}

async fn next_text(ws: &mut Client) -> String {
    match next_message(ws).await {
        Some(Message::Text(text)) => text,
        other => panic!("expected a text message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_signaling_between_peers() {
    let (server, addr) = start().await;
    let mut sender = connect(&server, addr, "drop-a", Role::Sender).await;
    let mut receiver = connect(&server, addr, "drop-a", Role::Receiver).await;

    sender.send(Message::Text("\"ping\"".into())).await.unwrap();
    assert_eq!(next_text(&mut receiver).await, "\"ping\"");

    receiver.send(Message::Text("\"pong\"".into())).await.unwrap();
    assert_eq!(next_text(&mut sender).await, "\"pong\"");

    let offer = r#"{"type":"offer","sdp":"v=0\r\no=- 0 0 IN IP4 127.0.0.1"}"#;
    sender.send(Message::Text(offer.into())).await.unwrap();
    assert_eq!(next_text(&mut receiver).await, offer);

    let chunk = vec![7u8; 64 * 1024];
    sender.send(Message::Binary(chunk.clone())).await.unwrap();
    assert_eq!(next_message(&mut receiver).await, Some(Message::Binary(chunk)));

    assert_eq!(server.channel_count(), 1);
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn test_failed_when_peer_absent() {
    let (server, addr) = start().await;
    let mut sender = connect(&server, addr, "drop-b", Role::Sender).await;

    sender.send(Message::Text("\"ping\"".into())).await.unwrap();
    assert_eq!(
        next_text(&mut sender).await,
        r#"{"status":"failed","data":"ping"}"#
    );

    sender.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    assert_eq!(next_text(&mut sender).await, r#"{"status":"failed"}"#);
}

#[tokio::test]
async fn test_second_connection_for_role_is_busy() {
    let (server, addr) = start().await;
    let mut first = connect(&server, addr, "drop-c", Role::Sender).await;

    let cookie = "drop_id=drop-c; drop_role=dropper";
    let mut second = assert_ok!(try_connect(addr, Some(cookie)).await);
    assert_eq!(next_text(&mut second).await, r#"{"status":"busy"}"#);
    assert!(matches!(
        next_message(&mut second).await,
        None | Some(Message::Close(_))
    ));

    // The original sender is unaffected
    let mut receiver = connect(&server, addr, "drop-c", Role::Receiver).await;
    first.send(Message::Text("\"still here\"".into())).await.unwrap();
    assert_eq!(next_text(&mut receiver).await, "\"still here\"");
}

#[tokio::test]
async fn test_peer_disconnect_and_channel_teardown() {
    let (server, addr) = start().await;
    let mut sender = connect(&server, addr, "drop-d", Role::Sender).await;
    let mut receiver = connect(&server, addr, "drop-d", Role::Receiver).await;

    sender.close(None).await.unwrap();
    for _ in 0..200 {
        if server.connection_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(server.connection_count(), 1);

    receiver.send(Message::Text("\"anyone?\"".into())).await.unwrap();
    assert_eq!(
        next_text(&mut receiver).await,
        r#"{"status":"failed","data":"anyone?"}"#
    );

    receiver.close(None).await.unwrap();
    for _ in 0..200 {
        if server.channel_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(server.channel_count(), 0);

    // Reconnecting recreates the channel from scratch
    let _sender = connect(&server, addr, "drop-d", Role::Sender).await;
    assert_eq!(server.channel_count(), 1);
}

#[tokio::test]
async fn test_unauthorized_upgrade_rejected() {
    let (server, addr) = start().await;

    match try_connect(addr, None).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::UNAUTHORIZED),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("upgrade without a session was accepted"),
    }

    let bad_role = "drop_id=drop-e; drop_role=admin";
    assert!(try_connect(addr, Some(bad_role)).await.is_err());
    assert_eq!(server.channel_count(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (server, addr) = start().await;
    let _sender = connect(&server, addr, "drop-f", Role::Sender).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["channels"], 1);
    assert_eq!(json["connections"], 1);
}

#[tokio::test]
async fn test_health_request_split_across_writes() {
    let (_server, addr) = start().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /hea").await.unwrap();
    stream.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream
        .write_all(b"lth HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains(r#""status":"healthy""#));
}

#[tokio::test]
async fn test_silent_client_is_dropped() {
    let mut config = Config::default();
    config.server.handshake_timeout_ms = 100;
    let (server, addr) = start_with(config).await;

    // Connects and never sends a request
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server kept a silent connection open")
        .unwrap_or(0);
    assert_eq!(n, 0);
    assert_eq!(server.connection_count(), 0);
}
