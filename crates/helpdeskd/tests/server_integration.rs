//! Integration tests for the WebSocket server.
//!
//! These run a real ChatServer on an ephemeral port and talk to it with a
//! tokio-tungstenite client, covering the upgrade, inbound decoding,
//! operator replies, disconnects and graceful shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free behavior of
//! production code is checked through assertions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use helpdesk_core::{Message, MessageKind, SessionId};
use helpdesk_protocol::decode_message;
use helpdeskd::config::ServerConfig;
use helpdeskd::router::{Router, RouterSettings, SendOutcome};
use helpdeskd::server::ChatServer;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on waiting for the server to reach an expected state
const STATE_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval between state checks
const STATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on waiting for a frame
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Test Helpers
// ============================================================================

type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    router: Arc<Router>,
    cancel_token: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default()).await
    }

    async fn spawn_with(config: ServerConfig) -> Self {
        let config = ServerConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..config
        };
        let router = Arc::new(Router::new(RouterSettings::from(&config)));
        let cancel_token = CancellationToken::new();

        let server = ChatServer::bind(config, Arc::clone(&router), cancel_token.clone())
            .await
            .expect("bind ephemeral port");
        let addr = server.local_addr();

        let task = tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            router,
            cancel_token,
            task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Connects a customer and consumes the welcome message.
    async fn connect(&self) -> (TestSocket, Message) {
        let (mut ws, _) = connect_async(self.url("/customer"))
            .await
            .expect("connect to server");
        let welcome = recv_message(&mut ws).await;
        (ws, welcome)
    }

    async fn wait_for_sessions(&self, count: usize) {
        let result = timeout(STATE_WAIT_TIMEOUT, async {
            while self.router.registry().len().await != count {
                sleep(STATE_POLL_INTERVAL).await;
            }
        })
        .await;
        assert!(result.is_ok(), "expected {count} sessions within {STATE_WAIT_TIMEOUT:?}");
    }

    async fn wait_for_history(&self, id: &SessionId, len: usize) -> Vec<Message> {
        timeout(STATE_WAIT_TIMEOUT, async {
            loop {
                let history = self.router.history(id).await.unwrap_or_default();
                if history.len() >= len {
                    return history;
                }
                sleep(STATE_POLL_INTERVAL).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("history of {id} did not reach {len} messages"))
    }

    async fn shutdown(self) {
        self.cancel_token.cancel();
        let _ = timeout(Duration::from_secs(5), self.task).await;
    }
}

/// Receives the next data frame as a wire message.
async fn recv_message(ws: &mut TestSocket) -> Message {
    loop {
        let frame = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .expect("frame ok");
        if let WsMessage::Text(text) = frame {
            return decode_message(text.as_str()).expect("server frames are wire messages");
        }
    }
}

fn customer_id(welcome: &Message) -> SessionId {
    // "Welcome! Your customer number is C1. ..."
    welcome
        .content()
        .split_whitespace()
        .map(|w| w.trim_end_matches('.'))
        .find(|w| {
            w.strip_prefix('C')
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .map(SessionId::new)
        .expect("welcome names the customer id")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_connect_receives_welcome() {
    let server = TestServer::spawn().await;

    let (_ws, welcome) = server.connect().await;

    assert_eq!(welcome.kind(), MessageKind::System);
    assert_eq!(welcome.sender(), "System");
    assert_eq!(customer_id(&welcome), SessionId::new("C1"));
    server.wait_for_sessions(1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_wrong_path_is_not_found() {
    let server = TestServer::spawn().await;

    let err = connect_async(server.url("/admin"))
        .await
        .expect_err("wrong path must be refused");

    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 404),
        other => panic!("expected HTTP error, got {other:?}"),
    }
    assert!(server.router.registry().is_empty().await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_text_and_structured_frames_are_logged() {
    let server = TestServer::spawn().await;
    let (mut ws, welcome) = server.connect().await;
    let id = customer_id(&welcome);

    ws.send(WsMessage::Text("hello".into())).await.unwrap();
    ws.send(WsMessage::Text(r#"{"content":"from a script"}"#.into()))
        .await
        .unwrap();
    ws.send(WsMessage::Binary(b"as bytes".to_vec().into()))
        .await
        .unwrap();

    let history = server.wait_for_history(&id, 3).await;
    let contents: Vec<&str> = history.iter().map(|m| m.content()).collect();
    assert_eq!(contents, vec!["hello", "from a script", "as bytes"]);
    assert!(history.iter().all(|m| m.kind() == MessageKind::Client));

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_are_dropped_connection_stays_open() {
    let config = ServerConfig {
        max_message_size: 32,
        ..ServerConfig::default()
    };
    let server = TestServer::spawn_with(config).await;
    let (mut ws, welcome) = server.connect().await;
    let id = customer_id(&welcome);

    ws.send(WsMessage::Text("x".repeat(100).into())).await.unwrap();
    ws.send(WsMessage::Binary(vec![0xff, 0xfe, 0xfd].into()))
        .await
        .unwrap();
    ws.send(WsMessage::Text("   ".into())).await.unwrap();
    ws.send(WsMessage::Text("still here".into())).await.unwrap();

    let history = server.wait_for_history(&id, 1).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content(), "still here");
    assert!(server.router.registry().contains(&id).await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_operator_reply_reaches_customer() {
    let server = TestServer::spawn().await;
    let (mut ws, welcome) = server.connect().await;
    let id = customer_id(&welcome);

    server.router.set_target(&id).await.unwrap();
    let outcome = server.router.send_to_target("How can I help?").await;
    assert!(matches!(outcome, SendOutcome::Delivered { .. }));

    let reply = recv_message(&mut ws).await;
    assert_eq!(reply.kind(), MessageKind::Operator);
    assert_eq!(reply.sender(), "Service");
    assert_eq!(reply.content(), "How can I help?");

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_removes_session() {
    let server = TestServer::spawn().await;
    let (mut ws, welcome) = server.connect().await;
    let id = customer_id(&welcome);
    server.router.set_target(&id).await.unwrap();

    ws.close(None).await.unwrap();

    server.wait_for_sessions(0).await;
    assert_eq!(
        server.router.send_to_target("bye?").await,
        SendOutcome::TargetGone { session_id: id }
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_ids_are_unique_across_connections() {
    let server = TestServer::spawn().await;

    let (_a, welcome_a) = server.connect().await;
    let (b, welcome_b) = server.connect().await;
    drop(b);
    let (_c, welcome_c) = server.connect().await;

    let ids = [
        customer_id(&welcome_a),
        customer_id(&welcome_b),
        customer_id(&welcome_c),
    ];
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    assert_ne!(ids[0], ids[2]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_customers() {
    let server = TestServer::spawn().await;
    let (mut ws, _) = server.connect().await;
    server.wait_for_sessions(1).await;

    let router = Arc::clone(&server.router);
    server.shutdown().await;

    let ended = timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "customer connection should be closed on shutdown");
    assert!(router.registry().is_empty().await);
}
