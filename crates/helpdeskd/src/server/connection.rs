//! Connection handler for individual customer connections.
//!
//! Each accepted TCP stream gets its own `ConnectionHandler` that:
//! - Performs the WebSocket upgrade, rejecting unknown paths with 404
//! - Registers a session with the router
//! - Feeds decoded inbound frames to the router
//! - Deregisters the session when the connection ends
//!
//! Writes never happen on the handler task. The session holds a
//! [`WsConnection`], which queues frames for a dedicated writer task that
//! owns the socket's sink.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Malformed frames are logged and dropped; the connection stays open
//! - Connection errors are logged and result in graceful disconnect

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use helpdesk_core::{Connection, SessionId, TransportError};
use helpdesk_protocol::{decode_inbound, InboundFrame, ProtocolError};

use crate::router::{Router, RouterError};

/// Time allowed for the WebSocket upgrade
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the writer to flush a final close frame
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

// ============================================================================
// Write Side
// ============================================================================

/// Instructions for a connection's writer task.
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// Write handle for one WebSocket customer.
///
/// The writer task ends once it is told to close or the handle is dropped.
pub struct WsConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
    peer: SocketAddr,
}

impl WsConnection {
    fn new(outbound: mpsc::UnboundedSender<Outbound>, peer: SocketAddr) -> Self {
        Self { outbound, peer }
    }
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection")
            .field("peer", &self.peer)
            .field("closed", &self.outbound.is_closed())
            .finish()
    }
}

impl Connection for WsConnection {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        // Already-closed writers are fine
        let _ = self.outbound.send(Outbound::Close);
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

/// Drains queued frames into the socket until closed.
async fn run_writer(mut sink: WsSink, mut outbound: mpsc::UnboundedReceiver<Outbound>, peer: SocketAddr) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                    debug!(peer = %peer, error = %e, "Write failed, stopping writer");
                    break;
                }
            }
            Outbound::Close => {
                if let Err(e) = sink.send(WsMessage::Close(None)).await {
                    debug!(peer = %peer, error = %e, "Failed to send close frame");
                }
                break;
            }
        }
    }

    // Later sends observe a closed channel
    outbound.close();
    let _ = sink.close().await;
    debug!(peer = %peer, "Writer finished");
}

// ============================================================================
// Connection Handler
// ============================================================================

/// Handler for a single customer connection.
pub struct ConnectionHandler {
    /// Raw stream, upgraded in `run`
    stream: TcpStream,

    /// Remote address
    peer: SocketAddr,

    router: Arc<Router>,

    /// Path customers must request
    path: String,

    /// Largest inbound frame accepted
    max_message_size: usize,

    cancel_token: CancellationToken,

    /// Sequence number for log correlation
    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        router: Arc<Router>,
        path: impl Into<String>,
        max_message_size: usize,
        cancel_token: CancellationToken,
        connection_number: u64,
    ) -> Self {
        Self {
            stream,
            peer,
            router,
            path: path.into(),
            max_message_size,
            cancel_token,
            connection_number,
        }
    }

    /// Runs the connection to completion.
    ///
    /// Returns once the customer disconnects, the transport fails, or the
    /// server shuts down. The session is deregistered before returning.
    pub async fn run(self) -> Result<(), ConnectionError> {
        let Self {
            stream,
            peer,
            router,
            path,
            max_message_size,
            cancel_token,
            connection_number,
        } = self;

        debug!(connection = connection_number, peer = %peer, "TCP connection accepted");

        let ws = match timeout(HANDSHAKE_TIMEOUT, accept_on_path(stream, path)).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                debug!(connection = connection_number, peer = %peer, error = %e, "Handshake rejected");
                return Err(e);
            }
            Err(_) => {
                debug!(connection = connection_number, peer = %peer, "Handshake timed out");
                return Err(ConnectionError::HandshakeTimeout);
            }
        };

        let (sink, mut stream) = ws.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(sink, rx, peer));

        let session = match router
            .on_client_connected(Arc::new(WsConnection::new(tx, peer)))
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Failed to register customer");
                writer.abort();
                return Err(e.into());
            }
        };
        let session_id = session.id().clone();

        let result = loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!(session_id = %session_id, "Server shutting down, closing connection");
                    break Ok(());
                }

                frame = stream.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => {
                            debug!(session_id = %session_id, error = %e, "Read failed");
                            break Err(ConnectionError::Io(e.to_string()));
                        }
                        None => {
                            debug!(session_id = %session_id, "Customer sent EOF");
                            break Ok(());
                        }
                    };

                    let inbound = match &frame {
                        WsMessage::Text(text) => InboundFrame::Text(text.as_str()),
                        WsMessage::Binary(bytes) => InboundFrame::Binary(bytes.as_ref()),
                        WsMessage::Close(_) => {
                            debug!(session_id = %session_id, "Customer sent close frame");
                            break Ok(());
                        }
                        // Control frames are answered by tungstenite
                        _ => continue,
                    };

                    match handle_frame(&router, &session_id, inbound, max_message_size).await {
                        Ok(()) => {}
                        Err(ConnectionError::Router(RouterError::SessionNotFound(_))) => {
                            debug!(session_id = %session_id, "Session already removed");
                            break Ok(());
                        }
                        Err(e) => {
                            warn!(session_id = %session_id, error = %e, "Dropped inbound frame");
                        }
                    }
                }
            }
        };

        router.on_client_disconnected(&session_id).await;
        session.close();
        drop(session);

        if timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
            debug!(session_id = %session_id, "Writer did not finish in time");
        }

        info!(session_id = %session_id, peer = %peer, "Connection closed");
        result
    }
}

/// Upgrades the stream, answering 404 for any path but `path`.
async fn accept_on_path(
    stream: TcpStream,
    path: String,
) -> Result<WebSocketStream<TcpStream>, ConnectionError> {
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    tokio_tungstenite::accept_hdr_async(stream, check_path)
        .await
        .map_err(|e| ConnectionError::Handshake(e.to_string()))
}

/// Decodes one data frame and hands it to the router.
async fn handle_frame(
    router: &Router,
    session_id: &SessionId,
    frame: InboundFrame<'_>,
    max_message_size: usize,
) -> Result<(), ConnectionError> {
    let content = decode_inbound(frame, max_message_size)?;
    router.on_client_message(session_id, content).await?;
    Ok(())
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("WebSocket handshake timed out")]
    HandshakeTimeout,

    #[error("Malformed frame: {0}")]
    Malformed(#[from] ProtocolError),

    #[error("Routing error: {0}")]
    Router(#[from] RouterError),

    #[error("I/O error: {0}")]
    Io(String),
}
