//! WebSocket connection to the helpdesk server.
//!
//! A [`CustomerClient`] runs both halves of the chat on one task: frames
//! from the server are rendered as they arrive and typed lines are sent as
//! text frames. The loop ends when the customer types `quit`, input ends,
//! the server closes the connection, or the cancellation token fires
//! (Ctrl-C in the binary).
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::io::Write;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use helpdesk_protocol::decode_message;

use crate::error::{ClientError, Result};
use crate::render;

/// Default server endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8899/customer";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the customer client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the server's customer endpoint.
    pub url: String,

    /// How long to wait for the server's close reply after we close.
    pub close_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            close_grace: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// Customer Client
// ============================================================================

/// Why the chat loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// The customer typed `quit`
    Quit,
    /// Input reached end of file
    InputClosed,
    /// The cancellation token fired
    Interrupted,
    /// The server closed the connection
    ServerClosed,
}

/// A connected customer.
pub struct CustomerClient {
    ws: WsStream,
    config: ClientConfig,
}

impl CustomerClient {
    /// Connects to the server.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connect` if the server is unreachable or refuses the
    ///   upgrade
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let (ws, _response) = connect_async(config.url.as_str())
            .await
            .map_err(|e| ClientError::Connect {
                url: config.url.clone(),
                error: e.to_string(),
            })?;

        info!(url = %config.url, "Connected to helpdesk");
        Ok(Self { ws, config })
    }

    /// Runs the chat until it ends, reading lines from `input` and
    /// rendering to `out`.
    pub async fn run<R, W>(self, input: R, mut out: W, cancel_token: CancellationToken) -> Result<ClientExit>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let Self { ws, config } = self;
        let (mut sink, mut stream) = ws.split();
        let mut lines = input.lines();

        render::print_prompt(&mut out)?;

        let exit = loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    writeln!(out)?;
                    info!("Interrupted, leaving chat");
                    break ClientExit::Interrupted;
                }

                frame = stream.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => show_frame(&mut out, text.as_str())?,
                        Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                            Ok(text) => show_frame(&mut out, text)?,
                            Err(_) => warn!(bytes = bytes.len(), "Skipping non-text frame"),
                        },
                        Some(Ok(WsMessage::Close(_))) | None => {
                            writeln!(out)?;
                            info!("Server closed the connection");
                            return Ok(ClientExit::ServerClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(ClientError::Transport(e.to_string())),
                    }
                }

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break ClientExit::InputClosed;
                    };

                    let text = line.trim();
                    if text == "quit" {
                        break ClientExit::Quit;
                    }
                    if !text.is_empty() {
                        sink.send(WsMessage::Text(text.to_string().into()))
                            .await
                            .map_err(|e| ClientError::Transport(e.to_string()))?;
                    }
                    render::print_prompt(&mut out)?;
                }
            }
        };

        // Normal closure, then give the server a moment to answer
        let close = WsMessage::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        if let Err(e) = sink.send(close).await {
            debug!(error = %e, "Failed to send close frame");
            return Ok(exit);
        }

        let drained = timeout(config.close_grace, async {
            while let Some(Ok(frame)) = stream.next().await {
                if frame.is_close() {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            debug!("Server did not acknowledge close in time");
        }

        Ok(exit)
    }
}

/// Decodes and renders one server frame; undecodable frames are skipped.
fn show_frame<W: Write>(out: &mut W, text: &str) -> Result<()> {
    match decode_message(text) {
        Ok(message) => {
            if let Some(line) = render::format_incoming(&message) {
                render::print_over_prompt(out, &line)?;
            }
        }
        Err(e) => warn!(error = %e, "Skipping undecodable message"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::Message;
    use helpdesk_protocol::encode_message;
    use tokio::net::TcpListener;

    /// One-shot server: sends `greeting`, then returns every text frame it
    /// receives until the client closes.
    async fn spawn_echo_server(greeting: Message) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/customer", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(WsMessage::Text(encode_message(&greeting).unwrap().into()))
                .await
                .unwrap();

            let mut received = Vec::new();
            while let Some(Ok(frame)) = ws.next().await {
                match frame {
                    WsMessage::Text(text) => received.push(text.as_str().to_string()),
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            received
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/customer", listener.local_addr().unwrap());
        drop(listener);

        let result = CustomerClient::connect(ClientConfig {
            url,
            ..ClientConfig::default()
        })
        .await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_sends_lines_and_quits() {
        let (url, server) = spawn_echo_server(Message::system("System", "Welcome!")).await;
        let client = CustomerClient::connect(ClientConfig {
            url,
            ..ClientConfig::default()
        })
        .await
        .unwrap();

        // Input is consumed only after the greeting has had time to arrive
        let (mut writer, reader) = tokio::io::duplex(256);
        let feeder = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            tokio::time::sleep(Duration::from_millis(100)).await;
            writer.write_all(b"hello\n\n  my order  \nquit\n").await.unwrap();
            writer
        });

        let mut out = Vec::new();
        let exit = client
            .run(tokio::io::BufReader::new(reader), &mut out, CancellationToken::new())
            .await
            .unwrap();
        let _writer = feeder.await.unwrap();

        assert_eq!(exit, ClientExit::Quit);
        assert_eq!(server.await.unwrap(), vec!["hello", "my order"]);
        assert!(String::from_utf8(out).unwrap().contains("Welcome!"));
    }

    #[tokio::test]
    async fn test_cancel_closes_connection() {
        let (url, server) = spawn_echo_server(Message::system("System", "Welcome!")).await;
        let client = CustomerClient::connect(ClientConfig {
            url,
            ..ClientConfig::default()
        })
        .await
        .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        // Input that never ends
        let (_writer, reader) = tokio::io::duplex(64);
        let exit = client
            .run(tokio::io::BufReader::new(reader), Vec::new(), cancel)
            .await
            .unwrap();

        assert_eq!(exit, ClientExit::Interrupted);
        assert!(server.await.unwrap().is_empty());
    }
}
