//! WebSocket server for helpdesk customers.
//!
//! The server:
//! - Listens on a TCP socket for customer connections
//! - Spawns a ConnectionHandler for each customer
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│     Router      │
//! │  (per customer) │     │                 │
//! └───────┬─────────┘     └─────────────────┘
//!         │ mpsc
//!         ▼
//! ┌─────────────────┐
//! │  writer task    │
//! │ (socket sink)   │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, WsConnection};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::router::Router;

/// How long shutdown waits for connection handlers to finish
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// WebSocket server accepting customer connections.
pub struct ChatServer {
    listener: TcpListener,

    /// Address actually bound (differs from config when port 0 was asked)
    local_addr: SocketAddr,

    config: ServerConfig,

    router: Arc<Router>,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for log correlation
    connection_counter: AtomicU64,

    handlers: TaskTracker,
}

impl ChatServer {
    /// Binds the listener described by `config`.
    ///
    /// Binding happens here rather than in [`run`](Self::run) so callers
    /// can learn the bound address before serving.
    pub async fn bind(
        config: ServerConfig,
        router: Arc<Router>,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.listen_addr,
                error: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: config.listen_addr,
            error: e.to_string(),
        })?;

        Ok(Self {
            listener,
            local_addr,
            config,
            router,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            handlers: TaskTracker::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The URL customers connect to.
    pub fn customer_url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.config.path)
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// closes every customer connection and waits briefly for handlers.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr,
            path = %self.config.path,
            "Helpdesk server listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Spawns a handler task for a new connection.
    fn handle_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr, connection_number: u64) {
        let handler = ConnectionHandler::new(
            stream,
            peer,
            Arc::clone(&self.router),
            self.config.path.clone(),
            self.config.max_message_size,
            self.cancel_token.clone(),
            connection_number,
        );

        self.handlers.spawn(async move {
            if let Err(e) = handler.run().await {
                debug!(peer = %peer, error = %e, "Connection ended with error");
            }
        });
    }

    async fn shutdown(&self) {
        let closed = self.router.close_all().await;
        self.handlers.close();

        if tokio::time::timeout(SHUTDOWN_GRACE, self.handlers.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.handlers.len(),
                "Connection handlers still running after grace period"
            );
        }

        info!(closed, "Server shutdown complete");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 8899)),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("127.0.0.1:8899"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ServerConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..ServerConfig::default()
        };
        let server = ChatServer::bind(config, Arc::new(Router::with_defaults()), CancellationToken::new())
            .await
            .unwrap();

        assert_ne!(server.local_addr().port(), 0);
        assert!(server.customer_url().ends_with("/customer"));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            listen_addr: holder.local_addr().unwrap(),
            ..ServerConfig::default()
        };

        let result = ChatServer::bind(config, Arc::new(Router::with_defaults()), CancellationToken::new()).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
