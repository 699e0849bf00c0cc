//! Operator console.
//!
//! The console reads one command per line, runs it against the [`Router`]
//! and writes the result. A separate event printer renders live
//! [`ChatEvent`]s as they are published. Both write through plain
//! `std::io::Write` so tests can capture the output in a `Vec<u8>`.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Bad operator input is reported inline and the loop continues

mod command;
pub mod render;

pub use command::{parse_command, Command, CommandError};

use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::router::{ChatEvent, Router, RouterError};

/// Whether the console keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Executes operator commands against a router.
pub struct Console<W> {
    router: Arc<Router>,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(router: Arc<Router>, out: W) -> Self {
        Self { router, out }
    }

    /// Consumes the console, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Parses and runs one line of input.
    pub async fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        match parse_command(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Ok(Flow::Continue),
            Err(e) => {
                writeln!(self.out, "{e}")?;
                self.out.flush()?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Runs a parsed command.
    pub async fn execute(&mut self, command: Command) -> io::Result<Flow> {
        let mut prompt = false;

        let text = match command {
            Command::Quit => {
                info!("Operator requested shutdown");
                writeln!(self.out, "Shutting down...")?;
                self.out.flush()?;
                return Ok(Flow::Quit);
            }
            Command::Help => render::help(),
            Command::List => render::format_listing(&self.router.list_sessions().await),
            Command::Chat(id) => match self.router.set_target(&id).await {
                Ok(session) => {
                    prompt = true;
                    render::format_chat_started(session.id(), session.display_name())
                }
                Err(e) => not_found_or_error(&e),
            },
            Command::History(id) => match self.router.history(&id).await {
                Ok(messages) => {
                    let name = match self.router.registry().get(&id).await {
                        Some(session) => session.display_name().to_string(),
                        None => id.to_string(),
                    };
                    render::format_history(&id, &name, &messages)
                }
                Err(e) => not_found_or_error(&e),
            },
            Command::End => {
                let previous = self.router.end_target().await;
                render::format_chat_ended(previous.as_ref())
            }
            Command::Reply(content) => {
                let outcome = self.router.send_to_target(&content).await;
                debug!(outcome = ?outcome, "Operator reply");
                prompt = self.router.active_target().await.is_some();
                render::format_outcome(&outcome, &content)
            }
        };

        self.out.write_all(text.as_bytes())?;
        if prompt {
            self.out.write_all(render::REPLY_PROMPT.as_bytes())?;
        }
        self.out.flush()?;
        Ok(Flow::Continue)
    }
}

fn not_found_or_error(err: &RouterError) -> String {
    match err {
        RouterError::SessionNotFound(id) => render::format_not_found(id),
        other => format!("❌ {other}\n"),
    }
}

/// Runs the operator loop until `quit`, end of input, or cancellation.
///
/// `quit` cancels `cancel_token` so the rest of the server shuts down too.
/// End of input only stops the console.
pub async fn run_operator_console<R, W>(
    router: Arc<Router>,
    input: R,
    out: W,
    cancel_token: CancellationToken,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut console = Console::new(router, out);
    let mut lines = input.lines();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Console stopping on shutdown");
                return Ok(());
            }

            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if console.handle_line(&line).await? == Flow::Quit {
                            cancel_token.cancel();
                            return Ok(());
                        }
                    }
                    None => {
                        info!("Operator input closed");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Renders live chat events until cancelled.
pub async fn run_event_printer<W: Write>(
    router: Arc<Router>,
    mut events: broadcast::Receiver<ChatEvent>,
    mut out: W,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Event printer shutting down");
                break;
            }

            result = events.recv() => {
                match result {
                    Ok(event) => {
                        let mut text = render::format_event(&event);
                        if router.active_target().await.is_some() {
                            text.push_str(render::REPLY_PROMPT);
                        }
                        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
                            warn!(error = %e, "Failed to render event");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Event printer lagged, skipped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }
        }
    }
}
