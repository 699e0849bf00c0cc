//! Helpdesk server - WebSocket endpoint plus the operator console
//!
//! Customers connect over WebSocket; the operator drives the console on
//! this process's stdin/stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (127.0.0.1:8899, path /customer)
//! helpdeskd
//!
//! # Listen elsewhere
//! helpdeskd --listen 0.0.0.0:9000 --path /support
//!
//! # Read settings from a file
//! helpdeskd --config ./helpdesk.toml
//! ```

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use helpdeskd::config::ServerConfig;
use helpdeskd::console::{render, run_event_printer, run_operator_console};
use helpdeskd::router::{Router, RouterSettings};
use helpdeskd::server::ChatServer;

/// Helpdesk server - one operator, many customers
#[derive(Parser, Debug)]
#[command(name = "helpdeskd", version, about)]
struct Args {
    /// Config file (defaults to <config dir>/helpdesk/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "HELPDESK_ADDR")]
    listen: Option<SocketAddr>,

    /// WebSocket path customers connect to
    #[arg(short, long)]
    path: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("helpdeskd=info".parse()?)
                .add_directive("helpdesk_core=info".parse()?)
                .add_directive("helpdesk_protocol=info".parse()?),
        )
        .init();

    let config = ServerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(args.listen, args.path)
        .context("Invalid command-line settings")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run_server(config));

    // The stdin reader blocks a runtime thread; don't wait for it
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn run_server(config: ServerConfig) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "Helpdesk server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_shutdown_signal() => {
                if let Err(e) = result {
                    error!(error = %e, "Error waiting for shutdown signal");
                }
                info!("Shutdown signal received");
                shutdown_token.cancel();
            }
            _ = shutdown_token.cancelled() => {}
        }
    });

    let router = Arc::new(Router::new(RouterSettings::from(&config)));
    let server = ChatServer::bind(config, Arc::clone(&router), cancel_token.clone())
        .await
        .context("Failed to start WebSocket server")?;

    print!("{}", render::banner(&server.customer_url()));

    tokio::spawn(run_event_printer(
        Arc::clone(&router),
        router.subscribe(),
        io::stdout(),
        cancel_token.clone(),
    ));

    let console_token = cancel_token.clone();
    let console_router = Arc::clone(&router);
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = run_operator_console(console_router, stdin, io::stdout(), console_token).await {
            error!(error = %e, "Operator console failed");
        }
    });

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Helpdesk server stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
