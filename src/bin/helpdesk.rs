//! Helpdesk customer client
//!
//! Connects to a helpdesk server and chats with the operator from the
//! terminal. Type `quit` or press Ctrl-C to leave.
//!
//! # Usage
//!
//! ```bash
//! helpdesk
//! helpdesk --url ws://support.example.com:8899/customer
//! ```

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use helpdesk_client::{ClientConfig, ClientExit, CustomerClient, DEFAULT_SERVER_URL};

/// Helpdesk customer client
#[derive(Parser, Debug)]
#[command(name = "helpdesk", version, about)]
struct Args {
    /// Server URL
    #[arg(short, long, env = "HELPDESK_URL", default_value = DEFAULT_SERVER_URL)]
    url: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("helpdesk_client=warn".parse()?),
        )
        .init();

    let config = ClientConfig {
        url: args.url,
        ..ClientConfig::default()
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run_client(config));

    // The stdin reader blocks a runtime thread; don't wait for it
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn run_client(config: ClientConfig) -> Result<()> {
    let client = CustomerClient::connect(config)
        .await
        .context("Is the helpdesk server running?")?;

    println!("🔗 Connected to the helpdesk");
    println!("Type your question and an operator will reply shortly ('quit' to leave)");

    let cancel_token = CancellationToken::new();
    let interrupt_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => interrupt_token.cancel(),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let exit = client.run(stdin, io::stdout(), cancel_token).await?;

    match exit {
        ClientExit::ServerClosed => println!("Connection closed by the helpdesk"),
        ClientExit::Quit | ClientExit::InputClosed | ClientExit::Interrupted => println!("Goodbye!"),
    }
    info!(exit = ?exit, "Client finished");
    Ok(())
}
