//! Interactive writer client: one stdin line in, one relay reply out.

#![deny(unsafe_code)]

mod client;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use murmur_core::logging;

use crate::client::{RelayClient, TcpDialer};

/// Writer client for the murmur relay.
#[derive(Debug, Parser)]
#[command(name = "murmur-client", version, about)]
struct Cli {
    /// Session listener address of the relay.
    #[arg(long, default_value = "127.0.0.1:18001")]
    addr: String,

    /// Log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_subscriber(&cli.log_level);

    let dialer = TcpDialer::new(cli.addr.clone());
    let mut client = RelayClient::connect(dialer)
        .await
        .with_context(|| format!("connecting to relay at {}", cli.addr))?;
    info!(addr = %cli.addr, "connected");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match client.send_with_retry(trimmed).await {
            Ok(reconnects) => {
                if reconnects > 0 {
                    info!(reconnects, "delivered after reconnecting");
                }
            }
            Err(error) => {
                warn!(%error, "dropping line");
                continue;
            }
        }

        match client.recv_reply().await {
            Ok(Some(reply)) => println!("{reply}"),
            Ok(None) => {
                warn!("relay closed the connection");
                break;
            }
            Err(error) => {
                warn!(%error, "reply read failed");
                break;
            }
        }
    }

    info!("stdin closed, exiting");
    Ok(())
}
