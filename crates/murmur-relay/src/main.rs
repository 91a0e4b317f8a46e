//! Relay daemon: session listener, moderation pipeline, and push-stream
//! gateway wired over a single broadcaster.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use murmur_broadcast::Broadcaster;
use murmur_core::logging;
use murmur_moderation::{HttpClassifier, Lexicon, ModerationPipeline, Notifier};
use murmur_server::config::ServerConfig;
use murmur_server::gateway::{self, GatewayState};
use murmur_server::session::{self, SessionDeps};
use murmur_server::transport::TcpSessionListener;

/// Moderated real-time text relay.
#[derive(Debug, Parser)]
#[command(name = "murmur-relay", version, about)]
struct Cli {
    /// Path to a JSON config file. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address for the HTTP gateway.
    #[arg(long)]
    http_bind: Option<String>,

    /// Bind address for the line-oriented session listener.
    #[arg(long)]
    session_bind: Option<String>,

    /// Base URL of the classifier service.
    #[arg(long)]
    classifier_url: Option<String>,

    /// Operator webhook for moderation notices.
    #[arg(long)]
    webhook_url: Option<String>,

    /// Log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => ServerConfig::default(),
    };
    if let Some(http_bind) = &cli.http_bind {
        config.http_bind = http_bind.clone();
    }
    if let Some(session_bind) = &cli.session_bind {
        config.session_bind = session_bind.clone();
    }
    if let Some(classifier_url) = &cli.classifier_url {
        config.classifier_url = classifier_url.clone();
    }
    if let Some(webhook_url) = &cli.webhook_url {
        config.webhook_url = Some(webhook_url.clone());
    }
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_subscriber(&cli.log_level);
    let config = load_config(&cli)?;

    let broadcaster = Broadcaster::<String>::new();
    broadcaster.start();

    // One HTTP client shared by the classifier and the webhook sink.
    let client = reqwest::Client::new();
    let classifier = HttpClassifier::with_client(config.classifier_url.clone(), client.clone());
    let lexicon = if config.lexicon_words.is_empty() {
        Lexicon::default()
    } else {
        Lexicon::with_words(config.lexicon_words.clone())
    };
    let pipeline = Arc::new(
        ModerationPipeline::new(lexicon, Arc::new(classifier))
            .with_thumbnails(config.thumbnails.clone()),
    );
    let notifier = Notifier::new(config.webhook_url.clone(), config.icon_url.clone(), client);

    let session_listener = TcpSessionListener::bind(&config.session_bind)
        .await
        .with_context(|| format!("binding session listener on {}", config.session_bind))?;
    info!(addr = %config.session_bind, "session listener up");

    let deps = SessionDeps {
        broadcaster: broadcaster.clone(),
        pipeline,
        notifier,
        idle_timeout: config.idle_timeout(),
        max_line_bytes: config.max_line_bytes,
    };
    let _ = tokio::spawn(session::serve(session_listener, deps));

    let http_listener = TcpListener::bind(&config.http_bind)
        .await
        .with_context(|| format!("binding gateway on {}", config.http_bind))?;
    info!(addr = %config.http_bind, "gateway up");

    let app = gateway::router(GatewayState {
        broadcaster: broadcaster.clone(),
    });
    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server failed")?;

    broadcaster.close().await;
    info!("relay stopped");
    Ok(())
}
