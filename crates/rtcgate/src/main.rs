use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rtcgate::config::Config;
use rtcgate::info::build_server_info;
use rtcgate::plugin::{self, EventSink, PluginRegistry};
use rtcgate::server::{AppState, PollSettings, build_app};
use rtcgate::session::{SessionRegistry, spawn_janitor};

/// WebRTC gateway signaling server.
#[derive(Debug, Parser)]
#[command(name = "rtcgate", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "rtcgate.yaml")]
    config: PathBuf,

    /// Address to bind (overrides `server.host`).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides `server.port`).
    #[arg(short, long)]
    port: Option<u16>,

    /// Public address reported to clients (overrides `network.public_ip`).
    #[arg(long)]
    public_ip: Option<String>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = Config::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ip) = cli.public_ip {
        config.network.public_ip = Some(ip);
    }

    let shutdown = CancellationToken::new();
    let sessions = SessionRegistry::new();
    let plugins = PluginRegistry::load_all(
        plugin::builtin(),
        &config.plugins.disable,
        EventSink::new(sessions.clone()),
    )
    .await
    .context("loading plugins")?;

    let janitor = spawn_janitor(
        sessions.clone(),
        config.session.reaper_interval(),
        config.session.idle_timeout(),
        shutdown.clone(),
    );

    let state = AppState {
        sessions: sessions.clone(),
        plugins: plugins.clone(),
        poll: PollSettings {
            timeout: config.session.poll_timeout(),
            max_events: config.session.max_events_per_poll,
        },
        info: Arc::new(build_server_info(&config, &plugins)),
        shutdown: shutdown.clone(),
    };
    let app = build_app(
        state,
        &config.server.base_path,
        config.server.request_timeout_seconds,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        %addr,
        base_path = %config.server.base_path,
        plugins = plugins.len(),
        "Gateway listening"
    );

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
            // Wakes every blocked long poll so connections can drain.
            signal_token.cancel();
        })
        .await
        .context("serving HTTP")?;

    shutdown.cancel();
    if tokio::time::timeout(Duration::from_secs(5), janitor).await.is_err() {
        warn!("Janitor did not stop in time");
    }
    plugins.close_all().await;
    info!(remaining_sessions = sessions.len(), "Gateway stopped");
    Ok(())
}
