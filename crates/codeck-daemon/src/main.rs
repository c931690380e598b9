//! `codeck-daemon` — thin binary entry point wiring every crate into one
//! running workstation daemon.
//!
//! By default this runs the gateway and serves it until `Ctrl+C`/`SIGTERM`.
//! `codeck-daemon config show`/`validate` inspect configuration without
//! starting anything.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cli;
mod config_cmd;
mod wiring;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::net::TcpListener;

use codeck_auth::oauth::OAuthProviderConfig;
use codeck_telemetry::{LogConfig, LogFormat};

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => run().await,
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show { format } => config_cmd::show(&format),
            ConfigCommands::Validate => config_cmd::validate(),
        },
    }
}

/// Upstream OAuth provider endpoints, supplied entirely through the
/// environment. Empty values are accepted at construction; they only
/// surface as a login failure if the operator starts the PKCE flow
/// before setting them, matching the "operator password is the primary
/// auth path" design.
fn oauth_config_from_env() -> OAuthProviderConfig {
    OAuthProviderConfig {
        authorize_url: std::env::var("CODECK_OAUTH_AUTHORIZE_URL").unwrap_or_default(),
        token_url: std::env::var("CODECK_OAUTH_TOKEN_URL").unwrap_or_default(),
        client_id: std::env::var("CODECK_OAUTH_CLIENT_ID").unwrap_or_default(),
        redirect_uri: std::env::var("CODECK_OAUTH_REDIRECT_URI").unwrap_or_default(),
        scope: std::env::var("CODECK_OAUTH_SCOPE").unwrap_or_default(),
    }
}

fn log_format_from_str(format: &str) -> LogFormat {
    match format {
        "json" => LogFormat::Json,
        "compact" => LogFormat::Compact,
        _ => LogFormat::Pretty,
    }
}

async fn run() -> Result<()> {
    let resolved_config = codeck_config::load(None, None).context("loading configuration")?;

    let log_config = LogConfig::new(resolved_config.values.logging.level.clone())
        .with_format(log_format_from_str(&resolved_config.values.logging.format));
    if let Err(e) = codeck_telemetry::setup_logging(&log_config) {
        eprintln!("failed to initialise logging: {e}");
    }

    let agent_binary =
        std::env::var("CODECK_AGENT_BINARY").unwrap_or_else(|_| "claude".to_string());
    let oauth_config = oauth_config_from_env();

    let daemon = wiring::build(None, agent_binary, oauth_config, resolved_config)
        .await
        .context("wiring daemon components")?;

    let router = codeck_gateway::build_router(daemon.state.clone());

    let host = std::env::var("CODECK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("CODECK_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(7420);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parsing bind address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    println!(
        "{}",
        format!("codeck-daemon listening on {addr}").cyan().bold()
    );
    tracing::info!(%addr, "codeck-daemon listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving gateway")?;

    println!("\n{}", "shutting down daemon...".yellow());

    // Stop accepting new scheduled/refreshed/re-indexed work first...
    daemon.tasks.abort_all();
    // ...then terminate live PTY children without touching the snapshot,
    // so a restart resumes them via `restore_from_snapshot`.
    daemon.state.pty.shutdown().await;

    println!("{}", "daemon stopped".green().bold());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
