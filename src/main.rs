use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;

mod aggregator;
mod config;
mod server;

/// Shiftscope - deployment, route, and log monitoring across cluster environments
#[derive(Parser, Debug)]
#[command(name = "shiftscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "shiftscope.toml")]
    config: PathBuf,

    /// Override the configured listen address, e.g. 127.0.0.1:5000
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = config::Settings::load(&args.config)?;
    if let Some(listen) = args.listen {
        settings.listen = listen;
    }

    let listen = settings.listen;
    tracing::info!(
        environments = settings.environments().len(),
        addr = %listen,
        "starting"
    );

    let state = server::AppState {
        settings: Arc::new(settings),
    };
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}
