//! Serves the Sententia HTTP API.
//!
//! Without `--root` the store lives in memory and is lost on exit.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use sententia_api::AppState;
use sententia_core::{Config, storage::directory};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "SENTENTIA_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Project directory to serve; omit for an in-memory store
    #[arg(long, env = "SENTENTIA_ROOT")]
    root: Option<PathBuf>,
}

impl Args {
    fn state(&self) -> anyhow::Result<AppState> {
        let Some(root) = &self.root else {
            tracing::info!("serving an in-memory store");
            return Ok(AppState::in_memory(Config::default()));
        };

        let path = directory::config_path(root);
        let config = if path.exists() {
            Config::load(&path).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?
        } else {
            Config::default()
        };

        tracing::info!(root = %root.display(), "serving project");
        AppState::open(root, config)
            .with_context(|| format!("failed to load the project at {}", root.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let app = sententia_api::app(args.state()?);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(addr = %args.bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
