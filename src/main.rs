// src/main.rs
// =============================================================================
// CLI entry point: parse config, build an `Engine`, start crawling and
// serving, and shut both down cleanly on Ctrl-C - mirroring the original's
// signal handler that calls `server.Stop()`/`downloader.Stop()`.
// =============================================================================

use clap::Parser;
use webmirror::config::{Cli, Config};
use webmirror::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let port = cli.port;
    let seed = cli.seed.clone();
    let config = Config::try_from(cli)?;

    let engine = Engine::from_config(config);
    let crawler_handle = engine.start(&seed, port).await?;

    tracing::info!(%seed, port, "mirror running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    let stopped_hosts = engine.stop(crawler_handle).await;
    tracing::info!(?stopped_hosts, "stopped listening");

    Ok(())
}
