use anyhow::Context;
use arena_server::config::{Args, ServerConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load(&args).context("loading configuration")?;
    tracing::info!(?config, "configuration loaded");

    arena_server::run(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("server failed")
}
