use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

mod app;
mod dispatch;
mod error;
mod eviction;
mod http;
mod notify;
mod session;
mod summary;
mod ws;

#[derive(Debug, Parser)]
#[command(name = "routing-gateway", about = "Multi-channel customer-contact routing engine")]
struct Cli {
    /// Path to router.toml. Falls back to $ROUTER_CONFIG, then ~/.routing-engine/router.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "routing_gateway=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("ROUTER_CONFIG").ok());
    let config = routing_core::RoutingConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({e}), using defaults");
        routing_core::RoutingConfig::default()
    });

    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(app::AppState::new(config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(eviction::run(state.clone(), shutdown_rx));

    let router = app::build_router(state.clone());
    let addr: SocketAddr = bind_addr.parse()?;
    info!(%addr, "routing gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("http listener stopped, draining in-flight messages");
    let _ = shutdown_tx.send(true);
    state.shutdown.cancel();
    state.tasks.close();
    state.tasks.wait().await;
    Ok(())
}

/// Resolves once an operator sends SIGINT (or the platform equivalent),
/// letting `axum::serve` stop accepting new connections before the caller
/// drains `AppState::tasks`.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
