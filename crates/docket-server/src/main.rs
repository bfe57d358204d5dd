use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use docket_server::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let state = docket_server::build_state(&config)?;

    let addr = config.addr();
    let listener = TcpListener::bind(addr).await?;
    info!(
        policy = ?config.render_policy(),
        dpi = config.render_dpi,
        "docket-server listening on http://{addr}"
    );

    docket_server::serve(listener, state).await
}
