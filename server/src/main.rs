use anyhow::Result;
use axum::Router;
use clap::Parser;
use skylore_server::{build_app, ServerConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let config = ServerConfig::parse();
    // blocking collaborator clients must be built outside the async runtime
    let app: Router = build_app(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(serve(app, &config))
}

async fn serve(app: Router, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %config.index.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
