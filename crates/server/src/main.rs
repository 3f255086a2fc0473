//! harbor-worker entry point.
//!
//! Boots the offline worker against the real network and an on-disk store,
//! and exposes its entry points as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use harbor_client::{FetchClient, FetchConfig, Scope};
use harbor_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use worker::delegation::NoContexts;
use worker::{Platform, Worker};

mod error;
mod handler;
mod tools;
mod worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;

    let fetch_config = FetchConfig { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() };
    let network = FetchClient::new(fetch_config, Scope::from_config(&config)?)?;

    let platform = Platform {
        network: Arc::new(network),
        store: Arc::new(db.clone()),
        kv: Arc::new(db),
        contexts: Arc::new(NoContexts),
    };
    let worker = Worker::new(config, platform)?;

    tracing::info!(
        generation = worker.generation(),
        origin = %worker.config().origin,
        "Starting harbor-worker on stdio transport"
    );

    let handler = handler::HarborServer::new(Arc::new(worker));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
