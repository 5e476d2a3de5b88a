//! Serve command implementation.

use std::net::SocketAddr;
use tandem_relay::{RelayServer, ServerConfig};
use tandem_todo::{TodoDomain, TodoState};
use tracing::info;

/// Runs the relay until interrupted.
pub async fn run(
    bind: SocketAddr,
    max_connections: usize,
    strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::new(bind)
        .with_max_connections(max_connections)
        .with_strict_client_ids(strict);
    let server = RelayServer::new(config, TodoDomain, TodoState::demo(), Some(None));

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
