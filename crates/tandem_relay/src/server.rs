//! WebSocket relay server.

use crate::actor::{Relay, RelayHandle, RelaySession};
use crate::config::ServerConfig;
use crate::error::{RelayError, RelayResult};
use crate::handler::RelayCore;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tandem_protocol::Domain;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// The relay server.
///
/// Owns the relay task and accepts WebSocket connections for it. Must be
/// created from within a tokio runtime. Clones share the same relay task.
///
/// # Example
///
/// ```no_run
/// use tandem_relay::{RelayServer, ServerConfig};
/// use tandem_todo::{TodoDomain, TodoState};
///
/// # async fn run() -> tandem_relay::RelayResult<()> {
/// let server = RelayServer::new(ServerConfig::default(), TodoDomain, TodoState::demo(), None);
/// server.run().await
/// # }
/// ```
pub struct RelayServer<D: Domain> {
    config: ServerConfig,
    handle: RelayHandle<D>,
}

impl<D: Domain> Clone for RelayServer<D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<D: Domain> RelayServer<D> {
    /// Creates a server holding `initial_state` and spawns its relay task.
    pub fn new(
        config: ServerConfig,
        domain: D,
        initial_state: D::State,
        initial_selection: Option<D::Selection>,
    ) -> Self {
        let core = RelayCore::new(domain, initial_state, initial_selection, &config);
        let (handle, _task) = Relay::spawn(core);
        Self { config, handle }
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A handle to the relay task.
    pub fn handle(&self) -> RelayHandle<D> {
        self.handle.clone()
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> RelayResult<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Accepts connections until the listener fails.
    pub async fn serve(&self, listener: TcpListener) -> RelayResult<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let handle = self.handle.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(handle, stream, peer).await {
                    warn!(%peer, error = %e, "connection ended with error");
                }
            });
        }
    }

    /// Binds the configured address and serves it.
    pub async fn run(&self) -> RelayResult<()> {
        let listener = self.bind().await?;
        info!(addr = %listener.local_addr()?, "relay listening");
        self.serve(listener).await
    }
}

async fn serve_connection<D: Domain>(
    handle: RelayHandle<D>,
    stream: TcpStream,
    peer: SocketAddr,
) -> RelayResult<()> {
    let mut socket = accept_async(stream)
        .await
        .map_err(|e| RelayError::WebSocket(e.to_string()))?;

    let RelaySession {
        client_id,
        mut outbound,
    } = match handle.connect().await {
        Ok(session) => session,
        Err(e) => {
            let _ = socket.close(None).await;
            return Err(e);
        }
    };
    debug!(%peer, %client_id, "websocket session started");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::text(frame.to_string())).await {
                        debug!(%client_id, error = %e, "write failed");
                        break;
                    }
                }
                None => break,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if handle.send(&client_id, text.to_string()).is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!(%client_id, "ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%client_id, error = %e, "read failed");
                    break;
                }
            },
        }
    }

    let _ = handle.disconnect(&client_id);
    let _ = sink.close().await;
    debug!(%peer, %client_id, "websocket session ended");
    Ok(())
}
