//! WebSocket connector.

use crate::error::{EngineError, EngineResult};
use crate::transport::{Connection, Connector};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

/// Connects to a relay over WebSocket.
///
/// Each connection spawns a writer task and a reader task that bridge the
/// socket to the [`Connection`] channels. The inbound channel closes when the
/// socket closes or errors.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Creates a connector for `url` (e.g. `ws://127.0.0.1:8080`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WsConnector {
    async fn connect(&self) -> EngineResult<Connection> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| classify(&self.url, e))?;
        debug!(url = %self.url, "websocket connected");

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::text(frame)).await {
                    debug!(error = %e, "websocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Binary(_)) => warn!("ignoring binary frame"),
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(Connection::new(outbound, inbound))
    }
}

fn classify(url: &str, error: tungstenite::Error) -> EngineError {
    match error {
        tungstenite::Error::Url(e) => EngineError::transport_fatal(format!("bad url {url}: {e}")),
        tungstenite::Error::HttpFormat(e) => {
            EngineError::transport_fatal(format!("bad url {url}: {e}"))
        }
        other => EngineError::transport_retryable(format!("connect to {url} failed: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_scheme_is_fatal() {
        let err = WsConnector::new("http://127.0.0.1/").connect().await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_retryable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WsConnector::new(format!("ws://{addr}"))
            .connect()
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
