//! Single-writer relay task.
//!
//! One tokio task owns the [`RelayCore`]. Connections talk to it through a
//! [`RelayHandle`], so applying a message and queueing its broadcast happen
//! as one step in one global order.

use crate::error::{RelayError, RelayResult};
use crate::handler::{Delivery, RelayCore, RelayStats};
use std::collections::HashMap;
use std::sync::Arc;
use tandem_protocol::{ClientId, Domain, PresenceMap};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum Command<D: Domain> {
    Connect {
        reply: oneshot::Sender<RelayResult<RelaySession>>,
    },
    Frame {
        from: ClientId,
        text: String,
    },
    Disconnect {
        id: ClientId,
    },
    Snapshot {
        reply: oneshot::Sender<RelaySnapshot<D>>,
    },
}

/// A registered connection.
#[derive(Debug)]
pub struct RelaySession {
    /// The id the relay assigned.
    pub client_id: ClientId,
    /// Frames for this client, starting with `init`.
    ///
    /// Closes when the relay drops the client.
    pub outbound: mpsc::UnboundedReceiver<Arc<str>>,
}

/// A point-in-time copy of the relay's state.
pub struct RelaySnapshot<D: Domain> {
    /// The canonical document.
    pub state: D::State,
    /// Connected clients.
    pub presence: PresenceMap<D::Selection>,
    /// Relay statistics.
    pub stats: RelayStats,
}

/// The relay task.
pub struct Relay<D: Domain> {
    core: RelayCore<D>,
    commands: mpsc::UnboundedReceiver<Command<D>>,
    outbound: HashMap<ClientId, mpsc::UnboundedSender<Arc<str>>>,
}

impl<D: Domain> Relay<D> {
    /// Spawns the relay task.
    ///
    /// The task stops once every handle is dropped.
    pub fn spawn(core: RelayCore<D>) -> (RelayHandle<D>, JoinHandle<()>) {
        let (tx, commands) = mpsc::unbounded_channel();
        let relay = Self {
            core,
            commands,
            outbound: HashMap::new(),
        };
        let task = tokio::spawn(relay.run());
        (RelayHandle { commands: tx }, task)
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Connect { reply } => {
                    let result = self.connect();
                    let _ = reply.send(result);
                }
                Command::Frame { from, text } => match self.core.handle_frame(&from, &text) {
                    Ok(deliveries) => self.deliver(deliveries),
                    Err(e) => warn!(client_id = %from, error = %e, "dropping frame"),
                },
                Command::Disconnect { id } => {
                    self.outbound.remove(&id);
                    match self.core.disconnect(&id) {
                        Ok(deliveries) => self.deliver(deliveries),
                        Err(e) => warn!(client_id = %id, error = %e, "failed to announce close"),
                    }
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(RelaySnapshot {
                        state: self.core.state().clone(),
                        presence: self.core.presence().clone(),
                        stats: self.core.stats().clone(),
                    });
                }
            }
        }
        debug!("relay task stopped");
    }

    fn connect(&mut self) -> RelayResult<RelaySession> {
        let (client_id, deliveries) = self.core.connect()?;
        let (tx, outbound) = mpsc::unbounded_channel();
        self.outbound.insert(client_id.clone(), tx);
        self.deliver(deliveries);
        Ok(RelaySession {
            client_id,
            outbound,
        })
    }

    fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            for recipient in &delivery.recipients {
                let Some(tx) = self.outbound.get(recipient) else {
                    continue;
                };
                // A closed receiver means the connection is going away; its
                // Disconnect command follows.
                let _ = tx.send(Arc::clone(&delivery.frame));
            }
        }
    }
}

/// Cloneable handle to the relay task.
pub struct RelayHandle<D: Domain> {
    commands: mpsc::UnboundedSender<Command<D>>,
}

impl<D: Domain> Clone for RelayHandle<D> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<D: Domain> RelayHandle<D> {
    /// Registers a new connection.
    pub async fn connect(&self) -> RelayResult<RelaySession> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect { reply })?;
        rx.await.map_err(|_| RelayError::Closed)?
    }

    /// Hands a text frame from `from` to the relay.
    pub fn send(&self, from: &ClientId, text: impl Into<String>) -> RelayResult<()> {
        self.command(Command::Frame {
            from: from.clone(),
            text: text.into(),
        })
    }

    /// Drops a connection and announces it to the others.
    ///
    /// The client's outbound channel closes, which ends its session.
    pub fn disconnect(&self, id: &ClientId) -> RelayResult<()> {
        self.command(Command::Disconnect { id: id.clone() })
    }

    /// Copies the relay's current state.
    pub async fn snapshot(&self) -> RelayResult<RelaySnapshot<D>> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Snapshot { reply })?;
        rx.await.map_err(|_| RelayError::Closed)
    }

    fn command(&self, command: Command<D>) -> RelayResult<()> {
        self.commands.send(command).map_err(|_| RelayError::Closed)
    }
}
