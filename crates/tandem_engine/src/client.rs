//! Async client driver.
//!
//! [`SyncClient`] wraps a [`SyncEngine`] in a lock and runs a background task
//! that owns the connection:
//!
//! - connects through a [`Connector`], retrying after a fixed delay
//! - feeds inbound frames to the engine
//! - flushes the queue on a ticker (throttled to `flush_interval`)
//! - sends presence heartbeats while idle, if configured
//!
//! UI-facing calls only take the engine lock briefly and never wait on the
//! network.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::state::{SyncEngine, SyncStats};
use crate::transport::{Connection, Connector};
use crate::ws::WsConnector;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tandem_protocol::{ClientId, Domain, DomainMessage, PresenceMap, WireMessage};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

struct Shared<D: Domain> {
    engine: Mutex<SyncEngine<D>>,
    revision: watch::Sender<u64>,
    closed: AtomicBool,
}

impl<D: Domain> Shared<D> {
    /// Runs `f` under the engine lock and publishes the new revision.
    fn update<R>(&self, f: impl FnOnce(&mut SyncEngine<D>) -> R) -> R {
        let (result, revision) = {
            let mut engine = self.engine.lock();
            let result = f(&mut engine);
            (result, engine.revision())
        };
        self.revision.send_if_modified(|current| {
            if *current == revision {
                return false;
            }
            *current = revision;
            true
        });
        result
    }

    fn receive(&self, text: &str) {
        self.update(|engine| {
            if let Err(e) = engine.receive_text(text) {
                warn!(error = %e, "dropping inbound frame");
            }
        });
    }

    /// Flushes if there is something to send, or if a heartbeat is due.
    fn take_outbound(&self, heartbeat_due: bool) -> Option<String> {
        let message = {
            let mut engine = self.engine.lock();
            let wanted = engine.needs_flush() || (heartbeat_due && engine.self_id().is_some());
            if !wanted {
                return None;
            }
            engine.flush()?
        };

        debug!(entries = message.entries.len(), "flushing");
        let frame: DomainMessage<D> = WireMessage::Action(message);
        match frame.encode() {
            Ok(text) => Some(text),
            Err(e) => {
                error!(error = %e, "failed to encode outbound message");
                None
            }
        }
    }

    fn disconnected(&self) {
        self.update(|engine| engine.disconnected());
    }
}

enum SessionEnd {
    Shutdown,
    Lost,
}

/// A connected sync client.
///
/// Must be started from within a tokio runtime. Dropping the client stops
/// the background task.
pub struct SyncClient<D: Domain> {
    shared: Arc<Shared<D>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<D: Domain> SyncClient<D> {
    /// Starts a client that connects through `connector`.
    ///
    /// `document` and `selection` are shown until the relay's `init` arrives.
    pub fn start<C: Connector>(
        domain: D,
        document: D::State,
        selection: D::Selection,
        config: EngineConfig,
        connector: C,
    ) -> Self {
        let engine = SyncEngine::new(
            Arc::new(domain),
            document,
            selection,
            config.pending_policy,
        );
        let (revision, _) = watch::channel(engine.revision());
        let shared = Arc::new(Shared {
            engine: Mutex::new(engine),
            revision,
            closed: AtomicBool::new(false),
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drive(Arc::clone(&shared), config, connector, shutdown_rx));

        Self {
            shared,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Starts a client that connects to `config.server_url` over WebSocket.
    pub fn connect_ws(
        domain: D,
        document: D::State,
        selection: D::Selection,
        config: EngineConfig,
    ) -> Self {
        let connector = WsConnector::new(config.server_url.clone());
        Self::start(domain, document, selection, config, connector)
    }

    fn update<R>(
        &self,
        f: impl FnOnce(&mut SyncEngine<D>) -> EngineResult<R>,
    ) -> EngineResult<R> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        self.shared.update(f)
    }

    /// Applies a local edit and queues it for the relay.
    pub fn dispatch(&self, action: D::Action) -> EngineResult<()> {
        self.update(|engine| engine.dispatch(action))
    }

    /// Applies a selection action.
    pub fn select(&self, action: D::SelectionAction) -> EngineResult<()> {
        self.update(|engine| engine.select(action))
    }

    /// Undoes the last local edit. Returns `Ok(false)` if nothing happened.
    pub fn undo(&self) -> EngineResult<bool> {
        self.update(|engine| engine.undo())
    }

    /// Redoes the last undone edit. Returns `Ok(false)` if nothing happened.
    pub fn redo(&self) -> EngineResult<bool> {
        self.update(|engine| engine.redo())
    }

    /// Returns true while a session is established.
    pub fn connected(&self) -> bool {
        self.shared.engine.lock().is_connected()
    }

    /// Our id for the current session.
    pub fn self_id(&self) -> Option<ClientId> {
        self.shared.engine.lock().self_id().cloned()
    }

    /// A copy of the document as the UI should render it.
    pub fn document(&self) -> D::State {
        self.shared.engine.lock().document().clone()
    }

    /// A copy of the local selection.
    pub fn selection(&self) -> D::Selection {
        self.shared.engine.lock().selection().clone()
    }

    /// A copy of the presence map.
    pub fn presence(&self) -> PresenceMap<D::Selection> {
        self.shared.engine.lock().presence().clients().clone()
    }

    /// Returns true if there is something to undo.
    pub fn can_undo(&self) -> bool {
        self.shared.engine.lock().can_undo()
    }

    /// Returns true if there is something to redo.
    pub fn can_redo(&self) -> bool {
        self.shared.engine.lock().can_redo()
    }

    /// Returns true if another client's selection soft-locks `wanted`.
    pub fn is_locked(&self, wanted: &D::Selection) -> bool {
        self.shared.engine.lock().is_locked(wanted)
    }

    /// Returns the client soft-locking `wanted`, if any.
    pub fn lock_holder(&self, wanted: &D::Selection) -> Option<ClientId> {
        self.shared.engine.lock().lock_holder(wanted).cloned()
    }

    /// Engine statistics.
    pub fn stats(&self) -> SyncStats {
        self.shared.engine.lock().stats().clone()
    }

    /// Runs `f` with read access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&SyncEngine<D>) -> R) -> R {
        f(&self.shared.engine.lock())
    }

    /// Subscribes to change notifications.
    ///
    /// The value is the engine revision; it changes whenever the document,
    /// selection, presence or history changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Stops the background task and waits for it to finish.
    ///
    /// Further edits fail with [`EngineError::Closed`].
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(true);

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "client task failed");
            }
        }
    }
}

impl<D: Domain> Drop for SyncClient<D> {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn drive<D: Domain, C: Connector>(
    shared: Arc<Shared<D>>,
    config: EngineConfig,
    connector: C,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let attempt = tokio::select! {
            _ = shutdown.changed() => break,
            result = connector.connect() => result,
        };

        match attempt {
            Ok(connection) => {
                info!("connected to relay");
                match run_session(&shared, &config, connection, &mut shutdown).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Lost => shared.disconnected(),
                }
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "connect failed");
            }
            Err(e) => {
                error!(error = %e, "giving up on relay");
                break;
            }
        }

        debug!(delay = ?config.reconnect_delay, "reconnecting");
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(config.reconnect_delay) => {}
        }
    }

    shared.disconnected();
    debug!("client task stopped");
}

async fn run_session<D: Domain>(
    shared: &Shared<D>,
    config: &EngineConfig,
    mut connection: Connection,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let mut ticker = interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_sent = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.changed() => return SessionEnd::Shutdown,
            frame = connection.inbound.recv() => match frame {
                Some(text) => shared.receive(&text),
                None => return SessionEnd::Lost,
            },
            _ = ticker.tick() => {
                let heartbeat_due = config
                    .heartbeat_interval
                    .is_some_and(|every| last_sent.elapsed() >= every);
                if let Some(frame) = shared.take_outbound(heartbeat_due) {
                    if connection.outbound.send(frame).is_err() {
                        return SessionEnd::Lost;
                    }
                    last_sent = Instant::now();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockConnector;
    use std::time::Duration;
    use tandem_protocol::{ClientRecord, InitMessage};
    use tandem_todo::{SelectionAction, TodoAction, TodoDomain, TodoState};

    type Msg = DomainMessage<TodoDomain>;

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_flush_interval(Duration::from_millis(5))
            .with_reconnect_delay(Duration::from_millis(10))
            .with_heartbeat_interval(None)
    }

    fn init_frame(self_id: &str) -> String {
        let id = ClientId::new(self_id);
        let mut presence = PresenceMap::new();
        presence.insert(id.clone(), ClientRecord::new(id.clone()));
        let msg: Msg = WireMessage::Init(InitMessage::new(id, TodoState::demo(), presence));
        msg.encode().unwrap()
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn flushes_dispatched_actions() {
        let connector = MockConnector::new();
        let mut remote = connector.push_connection();
        let client = SyncClient::start(TodoDomain, TodoState::new(), None, config(), connector);

        assert!(matches!(
            client.dispatch(TodoAction::remove("a")),
            Err(EngineError::NotInitialized)
        ));
        sleep(Duration::from_millis(20)).await;
        assert!(remote.try_recv().is_none());

        remote.send(init_frame("c1"));
        wait_for(|| client.connected()).await;
        assert_eq!(client.document(), TodoState::demo());

        client.dispatch(TodoAction::remove("a")).unwrap();

        // The first frame may be the post-init presence announcement.
        let mut entries = 0;
        while entries == 0 {
            let frame = remote.recv().await.unwrap();
            match Msg::decode(&frame).unwrap() {
                WireMessage::Action(msg) => {
                    assert_eq!(msg.client_id, ClientId::new("c1"));
                    entries = msg.entries.len();
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(entries, 1);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn idle_client_sends_heartbeats() {
        let connector = MockConnector::new();
        let mut remote = connector.push_connection();
        let config = config().with_heartbeat_interval(Some(Duration::from_millis(30)));
        let client = SyncClient::start(TodoDomain, TodoState::new(), None, config, connector);

        remote.send(init_frame("c1"));
        wait_for(|| client.connected()).await;
        client
            .select(SelectionAction::Select {
                todo_id: "b".to_string(),
            })
            .unwrap();

        let mut heartbeats = 0;
        tokio::time::timeout(Duration::from_secs(5), async {
            while heartbeats < 3 {
                let frame = remote.recv().await.unwrap();
                match Msg::decode(&frame).unwrap() {
                    WireMessage::Action(msg) => {
                        assert!(msg.is_heartbeat());
                        if msg.selection == Some("b".to_string()) {
                            heartbeats += 1;
                        }
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
        })
        .await
        .expect("no heartbeats while idle");
        assert!(client.stats().flushes >= 3);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn reconnects_after_loss() {
        let connector = Arc::new(MockConnector::new());
        let first = connector.push_connection();
        let second = connector.push_connection();

        let client = SyncClient::start(
            TodoDomain,
            TodoState::new(),
            None,
            config(),
            SharedConnector(Arc::clone(&connector)),
        );

        first.send(init_frame("c1"));
        wait_for(|| client.self_id() == Some(ClientId::new("c1"))).await;

        drop(first);
        wait_for(|| !client.connected()).await;
        assert!(client.presence().is_empty());

        second.send(init_frame("c2"));
        wait_for(|| client.self_id() == Some(ClientId::new("c2"))).await;
        assert_eq!(connector.attempts(), 2);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn retries_failed_connects() {
        let connector = Arc::new(MockConnector::new());
        let client = SyncClient::start(
            TodoDomain,
            TodoState::new(),
            None,
            config(),
            SharedConnector(Arc::clone(&connector)),
        );

        wait_for(|| connector.attempts() >= 3).await;
        assert!(!client.connected());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_client() {
        let connector = MockConnector::new();
        let remote = connector.push_connection();
        let client = SyncClient::start(TodoDomain, TodoState::new(), None, config(), connector);
        remote.send(init_frame("c1"));
        wait_for(|| client.connected()).await;

        client.shutdown().await;
        assert!(!client.connected());
        assert!(matches!(
            client.dispatch(TodoAction::remove("a")),
            Err(EngineError::Closed)
        ));
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let connector = MockConnector::new();
        let remote = connector.push_connection();
        let client = SyncClient::start(TodoDomain, TodoState::new(), None, config(), connector);
        let mut changes = client.subscribe();

        remote.send(init_frame("c1"));
        tokio::time::timeout(Duration::from_secs(5), changes.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(client.connected());

        client.shutdown().await;
    }

    /// Lets a test keep a handle on the connector it gave away.
    struct SharedConnector(Arc<MockConnector>);

    impl Connector for SharedConnector {
        async fn connect(&self) -> EngineResult<Connection> {
            self.0.connect().await
        }
    }
}
