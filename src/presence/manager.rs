//! Owns the single bridge connection and serializes activity updates against it

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::activity::Activity;
use super::traits::{Bridge, BridgeConnector, BridgeError, BridgeEvent, BridgeEvents, Transport};
use crate::error::SessionError;

/// How long a connect attempt waits for the bridge to report ready
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Never connected
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Was connected (or tried to), now is not
    Disconnected,
}

type ConnectResult = Result<(), SessionError>;

/// The one outstanding connect attempt. Settling it consumes the record, so
/// whichever of ready / login failure / timeout gets here first wins.
struct PendingConnect {
    attempt: u64,
    tx: oneshot::Sender<ConnectResult>,
}

struct LiveClient {
    attempt: u64,
    client: Arc<dyn Bridge>,
}

#[derive(Default)]
struct SessionState {
    identifier: Option<String>,
    status: SessionStatus,
    client: Option<LiveClient>,
    last_activity: Option<Activity>,
    pending: Option<PendingConnect>,
    /// Attempts replaced by a newer connect; they settle only on their own timer
    superseded: HashMap<u64, oneshot::Sender<ConnectResult>>,
    next_attempt: u64,
}

impl SessionState {
    fn is_live(&self, attempt: u64) -> bool {
        self.client.as_ref().is_some_and(|live| live.attempt == attempt)
    }

    fn take_pending(&mut self, attempt: u64) -> Option<PendingConnect> {
        if self.pending.as_ref().is_some_and(|p| p.attempt == attempt) {
            self.pending.take()
        } else {
            None
        }
    }

    fn connected_client(&self) -> Option<Arc<dyn Bridge>> {
        match (&self.client, self.status) {
            (Some(live), SessionStatus::Connected) => Some(Arc::clone(&live.client)),
            _ => None,
        }
    }

    /// Destroy the current client if any. Never fails.
    fn teardown(&mut self) {
        if let Some(live) = self.client.take() {
            if let Err(e) = live.client.destroy() {
                tracing::warn!("Error destroying bridge client: {}", e);
            }
            self.status = SessionStatus::Disconnected;
        }
    }
}

/// Session manager for the presence bridge.
///
/// Cheap to clone; all clones share one session. Background tasks spawned per
/// connect attempt hold a clone and identify themselves by attempt number, so
/// anything arriving from a replaced or destroyed client is ignored.
#[derive(Clone)]
pub struct SessionManager {
    connector: Arc<dyn BridgeConnector>,
    state: Arc<Mutex<SessionState>>,
    connect_timeout: Duration,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn BridgeConnector>) -> Self {
        Self {
            connector,
            state: Arc::new(Mutex::new(SessionState::default())),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a connection, remembering `identifier` for later reconnects.
    ///
    /// Resolves once the bridge reports ready and the last activity, if any,
    /// has been replayed (a failed or stuck replay is logged and skipped).
    /// Fails on login error or after the connect timeout. Calling this while another attempt is outstanding replaces
    /// that attempt; the replaced call only settles through its own timeout.
    pub async fn connect(&self, identifier: Option<&str>) -> Result<(), SessionError> {
        let rx = {
            let mut state = self.lock();

            if let Some(id) = identifier.filter(|id| !id.is_empty()) {
                state.identifier = Some(id.to_string());
            }

            let identifier = state.identifier.clone().ok_or_else(|| {
                SessionError::InvalidArgument("An application identifier is required".to_string())
            })?;

            if state.client.is_some() {
                state.teardown();
            }

            let attempt = state.next_attempt;
            state.next_attempt += 1;

            let (tx, rx) = oneshot::channel();
            if let Some(previous) = state.pending.replace(PendingConnect { attempt, tx }) {
                tracing::debug!(attempt = previous.attempt, "Superseding pending connect attempt");
                state.superseded.insert(previous.attempt, previous.tx);
            }

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let client = match self
                .connector
                .create(Transport::Ipc, BridgeEvents::new(events_tx))
            {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!("Failed to create {} client: {}", self.connector.name(), e);
                    state.pending = None;
                    state.status = SessionStatus::Disconnected;
                    return Err(e.into());
                }
            };

            tracing::info!(attempt, "Connecting to {}...", self.connector.name());
            state.status = SessionStatus::Connecting;
            state.client = Some(LiveClient {
                attempt,
                client: Arc::clone(&client),
            });

            tokio::spawn(self.clone().watch_events(attempt, events_rx));

            let manager = self.clone();
            tokio::spawn(async move {
                if let Err(e) = client.login(&identifier).await {
                    manager.on_login_failure(attempt, e);
                }
            });

            // Started last so an event emitted during construction is already queued
            let manager = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(manager.connect_timeout).await;
                manager.on_timeout(attempt);
            });

            rx
        };

        // Senders are only dropped unsent if the runtime shuts down mid-attempt
        rx.await
            .unwrap_or(Err(SessionError::Timeout(self.connect_timeout)))
    }

    /// Drop the connection. Idempotent and never fails.
    pub fn disconnect(&self) {
        let mut state = self.lock();
        if state.client.is_some() {
            state.teardown();
            tracing::info!("{} disconnected", self.connector.name());
        }
    }

    /// Publish `activity`. It is remembered before transmission so a
    /// reconnect in the middle still replays it.
    pub async fn set_activity(&self, activity: Activity) -> Result<(), SessionError> {
        let client = {
            let mut state = self.lock();
            let client = state.connected_client().ok_or(SessionError::NotConnected)?;
            state.last_activity = Some(activity.clone());
            client
        };

        tracing::debug!("Updating activity: {:?}", activity);
        client.set_activity(activity.normalize()).await?;
        Ok(())
    }

    pub async fn clear_activity(&self) -> Result<(), SessionError> {
        let client = {
            let mut state = self.lock();
            let client = state.connected_client().ok_or(SessionError::NotConnected)?;
            state.last_activity = None;
            client
        };

        tracing::debug!("Clearing activity");
        client.clear_activity().await?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.lock().status == SessionStatus::Connected
    }

    pub fn identifier(&self) -> Option<String> {
        self.lock().identifier.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn last_activity(&self) -> Option<Activity> {
        self.lock().last_activity.clone()
    }

    async fn watch_events(self, attempt: u64, mut events: mpsc::UnboundedReceiver<BridgeEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                BridgeEvent::Ready => self.on_ready(attempt),
                BridgeEvent::Disconnected => self.on_disconnected(attempt),
            }
        }
    }

    fn on_ready(&self, attempt: u64) {
        let (pending, replay) = {
            let mut state = self.lock();
            let client = match &state.client {
                Some(live) if live.attempt == attempt => Arc::clone(&live.client),
                _ => {
                    tracing::debug!(attempt, "Ignoring ready event from a stale client");
                    return;
                }
            };

            state.status = SessionStatus::Connected;
            let pending = state.take_pending(attempt);
            let replay = state
                .last_activity
                .clone()
                .map(|activity| (client, activity));
            (pending, replay)
        };

        tracing::info!("{} connected", self.connector.name());

        if pending.is_some() || replay.is_some() {
            tokio::spawn(self.clone().finish_connect(pending, replay));
        }
    }

    /// Replays the last activity, then resolves the connect. The replay is
    /// bounded by the connect timeout so a stuck bridge call cannot hold the
    /// caller forever.
    async fn finish_connect(
        self,
        pending: Option<PendingConnect>,
        replay: Option<(Arc<dyn Bridge>, Activity)>,
    ) {
        if let Some((client, activity)) = replay {
            tracing::debug!("Replaying last activity after connect");
            let sent =
                tokio::time::timeout(self.connect_timeout, client.set_activity(activity.normalize()))
                    .await;
            match sent {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Failed to replay activity: {}", e),
                Err(_) => tracing::warn!(
                    "Replaying activity took longer than {}s, giving up",
                    self.connect_timeout.as_secs()
                ),
            }
        }

        if let Some(pending) = pending {
            let _ = pending.tx.send(Ok(()));
        }
    }

    /// Host-side drop of an established session. Ignored while connecting,
    /// where the bridge may report disconnects between handshake retries.
    fn on_disconnected(&self, attempt: u64) {
        let mut state = self.lock();
        if state.is_live(attempt) && state.status == SessionStatus::Connected {
            tracing::info!("{} disconnected by the host", self.connector.name());
            state.status = SessionStatus::Disconnected;
        }
    }

    fn on_login_failure(&self, attempt: u64, error: BridgeError) {
        let pending = {
            let mut state = self.lock();
            let pending = state.take_pending(attempt);
            if pending.is_some() && state.is_live(attempt) {
                state.teardown();
            }
            pending
        };

        match pending {
            Some(pending) => {
                tracing::warn!("{} login failed: {}", self.connector.name(), error);
                let _ = pending.tx.send(Err(error.into()));
            }
            None => tracing::debug!(attempt, "Ignoring login failure of a settled attempt: {}", error),
        }
    }

    fn on_timeout(&self, attempt: u64) {
        let tx = {
            let mut state = self.lock();
            match state.take_pending(attempt) {
                Some(pending) => {
                    tracing::warn!("{} handshake timed out", self.connector.name());
                    if state.is_live(attempt) {
                        state.teardown();
                    }
                    Some(pending.tx)
                }
                None => state.superseded.remove(&attempt),
            }
        };

        if let Some(tx) = tx {
            let _ = tx.send(Err(SessionError::Timeout(self.connect_timeout)));
        }
    }
}
