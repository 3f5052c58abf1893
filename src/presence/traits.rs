use std::sync::Arc;

use tokio::sync::mpsc;

use super::activity::WireActivity;

/// Transport used to reach the local chat client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Local IPC socket / named pipe
    Ipc,
}

/// Lifecycle notifications emitted by a bridge client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Handshake finished, activity calls are accepted
    Ready,
    /// The chat client went away
    Disconnected,
}

/// Errors reported by a bridge client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid application identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{0}")]
    Client(String),

    #[error("Bridge client has already been destroyed")]
    Destroyed,

    #[error("No async runtime available")]
    NoRuntime,
}

/// Sending half handed to a bridge client at construction so it can report
/// readiness and disconnection back to the session manager.
#[derive(Debug, Clone)]
pub struct BridgeEvents {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl BridgeEvents {
    pub fn new(tx: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self { tx }
    }

    pub fn ready(&self) {
        self.emit(BridgeEvent::Ready);
    }

    pub fn disconnected(&self) {
        self.emit(BridgeEvent::Disconnected);
    }

    pub fn emit(&self, event: BridgeEvent) {
        // Receiver is gone once the session manager dropped this attempt
        let _ = self.tx.send(event);
    }
}

/// One underlying connection to the presence host application
#[async_trait::async_trait]
pub trait Bridge: Send + Sync {
    /// Start the handshake. Readiness is reported through [`BridgeEvents`].
    async fn login(&self, identifier: &str) -> Result<(), BridgeError>;

    async fn set_activity(&self, activity: WireActivity) -> Result<(), BridgeError>;

    async fn clear_activity(&self) -> Result<(), BridgeError>;

    /// Tear the connection down. Synchronous and may fail.
    fn destroy(&self) -> Result<(), BridgeError>;
}

/// Factory for bridge clients, one per connect attempt
pub trait BridgeConnector: Send + Sync {
    /// Returns the name of the bridge (for logging)
    fn name(&self) -> &'static str;

    fn create(
        &self,
        transport: Transport,
        events: BridgeEvents,
    ) -> Result<Arc<dyn Bridge>, BridgeError>;
}
