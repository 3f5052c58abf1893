use std::time::Duration;

use crate::presence::BridgeError;

/// Failures surfaced by the session manager to its direct caller
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Connect was attempted without any application identifier
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An activity operation was attempted while not connected
    #[error("Not connected to Discord")]
    NotConnected,

    /// The bridge never reported ready within the connect window
    #[error("Connection timed out after {}s, make sure Discord is running", .0.as_secs())]
    Timeout(Duration),

    /// The bridge client rejected a call
    #[error(transparent)]
    Transport(#[from] BridgeError),
}
