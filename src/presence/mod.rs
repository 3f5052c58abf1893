mod activity;
mod manager;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use activity::{Activity, ActivityButton, WireActivity, WireImage, MAX_BUTTONS, MAX_TEXT_LEN};
pub use manager::{SessionManager, SessionStatus, CONNECT_TIMEOUT};
pub use traits::{Bridge, BridgeConnector, BridgeError, BridgeEvent, BridgeEvents, Transport};
