//! Command surface for the presentation layer. Every failure is reported as
//! `{success: false, error}` instead of crossing the boundary as an error.

use serde::{Deserialize, Serialize};

use crate::presence::{Activity, SessionManager, SessionStatus};
use crate::settings::SettingsStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

impl<E: std::fmt::Display> From<Result<(), E>> for CommandResult {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub connected: bool,
    pub identifier: Option<String>,
}

pub async fn connect(session: &SessionManager, identifier: Option<&str>) -> CommandResult {
    tracing::info!("Connect requested");
    session.connect(identifier).await.into()
}

pub async fn disconnect(session: &SessionManager) -> CommandResult {
    tracing::info!("Disconnect requested");
    session.disconnect();
    CommandResult::ok()
}

pub async fn set_activity(session: &SessionManager, activity: Activity) -> CommandResult {
    session.set_activity(activity).await.into()
}

pub async fn clear_activity(session: &SessionManager) -> CommandResult {
    session.clear_activity().await.into()
}

pub fn get_status(session: &SessionManager) -> RpcStatus {
    RpcStatus {
        connected: session.is_connected(),
        identifier: session.identifier(),
    }
}

/// Startup policy: reconnect with the remembered identifier when enabled, then
/// publish the default preset if it belongs to that identifier.
pub async fn auto_connect(session: &SessionManager, store: &SettingsStore) -> CommandResult {
    let settings = store.settings();
    if !settings.auto_connect {
        return CommandResult::failed("Auto-connect is disabled");
    }
    let Some(identifier) = settings.last_identifier.filter(|id| !id.is_empty()) else {
        return CommandResult::failed("No application identifier to auto-connect with");
    };

    tracing::info!("Auto-connecting with {}", identifier);
    let result = connect(session, Some(&identifier)).await;
    if !result.success {
        return result;
    }

    match store.default_preset() {
        Some(preset)
            if preset.identifier == identifier && session.status() == SessionStatus::Connected =>
        {
            tracing::info!("Publishing default preset");
            set_activity(session, preset.activity).await
        }
        _ => result,
    }
}
