pub mod commands;
pub mod control_server;
pub mod discord;
pub mod error;
pub mod logging;
pub mod presence;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use control_server::{ControlContext, ControlServer};
use discord::DiscordConnector;
use presence::SessionManager;
use settings::SettingsStore;

/// Grace period for the bridge to flush its disconnect before the runtime stops
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

pub async fn run() -> Result<(), String> {
    let _log_guard = logging::init_logging();

    let store = Arc::new(SettingsStore::open_default()?);
    let settings = store.settings();
    let session = SessionManager::new(Arc::new(DiscordConnector::new()));

    let server = ControlServer::start(
        settings.control_port,
        ControlContext {
            session: session.clone(),
            store: Arc::clone(&store),
            runtime: tokio::runtime::Handle::current(),
        },
    )?;

    if settings.auto_connect {
        let session = session.clone();
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let result = commands::auto_connect(&session, &store).await;
            if let Some(error) = result.error {
                tracing::warn!("Auto-connect failed: {}", error);
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;

    tracing::info!("Shutting down");
    server.stop();
    session.disconnect();
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    Ok(())
}
