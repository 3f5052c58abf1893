//! Discord Rich Presence bridge using discord-sdk

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use discord_sdk::{
    activity::{ActivityBuilder, Assets, Button},
    wheel::{UserState, Wheel},
    Discord, Subscriptions,
};

use crate::presence::{Bridge, BridgeConnector, BridgeError, BridgeEvents, Transport, WireActivity};

/// Creates one [`DiscordBridge`] per connect attempt
#[derive(Debug, Default)]
pub struct DiscordConnector;

impl DiscordConnector {
    pub fn new() -> Self {
        Self
    }
}

impl BridgeConnector for DiscordConnector {
    fn name(&self) -> &'static str {
        "Discord"
    }

    fn create(
        &self,
        transport: Transport,
        events: BridgeEvents,
    ) -> Result<Arc<dyn Bridge>, BridgeError> {
        match transport {
            Transport::Ipc => Ok(Arc::new(DiscordBridge::new(events))),
        }
    }
}

/// A single Discord IPC connection
pub struct DiscordBridge {
    events: BridgeEvents,
    discord: Mutex<Option<Arc<Discord>>>,
}

impl DiscordBridge {
    fn new(events: BridgeEvents) -> Self {
        Self {
            events,
            discord: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<Arc<Discord>, BridgeError> {
        self.discord
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(BridgeError::Destroyed)
    }
}

fn parse_app_id(identifier: &str) -> Result<i64, BridgeError> {
    identifier
        .trim()
        .parse::<i64>()
        .map_err(|_| BridgeError::InvalidIdentifier(identifier.to_string()))
}

fn epoch_millis(ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}

fn build_activity(activity: WireActivity) -> ActivityBuilder {
    let mut builder = ActivityBuilder::new();

    if let Some(details) = activity.details {
        builder = builder.details(details);
    }
    if let Some(state) = activity.state {
        builder = builder.state(state);
    }

    if activity.large_image.is_some() || activity.small_image.is_some() {
        let mut assets = Assets::default();
        if let Some(image) = activity.large_image {
            assets = assets.large(image.key, image.text);
        }
        if let Some(image) = activity.small_image {
            assets = assets.small(image.key, image.text);
        }
        builder = builder.assets(assets);
    }

    if let Some(start) = activity.start_timestamp {
        builder = builder.start_timestamp(epoch_millis(start));
    }
    if let Some(end) = activity.end_timestamp {
        builder = builder.end_timestamp(epoch_millis(end));
    }

    for button in activity.buttons {
        builder = builder.button(Button {
            label: button.label,
            url: button.url,
        });
    }

    builder
}

#[async_trait::async_trait]
impl Bridge for DiscordBridge {
    async fn login(&self, identifier: &str) -> Result<(), BridgeError> {
        let app_id = parse_app_id(identifier)?;

        let (wheel, handler) = Wheel::new(Box::new(|err| {
            tracing::warn!("Discord error: {:?}", err);
        }));
        let mut user_spoke = wheel.user();

        let discord = Discord::new(app_id, Subscriptions::ACTIVITY, Box::new(handler))
            .map_err(|e| BridgeError::Client(format!("Discord not available: {:?}", e)))?;

        *self.discord.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(discord));

        let events = self.events.clone();
        tokio::spawn(async move {
            // Keep the wheel alive for as long as the user spoke is watched
            let _wheel = wheel;
            while user_spoke.0.changed().await.is_ok() {
                let connected = match &*user_spoke.0.borrow() {
                    UserState::Connected(user) => {
                        tracing::info!("Discord Rich Presence connected as {}", user.username);
                        true
                    }
                    UserState::Disconnected(err) => {
                        tracing::info!("Discord disconnected: {:?}", err);
                        false
                    }
                };

                if connected {
                    events.ready();
                } else {
                    events.disconnected();
                }
            }
            tracing::debug!("Discord user watcher finished");
        });

        Ok(())
    }

    async fn set_activity(&self, activity: WireActivity) -> Result<(), BridgeError> {
        let discord = self.client()?;
        discord
            .update_activity(build_activity(activity))
            .await
            .map(|_| ())
            .map_err(|e| BridgeError::Client(format!("Failed to update Discord activity: {:?}", e)))
    }

    async fn clear_activity(&self) -> Result<(), BridgeError> {
        let discord = self.client()?;
        discord
            .clear_activity()
            .await
            .map(|_| ())
            .map_err(|e| BridgeError::Client(format!("Failed to clear Discord activity: {:?}", e)))
    }

    fn destroy(&self) -> Result<(), BridgeError> {
        let discord = self
            .discord
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // Never logged in, nothing to tear down
        let Some(discord) = discord else {
            return Ok(());
        };

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
        runtime.spawn(async move {
            match Arc::try_unwrap(discord) {
                Ok(discord) => {
                    discord.disconnect().await;
                    tracing::info!("Discord Rich Presence disconnected");
                }
                Err(_) => tracing::debug!("Discord client still in use, dropping without disconnect"),
            }
        });

        Ok(())
    }
}
