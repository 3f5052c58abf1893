pub mod metadata;
mod presence;

pub use presence::{DiscordBridge, DiscordConnector};
