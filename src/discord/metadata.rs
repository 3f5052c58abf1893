//! Application metadata used to decorate the presence preview.
//!
//! Every fetch degrades to "unknown" (`None` / empty) on transport or parse
//! errors; callers must not treat absence as a failure.

use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://discord.com/api/v10";
const CDN_BASE: &str = "https://cdn.discordapp.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u32,
}

pub fn app_info_url(app_id: &str) -> String {
    format!("{}/applications/{}/rpc", API_BASE, app_id)
}

pub fn assets_url(app_id: &str) -> String {
    format!("{}/oauth2/applications/{}/assets", API_BASE, app_id)
}

pub fn asset_url(app_id: &str, asset_id: &str) -> String {
    format!("{}/app-assets/{}/{}.png", CDN_BASE, app_id, asset_id)
}

pub fn app_icon_url(app_id: &str, icon_hash: &str) -> String {
    format!("{}/app-icons/{}/{}.png", CDN_BASE, app_id, icon_hash)
}

pub fn parse_app_info(body: &str) -> Option<AppInfo> {
    serde_json::from_str(body).ok()
}

pub fn parse_assets(body: &str) -> Vec<Asset> {
    let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(body) else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

async fn get_text(url: &str) -> Option<String> {
    let response = reqwest::get(url).await.ok()?;
    response.text().await.ok()
}

pub async fn fetch_app_info(app_id: &str) -> Option<AppInfo> {
    tracing::debug!("Fetching application info for {}", app_id);
    let body = get_text(&app_info_url(app_id)).await?;
    parse_app_info(&body)
}

pub async fn fetch_assets(app_id: &str) -> Vec<Asset> {
    tracing::debug!("Fetching asset catalog for {}", app_id);
    match get_text(&assets_url(app_id)).await {
        Some(body) => parse_assets(&body),
        None => Vec::new(),
    }
}
