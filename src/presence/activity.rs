//! Presence payload and the normalized form that crosses the bridge boundary

use serde::{Deserialize, Serialize};

/// Maximum number of buttons the chat client will display
pub const MAX_BUTTONS: usize = 2;

/// Longest text accepted for any single line or caption
pub const MAX_TEXT_LEN: usize = 128;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

/// The activity a user wants broadcast. Every field is optional and an empty
/// payload means "no activity".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Activity {
    pub details: Option<String>,
    pub state: Option<String>,
    pub large_image_key: Option<String>,
    pub large_image_text: Option<String>,
    pub small_image_key: Option<String>,
    pub small_image_text: Option<String>,
    /// Epoch milliseconds
    pub start_timestamp: Option<i64>,
    /// Epoch milliseconds
    pub end_timestamp: Option<i64>,
    pub buttons: Vec<ActivityButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Normalized payload: absent fields are omitted rather than sent empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireActivity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_image: Option<WireImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_image: Option<WireImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ActivityButton>,
}

impl Activity {
    pub fn is_empty(&self) -> bool {
        self.normalize() == WireActivity::default()
    }

    /// Apply the boundary rules: drop empty text, pair captions with their
    /// image key, ignore zero timestamps and keep at most two buttons.
    pub fn normalize(&self) -> WireActivity {
        WireActivity {
            details: text(&self.details),
            state: text(&self.state),
            large_image: image(&self.large_image_key, &self.large_image_text),
            small_image: image(&self.small_image_key, &self.small_image_text),
            start_timestamp: self.start_timestamp.filter(|ts| *ts != 0),
            end_timestamp: self.end_timestamp.filter(|ts| *ts != 0),
            buttons: self
                .buttons
                .iter()
                .take(MAX_BUTTONS)
                .map(|button| ActivityButton {
                    label: button.label.clone(),
                    url: button.url.clone(),
                })
                .collect(),
        }
    }
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_TEXT_LEN).collect())
}

fn image(key: &Option<String>, caption: &Option<String>) -> Option<WireImage> {
    let key = key.as_deref().filter(|k| !k.is_empty())?;
    Some(WireImage {
        key: key.to_string(),
        text: text(caption),
    })
}
