use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::presence::Activity;

const SETTINGS_FILE: &str = "settings.json";
const APP_DIR: &str = "rich-presence-manager";
const DATA_DIR_ENV: &str = "RICH_PRESENCE_DATA_DIR";

pub const DEFAULT_CONTROL_PORT: u16 = 6473;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub auto_connect: bool,
    pub minimize_to_tray: bool,
    pub last_identifier: Option<String>,
    pub control_port: u16,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_connect: false,
            minimize_to_tray: true,
            last_identifier: None,
            control_port: DEFAULT_CONTROL_PORT,
        }
    }
}

/// A named preset: which application to connect as and what to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub activity: Activity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPreset {
    pub identifier: String,
    #[serde(default)]
    pub activity: Activity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoreData {
    #[serde(flatten)]
    settings: AppSettings,
    profiles: Vec<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_preset: Option<DefaultPreset>,
}

/// Directory holding the settings file and logs
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Flat JSON-backed store for settings, profiles and the default preset.
/// Every mutation rewrites the whole file; last write wins.
pub struct SettingsStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl SettingsStore {
    pub fn open_default() -> Result<Self, String> {
        Self::open(data_dir().join(SETTINGS_FILE))
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        tracing::debug!("Loading settings from {}", path.display());
        let data = load(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(&self, apply: impl FnOnce(&mut StoreData) -> T) -> Result<T, String> {
        let mut data = self.lock();
        let mut next = data.clone();
        let result = apply(&mut next);
        save(&self.path, &next)?;
        *data = next;
        Ok(result)
    }

    pub fn settings(&self) -> AppSettings {
        self.lock().settings.clone()
    }

    pub fn save_settings(&self, settings: AppSettings) -> Result<AppSettings, String> {
        tracing::debug!("Saving settings");
        self.update(|data| {
            data.settings = settings.clone();
        })?;
        Ok(settings)
    }

    pub fn set_last_identifier(&self, identifier: &str) -> Result<(), String> {
        self.update(|data| {
            data.settings.last_identifier = Some(identifier.to_string());
        })
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.lock().profiles.clone()
    }

    /// Insert or replace (by id) a profile. An empty id gets a fresh one.
    pub fn save_profile(&self, mut profile: Profile) -> Result<Profile, String> {
        if profile.id.is_empty() {
            profile.id = new_profile_id(&self.lock().profiles);
        }

        tracing::debug!("Saving profile {} ({})", profile.name, profile.id);
        let saved = profile.clone();
        self.update(move |data| {
            match data.profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => *existing = profile,
                None => data.profiles.push(profile),
            }
        })?;
        Ok(saved)
    }

    pub fn delete_profile(&self, id: &str) -> Result<bool, String> {
        if !self.lock().profiles.iter().any(|p| p.id == id) {
            return Ok(false);
        }

        tracing::debug!("Deleting profile {}", id);
        self.update(|data| data.profiles.retain(|p| p.id != id))?;
        Ok(true)
    }

    pub fn default_preset(&self) -> Option<DefaultPreset> {
        self.lock().default_preset.clone()
    }

    pub fn save_default_preset(&self, preset: DefaultPreset) -> Result<(), String> {
        tracing::debug!("Saving default preset for {}", preset.identifier);
        self.update(|data| data.default_preset = Some(preset))
    }

    pub fn clear_default_preset(&self) -> Result<(), String> {
        tracing::debug!("Clearing default preset");
        self.update(|data| data.default_preset = None)
    }
}

/// Epoch milliseconds, bumped past any id already taken
fn new_profile_id(existing: &[Profile]) -> String {
    let mut id = chrono::Utc::now().timestamp_millis();
    while existing.iter().any(|p| p.id == id.to_string()) {
        id += 1;
    }
    id.to_string()
}

fn load(path: &Path) -> Result<StoreData, String> {
    if !path.exists() {
        return Ok(StoreData::default());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read settings file: {}", e))?;

    serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))
}

fn save(path: &Path, data: &StoreData) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(data)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    fs::write(path, contents).map_err(|e| format!("Failed to write settings file: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SettingsStore {
        SettingsStore::open(dir.path().join(SETTINGS_FILE)).unwrap()
    }

    fn profile(id: &str, name: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: name.to_string(),
            identifier: "123".to_string(),
            activity: Activity {
                details: Some(name.to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert_eq!(store.settings(), AppSettings::default());
        assert!(store.settings().minimize_to_tray);
        assert!(!store.settings().auto_connect);
        assert!(store.profiles().is_empty());
        assert_eq!(store.default_preset(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_settings_persist() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut settings = store.settings();
        settings.auto_connect = true;
        store.save_settings(settings).unwrap();
        store.set_last_identifier("987").unwrap();

        let reopened = SettingsStore::open(store.path()).unwrap();
        assert!(reopened.settings().auto_connect);
        assert_eq!(reopened.settings().last_identifier.as_deref(), Some("987"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"autoConnect": true}"#).unwrap();

        let store = SettingsStore::open(&path).unwrap();

        assert!(store.settings().auto_connect);
        assert!(store.settings().minimize_to_tray);
        assert_eq!(store.settings().control_port, DEFAULT_CONTROL_PORT);
        assert!(store.profiles().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{not json").unwrap();

        let err = SettingsStore::open(&path).err().unwrap();
        assert!(err.starts_with("Failed to parse settings"));
    }

    #[test]
    fn test_profile_upsert_keeps_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save_profile(profile("1", "First")).unwrap();
        store.save_profile(profile("2", "Second")).unwrap();
        store.save_profile(profile("1", "Renamed")).unwrap();

        let profiles = SettingsStore::open(store.path()).unwrap().profiles();
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Renamed", "Second"]);
    }

    #[test]
    fn test_profile_without_id_gets_one() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = store.save_profile(profile("", "A")).unwrap();
        let second = store.save_profile(profile("", "B")).unwrap();

        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id);
        assert_eq!(store.profiles().len(), 2);
    }

    #[test]
    fn test_delete_profile() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_profile(profile("1", "First")).unwrap();

        assert!(!store.delete_profile("missing").unwrap());
        assert!(store.delete_profile("1").unwrap());
        assert!(!store.delete_profile("1").unwrap());
        assert!(store.profiles().is_empty());
    }

    #[test]
    fn test_default_preset_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let preset = DefaultPreset {
            identifier: "123".to_string(),
            activity: Activity {
                state: Some("Idle".to_string()),
                ..Default::default()
            },
        };

        store.save_default_preset(preset.clone()).unwrap();
        assert_eq!(
            SettingsStore::open(store.path()).unwrap().default_preset(),
            Some(preset)
        );

        store.clear_default_preset().unwrap();
        assert_eq!(
            SettingsStore::open(store.path()).unwrap().default_preset(),
            None
        );
    }
}
