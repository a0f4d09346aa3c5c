//! Durable key-value storage and player settings.
//!
//! The browser build keeps everything in `localStorage`; native builds use a
//! single `settings(key, value)` table in SQLite. Values are JSON blobs.

use crate::api::{
    default_allowed_formats, CatalogOptions, TrackOrder, DEFAULT_DOWNLOAD_ENDPOINT,
    DEFAULT_METADATA_ENDPOINT,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[cfg(target_arch = "wasm32")]
use gloo_storage::{LocalStorage, Storage};
#[cfg(not(target_arch = "wasm32"))]
use rusqlite::OptionalExtension;

pub const SESSION_KEY: &str = "archiveplayer.session";
pub const SETTINGS_KEY: &str = "archiveplayer.settings";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Storage unavailable: {0}")]
    Storage(String),
    #[cfg(not(target_arch = "wasm32"))]
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Minimal string store the session and settings are written to.
pub trait KeyValueStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, DbError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), DbError>;
    fn remove(&self, key: &str) -> Result<(), DbError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::rc::Rc<S> {
    fn get_raw(&self, key: &str) -> Result<Option<String>, DbError> {
        (**self).get_raw(key)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), DbError> {
        (**self).set_raw(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), DbError> {
        (**self).remove(key)
    }
}

/// Read and decode a JSON value. Absent, unreadable and malformed values all
/// come back as `None`; the latter two are logged.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get_raw(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, %err, "failed to read stored value");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, %err, "ignoring malformed stored value");
            None
        }
    }
}

pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), DbError> {
    let json = serde_json::to_string(value)?;
    store.set_raw(key, &json)
}

/// `localStorage` of the current window.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserStore;

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for BrowserStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, DbError> {
        LocalStorage::raw()
            .get_item(key)
            .map_err(|e| DbError::Storage(format!("{e:?}")))
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), DbError> {
        LocalStorage::raw()
            .set_item(key, value)
            .map_err(|e| DbError::Storage(format!("{e:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), DbError> {
        LocalStorage::raw()
            .remove_item(key)
            .map_err(|e| DbError::Storage(format!("{e:?}")))
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub struct SqliteStore {
    conn: rusqlite::Connection,
}

#[cfg(not(target_arch = "wasm32"))]
impl SqliteStore {
    pub fn open(path: &std::path::Path) -> Result<Self, DbError> {
        Self::initialize(rusqlite::Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::initialize(rusqlite::Connection::open_in_memory()?)
    }

    /// `<data dir>/archiveplayer/archiveplayer.db`, created on demand.
    pub fn open_default() -> Result<Self, DbError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| DbError::Storage("no data directory on this platform".to_string()))?
            .join("archiveplayer");
        std::fs::create_dir_all(&data_dir).map_err(|e| DbError::Storage(e.to_string()))?;
        Self::open(&data_dir.join("archiveplayer.db"))
    }

    fn initialize(conn: rusqlite::Connection) -> Result<Self, DbError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for SqliteStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [key],
                |row: &rusqlite::Row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            [key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DbError> {
        self.conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// Process-local store used when the platform store cannot be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: std::cell::RefCell<std::collections::HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DbError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

/// The store this build persists to.
#[cfg(target_arch = "wasm32")]
pub fn open_platform_store() -> Result<Box<dyn KeyValueStore>, DbError> {
    Ok(Box::new(BrowserStore))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn open_platform_store() -> Result<Box<dyn KeyValueStore>, DbError> {
    Ok(Box::new(SqliteStore::open_default()?))
}

fn default_identifier() -> String {
    "tacgiasuthatman".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metadata_endpoint() -> String {
    DEFAULT_METADATA_ENDPOINT.to_string()
}

fn default_download_endpoint() -> String {
    DEFAULT_DOWNLOAD_ENDPOINT.to_string()
}

/// Player settings stored next to the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default = "default_identifier")]
    pub default_identifier: String,
    #[serde(default)]
    pub track_order: TrackOrder,
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,
    #[serde(default)]
    pub numbered_titles: bool,
    /// Keep the neighbouring tracks loaded in spare audio elements.
    #[serde(default = "default_true")]
    pub prebuffer: bool,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,
    #[serde(default = "default_download_endpoint")]
    pub download_endpoint: String,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_identifier: default_identifier(),
            track_order: TrackOrder::default(),
            allowed_formats: default_allowed_formats(),
            numbered_titles: false,
            prebuffer: true,
            artist: None,
            artwork_url: None,
            metadata_endpoint: default_metadata_endpoint(),
            download_endpoint: default_download_endpoint(),
        }
    }
}

impl PlayerSettings {
    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            metadata_endpoint: self.metadata_endpoint.clone(),
            download_endpoint: self.download_endpoint.clone(),
            allowed_formats: self.allowed_formats.clone(),
            order: self.track_order,
            numbered_titles: self.numbered_titles,
        }
    }

    /// Artist shown in the OS now-playing surface.
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    pub fn media_artist(&self, identifier: &str) -> String {
        self.artist
            .clone()
            .filter(|artist| !artist.trim().is_empty())
            .unwrap_or_else(|| identifier.to_string())
    }
}

pub fn load_settings(store: &dyn KeyValueStore) -> PlayerSettings {
    load_json(store, SETTINGS_KEY).unwrap_or_default()
}

pub fn save_settings(store: &dyn KeyValueStore, settings: &PlayerSettings) -> Result<(), DbError> {
    save_json(store, SETTINGS_KEY, settings)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn sqlite_store_set_get_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_raw("k").unwrap(), None);

        store.set_raw("k", "1").unwrap();
        store.set_raw("k", "2").unwrap();
        assert_eq!(store.get_raw("k").unwrap().as_deref(), Some("2"));

        store.remove("k").unwrap();
        assert_eq!(store.get_raw("k").unwrap(), None);
    }

    #[test]
    fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archiveplayer.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set_raw(SESSION_KEY, r#"{"identifier":"x"}"#).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get_raw(SESSION_KEY).unwrap().as_deref(),
            Some(r#"{"identifier":"x"}"#)
        );
    }

    #[test]
    fn settings_fall_back_to_defaults() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(load_settings(&store), PlayerSettings::default());

        store.set_raw(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(load_settings(&store), PlayerSettings::default());

        store
            .set_raw(SETTINGS_KEY, r#"{"track_order":"NewestFirst"}"#)
            .unwrap();
        let settings = load_settings(&store);
        assert_eq!(settings.track_order, TrackOrder::NewestFirst);
        assert!(settings.prebuffer);
        assert_eq!(settings.allowed_formats, default_allowed_formats());
    }

    #[test]
    fn settings_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let settings = PlayerSettings {
            default_identifier: "other-item".to_string(),
            numbered_titles: true,
            artist: Some("Narrator".to_string()),
            ..PlayerSettings::default()
        };
        save_settings(&store, &settings).unwrap();
        assert_eq!(load_settings(&store), settings);
    }

    #[test]
    fn memory_store_behaves_like_sqlite() {
        let store = MemoryStore::default();
        store.set_raw("k", "v").unwrap();
        assert_eq!(store.get_raw("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get_raw("k").unwrap(), None);
    }

    #[test]
    fn media_artist_falls_back_to_identifier() {
        let mut settings = PlayerSettings::default();
        assert_eq!(settings.media_artist("item"), "item");
        settings.artist = Some("  ".to_string());
        assert_eq!(settings.media_artist("item"), "item");
        settings.artist = Some("Someone".to_string());
        assert_eq!(settings.media_artist("item"), "Someone");
    }
}
