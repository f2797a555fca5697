//! Persistence: the storage contract and two backends.
//!
//! Every save is a whole-record overwrite. The registry never asks a
//! backend to patch part of a record.

use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{ClientRecord, PersistenceError};

/// Banned remote address → username it was banned under.
pub type BanMap = BTreeMap<IpAddr, String>;

/// Durable storage for client records and the ban map.
///
/// Calls are synchronous and made while the registry lock is held.
pub trait Persistence: Send + Sync + 'static {
    /// Overwrites one client's stored record.
    fn save_user_data(&self, client: &ClientRecord) -> Result<(), PersistenceError>;

    /// Overwrites the stored ban map.
    fn save_banned_addresses(&self, bans: &BanMap) -> Result<(), PersistenceError>;

    /// Every stored client record.
    fn load_clients(&self) -> Result<Vec<ClientRecord>, PersistenceError>;

    /// The stored ban map, empty if none was saved yet.
    fn load_banned_addresses(&self) -> Result<BanMap, PersistenceError>;
}

// ---------------------------------------------------------------------------
// JsonStore
// ---------------------------------------------------------------------------

/// Stores each client as `<root>/players/<username>.json` and the ban map
/// as `<root>/banned.json`.
///
/// Writes are blocking `std::fs` calls made while the caller holds the
/// registry lock. Each file is one small record, and a moderation action
/// must be on disk before its confirmation is logged.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        let players = root.join("players");
        fs::create_dir_all(&players).map_err(|source| PersistenceError::Io {
            path: players,
            source,
        })?;
        Ok(Self { root })
    }

    fn players_dir(&self) -> PathBuf {
        self.root.join("players")
    }

    fn client_path(&self, username: &str) -> PathBuf {
        self.players_dir().join(format!("{username}.json"))
    }

    fn bans_path(&self) -> PathBuf {
        self.root.join("banned.json")
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let text = fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl Persistence for JsonStore {
    fn save_user_data(&self, client: &ClientRecord) -> Result<(), PersistenceError> {
        write_json(&self.client_path(&client.username), client)
    }

    fn save_banned_addresses(&self, bans: &BanMap) -> Result<(), PersistenceError> {
        write_json(&self.bans_path(), bans)
    }

    fn load_clients(&self) -> Result<Vec<ClientRecord>, PersistenceError> {
        let dir = self.players_dir();
        let entries = fs::read_dir(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut clients = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| PersistenceError::Io {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                clients.push(read_json(&path)?);
            }
        }
        Ok(clients)
    }

    fn load_banned_addresses(&self) -> Result<BanMap, PersistenceError> {
        let path = self.bans_path();
        if !path.exists() {
            return Ok(BanMap::new());
        }
        read_json(&path)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Keeps everything in memory and counts writes.
///
/// Meant for tests and throwaway servers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    clients: Mutex<BTreeMap<String, ClientRecord>>,
    bans: Mutex<BanMap>,
    user_saves: AtomicUsize,
    ban_saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record without counting it as a save.
    pub fn with_client(self, client: ClientRecord) -> Self {
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(client.username.clone(), client);
        }
        self
    }

    /// Number of `save_user_data` calls so far.
    pub fn user_saves(&self) -> usize {
        self.user_saves.load(Ordering::SeqCst)
    }

    /// Number of `save_banned_addresses` calls so far.
    pub fn ban_saves(&self) -> usize {
        self.ban_saves.load(Ordering::SeqCst)
    }

    /// The last saved record for `username`.
    pub fn client(&self, username: &str) -> Option<ClientRecord> {
        self.clients.lock().ok()?.get(username).cloned()
    }

    /// The last saved ban map.
    pub fn bans(&self) -> BanMap {
        self.bans.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

fn poisoned() -> PersistenceError {
    PersistenceError::Backend("memory store lock poisoned".into())
}

impl Persistence for MemoryStore {
    fn save_user_data(&self, client: &ClientRecord) -> Result<(), PersistenceError> {
        self.user_saves.fetch_add(1, Ordering::SeqCst);
        self.clients
            .lock()
            .map_err(|_| poisoned())?
            .insert(client.username.clone(), client.clone());
        Ok(())
    }

    fn save_banned_addresses(&self, bans: &BanMap) -> Result<(), PersistenceError> {
        self.ban_saves.fetch_add(1, Ordering::SeqCst);
        *self.bans.lock().map_err(|_| poisoned())? = bans.clone();
        Ok(())
    }

    fn load_clients(&self) -> Result<Vec<ClientRecord>, PersistenceError> {
        Ok(self.clients.lock().map_err(|_| poisoned())?.values().cloned().collect())
    }

    fn load_banned_addresses(&self) -> Result<BanMap, PersistenceError> {
        Ok(self.bans.lock().map_err(|_| poisoned())?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_store_saves_and_loads_client() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let mut client = ClientRecord::new("Bob", "hunter2");
        client.is_admin = true;
        client.home_tile = Some(outpost_protocol::TileId(42));

        store.save_user_data(&client).unwrap();

        assert_eq!(store.load_clients().unwrap(), vec![client]);
    }

    #[test]
    fn test_json_store_save_overwrites_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let mut client = ClientRecord::new("Bob", "pw");
        client.wealth = 900.0;
        store.save_user_data(&client).unwrap();

        client.wealth = 0.0;
        client.pawn_count = 3;
        store.save_user_data(&client).unwrap();

        let loaded = store.load_clients().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].wealth, 0.0);
        assert_eq!(loaded[0].pawn_count, 3);
    }

    #[test]
    fn test_json_store_missing_ban_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        assert!(store.load_banned_addresses().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_ban_map_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let mut bans = BanMap::new();
        bans.insert("10.0.0.7".parse().unwrap(), "Bob".into());

        store.save_banned_addresses(&bans).unwrap();

        assert_eq!(store.load_banned_addresses().unwrap(), bans);
    }

    #[test]
    fn test_json_store_corrupt_record_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("players").join("x.json"), "{not json").unwrap();

        assert!(matches!(store.load_clients(), Err(PersistenceError::Json { .. })));
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStore::new();
        store.save_user_data(&ClientRecord::new("A", "")).unwrap();
        store.save_user_data(&ClientRecord::new("A", "")).unwrap();
        store.save_banned_addresses(&BanMap::new()).unwrap();

        assert_eq!(store.user_saves(), 2);
        assert_eq!(store.ban_saves(), 1);
    }
}
