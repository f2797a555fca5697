//! The session registry: saved roster, connected set and ban map.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is not synchronized. The server wraps it in one
//! `tokio::sync::Mutex` shared by the console and every connection task;
//! every read-modify-persist sequence happens under that single lock.
//! A client the network path has already released is simply absent, so
//! lookups from the console return [`SessionError::PlayerNotFound`].

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use outpost_protocol::{DisconnectReason, ServerRecord, TileId};

use crate::client::CancelReceiver;
use crate::{BanMap, ClientRecord, ConnectedClient, PeerSender, Persistence, PersistenceError, SessionError};

/// Server-side limits checked during admission.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy<'a> {
    pub max_players: usize,
    /// `Some` when the whitelist is enforced.
    pub whitelist: Option<&'a [String]>,
}

/// What a connection task gets back from a successful [`SessionRegistry::admit`].
#[derive(Debug)]
pub struct Admission {
    /// Pass back to [`SessionRegistry::release`].
    pub generation: u64,
    /// Becomes `Some(reason)` when the connection should close.
    pub cancel: CancelReceiver,
    /// `true` if this handshake created the client's record.
    pub registered: bool,
}

/// Every known client plus the live subset.
pub struct SessionRegistry {
    saved: BTreeMap<String, ClientRecord>,
    connected: BTreeMap<String, ConnectedClient>,
    bans: BanMap,
    next_generation: u64,
    store: Arc<dyn Persistence>,
}

impl SessionRegistry {
    /// An empty registry writing to `store`.
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            saved: BTreeMap::new(),
            connected: BTreeMap::new(),
            bans: BanMap::new(),
            next_generation: 0,
            store,
        }
    }

    /// A registry filled from `store`.
    pub fn load(store: Arc<dyn Persistence>) -> Result<Self, PersistenceError> {
        let clients = store.load_clients()?;
        let bans = store.load_banned_addresses()?;
        let mut registry = Self::new(store);
        registry.saved = clients
            .into_iter()
            .map(|client| (client.username.clone(), client))
            .collect();
        registry.bans = bans;
        tracing::info!(
            clients = registry.saved.len(),
            bans = registry.bans.len(),
            "session registry loaded"
        );
        Ok(registry)
    }

    // -- Saved roster -----------------------------------------------------

    pub fn saved(&self, username: &str) -> Option<&ClientRecord> {
        self.saved.get(username)
    }

    /// Saved records in username order.
    pub fn saved_clients(&self) -> impl Iterator<Item = &ClientRecord> {
        self.saved.values()
    }

    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    /// Mutates a saved record and writes it back.
    ///
    /// # Errors
    /// [`SessionError::PlayerNotFound`] if `username` was never registered.
    pub fn update<F>(&mut self, username: &str, change: F) -> Result<&ClientRecord, SessionError>
    where
        F: FnOnce(&mut ClientRecord),
    {
        let record = self
            .saved
            .get_mut(username)
            .ok_or_else(|| SessionError::PlayerNotFound(username.to_string()))?;
        change(&mut *record);
        save_client(self.store.as_ref(), record);
        Ok(record)
    }

    /// Saved settlements as `(tile, owner)`, in username order.
    pub fn home_tiles(&self) -> impl Iterator<Item = (TileId, &str)> {
        self.saved
            .values()
            .filter_map(|c| c.home_tile.map(|tile| (tile, c.username.as_str())))
    }

    // -- Connected set ----------------------------------------------------

    pub fn connected(&self, username: &str) -> Option<&ConnectedClient> {
        self.connected.get(username)
    }

    pub fn is_connected(&self, username: &str) -> bool {
        self.connected.contains_key(username)
    }

    /// Live connections in username order.
    pub fn connected_clients(&self) -> impl Iterator<Item = &ConnectedClient> {
        self.connected.values()
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    /// Checks a handshake and, on success, adds the connection.
    ///
    /// Checks run in this order: banned address, whitelist, capacity,
    /// credential, duplicate login. An unknown username is registered and
    /// persisted once every check has passed.
    pub fn admit(
        &mut self,
        username: &str,
        credential: &str,
        addr: SocketAddr,
        sender: PeerSender,
        policy: AdmissionPolicy<'_>,
    ) -> Result<Admission, SessionError> {
        if !is_valid_username(username) {
            return Err(SessionError::InvalidUsername(username.to_string()));
        }
        if self.bans.contains_key(&addr.ip()) {
            return Err(SessionError::Banned(addr.ip()));
        }
        if let Some(whitelist) = policy.whitelist {
            if !whitelist.iter().any(|name| name == username) {
                return Err(SessionError::NotWhitelisted(username.to_string()));
            }
        }
        if self.connected.len() >= policy.max_players {
            return Err(SessionError::Full);
        }
        let known = match self.saved.get(username) {
            Some(record) if record.credential != credential => {
                return Err(SessionError::InvalidCredentials(username.to_string()));
            }
            Some(_) => true,
            None => false,
        };
        if self.connected.contains_key(username) {
            return Err(SessionError::AlreadyConnected(username.to_string()));
        }

        if !known {
            let record = ClientRecord::new(username, credential);
            save_client(self.store.as_ref(), &record);
            self.saved.insert(username.to_string(), record);
            tracing::info!(%username, "new client registered");
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let (client, cancel) = ConnectedClient::new(username.to_string(), addr, sender, generation);
        self.connected.insert(username.to_string(), client);
        tracing::info!(%username, %addr, "client connected");

        Ok(Admission {
            generation,
            cancel,
            registered: !known,
        })
    }

    /// Removes a connection, but only the one identified by `generation`.
    ///
    /// A stale task cannot remove a newer login of the same user.
    pub fn release(&mut self, username: &str, generation: u64) -> bool {
        match self.connected.get(username) {
            Some(client) if client.generation() == generation => {
                self.connected.remove(username);
                tracing::info!(%username, "client disconnected");
                true
            }
            _ => false,
        }
    }

    /// Records inbound activity for the idle sweep.
    pub fn touch(&mut self, username: &str) {
        if let Some(client) = self.connected.get_mut(username) {
            client.touch();
        }
    }

    /// Connected usernames idle for longer than `timeout`.
    pub fn idle_clients(&self, timeout: Duration) -> Vec<String> {
        self.connected
            .values()
            .filter(|c| !c.is_disconnecting() && c.idle_for() > timeout)
            .map(|c| c.username().to_string())
            .collect()
    }

    /// Sends a record to every connection except `except`. Returns the
    /// number of peers it was queued for.
    pub fn broadcast(&self, record: &ServerRecord, except: Option<&str>) -> usize {
        self.connected
            .values()
            .filter(|c| Some(c.username()) != except)
            .filter(|c| c.send(record.clone()))
            .count()
    }

    /// Soft-disconnects every connection.
    pub fn disconnect_all(&self, reason: DisconnectReason) {
        for client in self.connected.values() {
            client.disconnect(reason.clone());
        }
    }

    // -- Ban map ----------------------------------------------------------

    pub fn bans(&self) -> &BanMap {
        &self.bans
    }

    pub fn is_banned(&self, addr: IpAddr) -> bool {
        self.bans.contains_key(&addr)
    }

    /// Adds a ban entry and persists the map.
    pub fn insert_ban(&mut self, addr: IpAddr, username: &str) {
        self.bans.insert(addr, username.to_string());
        save_bans(self.store.as_ref(), &self.bans);
    }

    /// Removes every entry banned under `username`. The map is persisted
    /// once if anything was removed. Returns the number removed.
    pub fn pardon(&mut self, username: &str) -> usize {
        let before = self.bans.len();
        self.bans.retain(|_, name| name != username);
        let removed = before - self.bans.len();
        if removed > 0 {
            save_bans(self.store.as_ref(), &self.bans);
        }
        removed
    }

    // -- Bulk -------------------------------------------------------------

    /// Zeroes wealth and pawn count on every saved record, persisting each.
    pub fn wipe_progress(&mut self) -> usize {
        for record in self.saved.values_mut() {
            record.wealth = 0.0;
            record.pawn_count = 0;
            save_client(self.store.as_ref(), record);
        }
        self.saved.len()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("saved", &self.saved.len())
            .field("connected", &self.connected.len())
            .field("bans", &self.bans.len())
            .finish()
    }
}

fn save_client(store: &dyn Persistence, record: &ClientRecord) {
    if let Err(e) = store.save_user_data(record) {
        tracing::error!(username = %record.username, error = %e, "failed to save client");
    }
}

fn save_bans(store: &dyn Persistence, bans: &BanMap) {
    if let Err(e) = store.save_banned_addresses(bans) {
        tracing::error!(error = %e, "failed to save ban map");
    }
}

/// Usernames double as file names and wire fields.
fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username != "."
        && username != ".."
        && !username
            .chars()
            .any(|c| c.is_control() || matches!(c, '/' | '\\' | '│' | '┼' | ':'))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use tokio::sync::mpsc;

    // -- Helpers ----------------------------------------------------------

    fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last], 5000))
    }

    fn open() -> AdmissionPolicy<'static> {
        AdmissionPolicy {
            max_players: 8,
            whitelist: None,
        }
    }

    fn registry() -> (SessionRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SessionRegistry::new(store.clone()), store)
    }

    fn sender() -> PeerSender {
        mpsc::unbounded_channel().0
    }

    // =====================================================================
    // admit()
    // =====================================================================

    #[test]
    fn test_admit_new_user_registers_and_persists() {
        let (mut reg, store) = registry();

        let admission = reg.admit("Bob", "pw", addr(1), sender(), open()).unwrap();

        assert!(admission.registered);
        assert!(reg.is_connected("Bob"));
        assert_eq!(reg.saved("Bob").unwrap().credential, "pw");
        assert_eq!(store.user_saves(), 1);
    }

    #[test]
    fn test_admit_known_user_wrong_credential_rejected() {
        let (mut reg, _) = registry();
        let admission = reg.admit("Bob", "pw", addr(1), sender(), open()).unwrap();
        reg.release("Bob", admission.generation);

        let result = reg.admit("Bob", "nope", addr(1), sender(), open());

        assert!(matches!(result, Err(SessionError::InvalidCredentials(_))));
        assert!(!reg.is_connected("Bob"));
    }

    #[test]
    fn test_admit_duplicate_login_rejected() {
        let (mut reg, _) = registry();
        reg.admit("Bob", "pw", addr(1), sender(), open()).unwrap();

        let result = reg.admit("Bob", "pw", addr(2), sender(), open());

        assert!(matches!(result, Err(SessionError::AlreadyConnected(_))));
    }

    #[test]
    fn test_admit_banned_address_rejected() {
        let (mut reg, _) = registry();
        reg.insert_ban(addr(9).ip(), "Mallory");

        let result = reg.admit("Someone", "pw", addr(9), sender(), open());

        assert!(matches!(result, Err(SessionError::Banned(_))));
        assert!(reg.saved("Someone").is_none());
    }

    #[test]
    fn test_admit_whitelist_enforced() {
        let (mut reg, _) = registry();
        let list = vec!["Alice".to_string()];
        let policy = AdmissionPolicy {
            max_players: 8,
            whitelist: Some(list.as_slice()),
        };

        assert!(matches!(
            reg.admit("Bob", "pw", addr(1), sender(), policy),
            Err(SessionError::NotWhitelisted(_))
        ));
        assert!(reg.admit("Alice", "pw", addr(2), sender(), policy).is_ok());
    }

    #[test]
    fn test_admit_full_server_rejected() {
        let (mut reg, _) = registry();
        let policy = AdmissionPolicy {
            max_players: 1,
            whitelist: None,
        };
        reg.admit("A", "pw", addr(1), sender(), policy).unwrap();

        let result = reg.admit("B", "pw", addr(2), sender(), policy);

        assert!(matches!(result, Err(SessionError::Full)));
        assert_eq!(result.unwrap_err().disconnect_reason(), DisconnectReason::Full);
    }

    #[test]
    fn test_admit_invalid_username_rejected() {
        let (mut reg, _) = registry();
        for name in ["", "..", "a/b", "x│y"] {
            assert!(matches!(
                reg.admit(name, "pw", addr(1), sender(), open()),
                Err(SessionError::InvalidUsername(_))
            ));
        }
    }

    // =====================================================================
    // release()
    // =====================================================================

    #[test]
    fn test_release_stale_generation_is_ignored() {
        let (mut reg, _) = registry();
        let first = reg.admit("Bob", "pw", addr(1), sender(), open()).unwrap();
        reg.release("Bob", first.generation);
        let second = reg.admit("Bob", "pw", addr(1), sender(), open()).unwrap();

        assert!(!reg.release("Bob", first.generation));
        assert!(reg.is_connected("Bob"));
        assert!(reg.release("Bob", second.generation));
    }

    // =====================================================================
    // Ban map
    // =====================================================================

    #[test]
    fn test_pardon_removes_every_matching_entry() {
        let (mut reg, store) = registry();
        reg.insert_ban(addr(1).ip(), "Bob");
        reg.insert_ban(addr(2).ip(), "Bob");
        reg.insert_ban(addr(3).ip(), "Eve");

        assert_eq!(reg.pardon("Bob"), 2);
        assert_eq!(reg.bans().len(), 1);
        assert_eq!(store.ban_saves(), 4);
    }

    #[test]
    fn test_pardon_unknown_name_does_not_persist() {
        let (mut reg, store) = registry();
        assert_eq!(reg.pardon("Nobody"), 0);
        assert_eq!(store.ban_saves(), 0);
    }

    // =====================================================================
    // Other
    // =====================================================================

    #[test]
    fn test_update_unknown_user_not_found() {
        let (mut reg, store) = registry();
        let result = reg.update("Ghost", |c| c.is_admin = true);
        assert!(matches!(result, Err(SessionError::PlayerNotFound(_))));
        assert_eq!(store.user_saves(), 0);
    }

    #[test]
    fn test_wipe_progress_zeroes_and_persists_each() {
        let store = Arc::new(
            MemoryStore::new()
                .with_client(ClientRecord {
                    wealth: 5000.0,
                    pawn_count: 4,
                    ..ClientRecord::new("A", "")
                })
                .with_client(ClientRecord::new("B", "")),
        );
        let mut reg = SessionRegistry::load(store.clone()).unwrap();

        assert_eq!(reg.wipe_progress(), 2);

        assert_eq!(store.user_saves(), 2);
        let a = store.client("A").unwrap();
        assert_eq!((a.wealth, a.pawn_count), (0.0, 0));
    }

    #[test]
    fn test_disconnect_sets_flag_and_queues_notice() {
        let (mut reg, _) = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let admission = reg.admit("Bob", "pw", addr(1), tx, open()).unwrap();

        reg.connected("Bob").unwrap().disconnect(DisconnectReason::Kicked);

        assert!(reg.connected("Bob").unwrap().is_disconnecting());
        assert_eq!(*admission.cancel.borrow(), Some(DisconnectReason::Kicked));
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerRecord::Disconnect(DisconnectReason::Kicked)
        );
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let (mut reg, _) = registry();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        reg.admit("A", "", addr(1), tx_a, open()).unwrap();
        reg.admit("B", "", addr(2), tx_b, open()).unwrap();

        let sent = reg.broadcast(&ServerRecord::Pong, Some("A"));

        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), ServerRecord::Pong);
    }
}
