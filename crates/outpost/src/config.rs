//! Server configuration, read from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::OutpostError;

/// Everything the server reads from its config file.
///
/// Missing keys take their default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,
    pub server_name: String,
    pub server_description: String,
    pub max_players: usize,
    /// Root directory of the JSON store.
    pub data_dir: PathBuf,
    /// Relay peer chat to other peers.
    pub using_chat: bool,
    pub using_whitelist: bool,
    pub whitelist: Vec<String>,
    pub mods: Vec<String>,
    pub whitelisted_mods: Vec<String>,
    /// Soft-disconnect clients silent for this long. `0` disables the sweep.
    pub idle_timeout_secs: u64,
    pub health_interval_secs: u64,
    /// How long a new connection has to send `Connect│…`.
    pub handshake_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:25555".to_string(),
            server_name: "Outpost Server".to_string(),
            server_description: String::new(),
            max_players: 20,
            data_dir: PathBuf::from("data"),
            using_chat: true,
            using_whitelist: false,
            whitelist: Vec::new(),
            mods: Vec::new(),
            whitelisted_mods: Vec::new(),
            idle_timeout_secs: 120,
            health_interval_secs: 10,
            handshake_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Parses a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, OutpostError> {
        toml::from_str(text).map_err(|source| OutpostError::Config {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Reads a config file.
    pub fn load(path: &Path) -> Result<Self, OutpostError> {
        let text = std::fs::read_to_string(path).map_err(|source| OutpostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| OutpostError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Takes the player whitelist and both mod lists from `fresh`.
    ///
    /// Everything else is fixed for the lifetime of the server.
    pub fn reload_lists(&mut self, fresh: ServerConfig) {
        self.using_whitelist = fresh.using_whitelist;
        self.whitelist = fresh.whitelist;
        self.mods = fresh.mods;
        self.whitelisted_mods = fresh.whitelisted_mods;
    }

    /// The whitelist, when it is enforced.
    pub fn active_whitelist(&self) -> Option<&[String]> {
        self.using_whitelist.then_some(self.whitelist.as_slice())
    }
}
