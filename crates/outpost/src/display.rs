//! Listings printed by the console's read-only commands.

use outpost_session::SessionRegistry;

use crate::chat::ChatCache;
use crate::roster::SettlementRoster;
use crate::server::SERVER_VERSION;
use crate::{ServerConfig, ServerState};

/// Event ids accepted by `invoke` and `plague`.
pub const EVENTS: &[&str] = &[
    "Raid",
    "Infestation",
    "MechCluster",
    "ToxicFallout",
    "Manhunter",
    "FarmAnimals",
    "ShipChunk",
    "GiveQuest",
    "TraderCaravan",
];

const HELP: &[&str] = &[
    "List Of Available Commands:",
    "Help - Displays Help Menu",
    "Settings - Displays Settings Menu",
    "Reload - Reloads All Available Settings Into The Server",
    "Status - Shows A General Overview Menu",
    "Settlements - Displays Settlements Menu",
    "List - Displays Player List Menu",
    "Whitelist - Shows All Whitelisted Players",
    "Clear - Clears The Console",
    "Exit - Closes The Server",
    "",
    "Communication:",
    "Say - Send A Chat Message",
    "Broadcast - Send A Letter To Every Player Connected",
    "Notify - Send A Letter To X Player",
    "Chat - Displays Chat Menu",
    "",
    "Interaction:",
    "Invoke - Invokes An Event To X Player",
    "Plague - Invokes An Event To All Connected Players",
    "Eventlist - Shows All Available Events",
    "GiveItem - Gives An Item To X Player",
    "GiveItemAll - Gives An Item To All Players",
    "Protect - Protects A Player From Any Event Temporarily",
    "Deprotect - Disables All Protections Given To X Player",
    "Immunize - Protects A Player From Any Event Permanently",
    "Deimmunize - Disables The Immunity Of X Player",
    "",
    "Admin Control:",
    "Investigate - Displays All Data About X Player",
    "Promote - Promotes X Player To Admin",
    "Demote - Demotes X Player",
    "Adminlist - Shows All Server Admins",
    "Kick - Kicks X Player",
    "Ban - Bans X Player",
    "Pardon - Pardons X Player",
    "Banlist - Shows All Banned Players",
    "Wipe - Deletes Every Player Data In The Server",
];

pub fn help() -> Vec<String> {
    HELP.iter().map(|line| line.to_string()).collect()
}

pub fn event_list() -> Vec<String> {
    let mut lines = vec!["List Of Available Events:".to_string()];
    lines.extend(EVENTS.iter().map(|e| e.to_string()));
    lines
}

pub fn settings(config: &ServerConfig) -> Vec<String> {
    vec![
        "Server Settings:".to_string(),
        format!("Server Name: {}", config.server_name),
        format!("Server Description: {}", config.server_description),
        format!("Bind Address: {}", config.bind),
        format!("Max Players: {}", config.max_players),
        format!("Data Directory: {}", config.data_dir.display()),
        format!("Using Chat: {}", config.using_chat),
        format!("Using Whitelist: {}", config.using_whitelist),
        format!("Idle Timeout: {}s", config.idle_timeout_secs),
    ]
}

/// Version, uptime, counts and the settings that matter at a glance.
pub async fn status(state: &ServerState) -> Vec<String> {
    let config = state.config().await;
    let (connected, saved) = {
        let registry = state.registry().lock().await;
        (registry.connected_count(), registry.saved_count())
    };
    let settlements = state.roster().lock().await.len();

    let uptime = state.uptime();
    let hours = uptime.num_hours();
    let minutes = uptime.num_minutes() % 60;
    let seconds = uptime.num_seconds() % 60;

    vec![
        "Server Status".to_string(),
        format!("Version: {SERVER_VERSION}"),
        "Connection: Online".to_string(),
        format!(
            "Uptime: [{}] [{hours:02}:{minutes:02}:{seconds:02}]",
            state.started_at().format("%Y-%m-%d %H:%M:%S")
        ),
        format!("Mods: {}", config.mods.len()),
        format!("Whitelisted Mods: {}", config.whitelisted_mods.len()),
        format!("Connected Players: {connected}"),
        format!("Saved Players: {saved}"),
        format!("Saved Settlements: {settlements}"),
        format!("Whitelisted Players: {}", config.whitelist.len()),
        format!("Max Players: {}", config.max_players),
    ]
}

pub fn chat(cache: &ChatCache) -> Vec<String> {
    let mut lines = vec![format!("Server Chat: [{}]", cache.len())];
    if cache.is_empty() {
        lines.push("No Chat Messages To Display".to_string());
    }
    lines.extend(cache.lines().map(ToString::to_string));
    lines
}

/// Connected players, then every saved player.
pub fn player_list(registry: &SessionRegistry) -> Vec<String> {
    let mut lines = vec![format!("Connected Players: [{}]", registry.connected_count())];
    if registry.connected_count() == 0 {
        lines.push("No Players Connected".to_string());
    }
    lines.extend(registry.connected_clients().map(|c| c.username().to_string()));

    lines.push(String::new());
    lines.push(format!("Saved Players: [{}]", registry.saved_count()));
    if registry.saved_count() == 0 {
        lines.push("No Players Saved".to_string());
    }
    lines.extend(registry.saved_clients().map(|c| c.username.clone()));
    lines
}

pub fn settlements(roster: &SettlementRoster) -> Vec<String> {
    let mut lines = vec![format!("Server Settlements: [{}]", roster.len())];
    if roster.is_empty() {
        lines.push("No Active Settlements".to_string());
    }
    lines.extend(roster.iter().map(|(tile, owner)| format!("{tile} - {owner}")));
    lines
}

pub fn ban_list(registry: &SessionRegistry) -> Vec<String> {
    let bans = registry.bans();
    let mut lines = vec![format!("Banned Players: [{}]", bans.len())];
    if bans.is_empty() {
        lines.push("No Banned Players".to_string());
    }
    lines.extend(bans.iter().map(|(addr, name)| format!("[{name}] - [{addr}]")));
    lines
}

pub fn admin_list(registry: &SessionRegistry) -> Vec<String> {
    let admins: Vec<String> = registry
        .saved_clients()
        .filter(|c| c.is_admin)
        .map(|c| c.username.clone())
        .collect();
    let mut lines = vec![format!("Server Administrators: [{}]", admins.len())];
    if admins.is_empty() {
        lines.push("No Administrators Found".to_string());
    }
    lines.extend(admins);
    lines
}

pub fn whitelist(config: &ServerConfig) -> Vec<String> {
    let mut lines = vec![format!("Whitelisted Players: [{}]", config.whitelist.len())];
    if config.whitelist.is_empty() {
        lines.push("No Whitelisted Players Found".to_string());
    }
    lines.extend(config.whitelist.iter().cloned());
    lines
}
