use chrono::{DateTime, Utc};
use teloxide::utils::html::escape;
use tracing::{debug, warn};

use crate::minecraft::{LookupResponse, ServerAddress, StatusLookup};

/// One poll result. Built fresh every tick and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    pub reachable: bool,
    pub players_online: i64,
    pub players_max: i64,
    /// Sampled player names in the order the server sent them. Empty when
    /// nobody is on or the server sent no sample.
    pub player_names: Vec<String>,
    pub queried_at: DateTime<Utc>,
}

impl ServerStatus {
    pub fn offline(queried_at: DateTime<Utc>) -> Self {
        Self {
            reachable: false,
            players_online: 0,
            players_max: 0,
            player_names: Vec::new(),
            queried_at,
        }
    }

    fn from_lookup(response: LookupResponse, queried_at: DateTime<Utc>) -> Self {
        if !response.online {
            return Self::offline(queried_at);
        }
        let player_names = response
            .players
            .sample
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.name)
            .collect();
        Self {
            reachable: true,
            players_online: response.players.online,
            players_max: response.players.max,
            player_names,
            queried_at,
        }
    }
}

/// Query the server. Lookup failures are logged and reported as offline.
pub async fn probe(lookup: &dyn StatusLookup, address: &ServerAddress) -> ServerStatus {
    match lookup.lookup(address).await {
        Ok(response) => {
            if let Some(version) = &response.version {
                debug!("{} is running {}", address, version.name);
            }
            let status = ServerStatus::from_lookup(response, Utc::now());
            debug!(
                "Probe {}: {}/{} players",
                address, status.players_online, status.players_max
            );
            status
        }
        Err(e) => {
            warn!("Could not connect to the Minecraft server {}: {:#}", address, e);
            ServerStatus::offline(Utc::now())
        }
    }
}

/// Render the status as Telegram HTML.
pub fn format_status(status: &ServerStatus, address: &ServerAddress) -> String {
    let mut lines = vec![
        "<b>Minecraft Server Status</b>".to_string(),
        format!("IP: <code>{}</code>", escape(&address.to_string())),
    ];

    if status.reachable {
        lines.push("🟢 <b>Online</b>".to_string());
        lines.push(format!(
            "<b>Players Online: {}/{}</b>",
            status.players_online, status.players_max
        ));
        if status.player_names.is_empty() {
            lines.push("<b>Players:</b> No one is online".to_string());
        } else {
            let names: Vec<String> = status.player_names.iter().map(|n| escape(n)).collect();
            lines.push(format!("<b>Players:</b> {}", names.join(", ")));
        }
    } else {
        lines.push("🔴 <b>Offline</b>".to_string());
        lines.push("<i>Could not retrieve server details.</i>".to_string());
    }

    lines.push(format!(
        "<i>Last updated (UTC): {}</i>",
        status.queried_at.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.join("\n")
}
