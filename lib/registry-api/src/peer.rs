use chrono::{DateTime, NaiveDateTime, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A WireGuard client as reported by `GET /wireguard_user_status`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Config name, unique within the registry. Empty when the gateway knows
    /// the key but has no config for it.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Public key, the durable identity of the peer
    pub pub_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Comma separated CIDR list, as `wg show` prints it
    #[serde(default, deserialize_with = "null_as_default")]
    pub allowed_ips: String,

    /// Unix seconds of the last handshake, 0 when there never was one
    #[serde(default, deserialize_with = "null_as_default")]
    pub latest_handshake: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub rx: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tx: u64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub keepalive: u64,

    /// Human readable age of the last handshake ("never" if none)
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_seen: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub is_online: bool,

    /// Timestamp of the last handshake, empty when there never was one
    #[serde(default, deserialize_with = "null_as_default")]
    pub latest_handshake_dt: String,

    /// Not-removable flag
    #[serde(default, deserialize_with = "null_as_default")]
    pub used: bool,
}

/// Body of the peer status endpoints
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PeerStatusList {
    #[serde(default)]
    pub clients: Vec<Peer>,
}

/// Deletion protection state of a peer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protection {
    Unprotected,
    Protected,
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protection::Unprotected => write!(f, "unprotected"),
            Protection::Protected => write!(f, "protected"),
        }
    }
}

impl Peer {
    pub fn protection(&self) -> Protection {
        if self.used {
            Protection::Protected
        } else {
            Protection::Unprotected
        }
    }

    /// Parse `allowed_ips` into networks. Malformed items are dropped.
    pub fn allowed_networks(&self) -> Vec<IpNetwork> {
        self.allowed_ips
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    /// Time of the last successful handshake.
    ///
    /// `latest_handshake_dt` wins when it parses; the unix counter is the
    /// fallback. Neither present means the peer never completed one.
    pub fn handshake_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.latest_handshake_dt).or_else(|| {
            if self.latest_handshake > 0 {
                DateTime::from_timestamp(self.latest_handshake, 0)
            } else {
                None
            }
        })
    }

    /// Label used in prompts and logs
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.pub_key
        } else {
            &self.name
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
