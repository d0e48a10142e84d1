use serde::{Deserialize, Serialize};

/// A single IPv4 address permitted to reach the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListEntry {
    /// Server-assigned identifier, never reused
    pub id: i64,
    /// Dotted-quad IPv4 address
    pub ip_addr: String,
}

/// Body item of `POST /whitelist`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAllowListEntry {
    pub ip_addr: String,
}

impl NewAllowListEntry {
    pub fn new(ip_addr: impl Into<String>) -> Self {
        Self {
            ip_addr: ip_addr.into(),
        }
    }
}

/// Result item of a create or import call.
///
/// The backend answers a rejected insert (duplicate address) with a null `id`
/// instead of failing the whole batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub ip_addr: Option<String>,
}

impl CreatedEntry {
    /// Convert into a stored entry, if the backend assigned an id
    pub fn into_entry(self) -> Option<AllowListEntry> {
        match (self.id, self.ip_addr) {
            (Some(id), Some(ip_addr)) => Some(AllowListEntry { id, ip_addr }),
            _ => None,
        }
    }
}

/// Envelope returned by `POST /whitelist` and `POST /whitelist_file`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreatedItems {
    #[serde(default)]
    pub items: Vec<CreatedEntry>,
}

/// Body of `GET /whitelist`.
///
/// Current backends wrap the rows in `{"data": [...]}`, older ones return the
/// bare array.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowListPayload {
    Wrapped { data: Vec<AllowListEntry> },
    Bare(Vec<AllowListEntry>),
}

impl AllowListPayload {
    pub fn into_entries(self) -> Vec<AllowListEntry> {
        match self {
            AllowListPayload::Wrapped { data } => data,
            AllowListPayload::Bare(data) => data,
        }
    }
}

/// Optional filters for `GET /whitelist`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListQuery {
    /// Case-insensitive substring match on the address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_addr: Option<String>,

    /// Exact id match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl AllowListQuery {
    pub fn is_empty(&self) -> bool {
        self.ip_addr.is_none() && self.id.is_none()
    }

    /// Apply the filters locally, with the same semantics the backend uses
    pub fn matches(&self, entry: &AllowListEntry) -> bool {
        if let Some(id) = self.id {
            if entry.id != id {
                return false;
            }
        }
        match &self.ip_addr {
            Some(needle) => entry
                .ip_addr
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// Body of `DELETE /whitelist/{id}`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeleteStatus {
    #[serde(default)]
    pub status: String,
}

impl DeleteStatus {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}
