//! Core types shared by the registry, the storage contract and the handlers.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of random bytes in a connection identity.
pub const CLIENT_ID_BYTES: usize = 32;

/// Opaque identity of one transport connection.
///
/// Rendered as lowercase hex. The empty id is the degraded identity handed
/// out when the random source fails.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ClientId(String);

impl ClientId {
    /// Mint a fresh identity from the thread-local RNG.
    pub fn generate() -> Result<Self, rand::Error> {
        let mut bytes = [0u8; CLIENT_ID_BYTES];
        rand::thread_rng().try_fill_bytes(&mut bytes)?;
        Ok(ClientId(hex::encode(bytes)))
    }

    /// Wrap an identity received from a client request.
    pub fn new(id: impl Into<String>) -> Self {
        ClientId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Ids can come from clients, so cut on a char boundary.
        match self.0.char_indices().nth(8) {
            Some((end, _)) => write!(f, "ClientId({}...)", &self.0[..end]),
            None => write!(f, "ClientId({})", self.0),
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seconds since Unix epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// An indexed contract metadata record, as produced by the storage layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Storage key. Listings are ordered by it.
    pub id: u64,
    /// Contract address.
    pub address: String,
    /// Method signatures declared by the contract ABI.
    pub signatures: Vec<String>,
    /// Event topics declared by the contract ABI.
    pub topics: Vec<String>,
    /// Raw metadata document.
    pub payload: serde_json::Value,
    /// Unix seconds.
    pub created_at: i64,
}

impl Metadata {
    pub fn new(id: u64, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            signatures: Vec::new(),
            topics: Vec::new(),
            payload: serde_json::Value::Null,
            created_at: unix_now(),
        }
    }

    pub fn with_signatures(mut self, signatures: Vec<String>) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Sort direction for paginated listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Pagination parameters of one listing call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
    pub order: SortOrder,
}

impl Page {
    pub fn new(limit: u64, offset: u64, order: SortOrder) -> Self {
        Self {
            limit,
            offset,
            order,
        }
    }
}
