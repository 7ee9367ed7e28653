//! Request and response shapes exchanged with remote clients.
//!
//! These mirror the `MetadataService` protocol messages. The transport owns
//! their framing; this crate only builds and consumes them.

use crate::types::{self, SortOrder as DomainOrder};
use serde::{Deserialize, Serialize};

/// Acknowledgement text returned by unary calls without a payload.
pub const SUCCESS_MESSAGE: &str = "success";

/// Protocol sort order. Values other than `DESC` are treated as ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum SortOrder {
    Asc = 0,
    Desc = 1,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
    /// Raw enum value, see [`SortOrder`].
    pub order: i32,
}

impl Page {
    pub fn new(limit: u64, offset: u64, order: SortOrder) -> Self {
        Self {
            limit,
            offset,
            order: order as i32,
        }
    }
}

impl From<Option<&Page>> for types::Page {
    fn from(req: Option<&Page>) -> Self {
        let Some(req) = req else {
            return types::Page::default();
        };
        let order = if req.order == SortOrder::Desc as i32 {
            DomainOrder::Desc
        } else {
            DomainOrder::Asc
        };
        types::Page::new(req.limit, req.offset, order)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: u64,
    pub address: String,
    pub signatures: Vec<String>,
    pub topics: Vec<String>,
    /// JSON text of the metadata document.
    pub payload: String,
    pub created_at: i64,
}

impl From<types::Metadata> for Metadata {
    fn from(m: types::Metadata) -> Self {
        Self {
            id: m.id,
            address: m.address,
            signatures: m.signatures,
            topics: m.topics,
            payload: m.payload.to_string(),
            created_at: m.created_at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMetadataResponse {
    pub metadata: Vec<Metadata>,
}

impl From<Vec<types::Metadata>> for ListMetadataResponse {
    fn from(records: Vec<types::Metadata>) -> Self {
        Self {
            metadata: records.into_iter().map(Metadata::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn success() -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub id: String,
}

/// Request keyed by the caller's connection identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRequest {
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetadataRequest {
    pub address: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetadataRequest {
    pub page: Option<Page>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetadataByMethodSignatureRequest {
    pub signature: String,
    pub page: Option<Page>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetadataByTopicRequest {
    pub topic: String,
    pub page: Option<Page>,
}
