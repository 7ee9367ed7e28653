//! Error types for the notification server.

use crate::storage::StorageError;
use crate::subscriptions::ChannelError;
use std::time::Duration;
use thiserror::Error;

/// Main error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The call carried no connection identity.
    #[error("unknown client")]
    UnknownClient,

    /// The identity has no entry in the connection registry.
    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(String),

    /// A required request field was missing or malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A storage lookup exceeded its time bound.
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    /// Error reported by the storage engine, passed through unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Subscription channel could not be listened to.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Invalid or unreadable server configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure spawning a worker or reading a config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Status code reported to the transport, modelled on gRPC codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Code {
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    DeadlineExceeded,
    Unavailable,
    Cancelled,
    Internal,
}

impl ServerError {
    /// Status code the transport should surface for this error.
    pub fn code(&self) -> Code {
        match self {
            ServerError::UnknownClient | ServerError::UnknownSubscriber(_) => {
                Code::FailedPrecondition
            }
            ServerError::InvalidRequest(_) => Code::InvalidArgument,
            ServerError::Timeout(_) => Code::DeadlineExceeded,
            ServerError::Storage(err) => match err {
                StorageError::NotFound(_) => Code::NotFound,
                StorageError::Transient(_) => Code::Unavailable,
                StorageError::Cancelled => Code::Cancelled,
                StorageError::Fatal(_) => Code::Internal,
            },
            ServerError::Channel(_) => Code::FailedPrecondition,
            ServerError::Config(_) | ServerError::Io(_) => Code::Internal,
        }
    }

    /// True if a storage lookup found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServerError::Storage(StorageError::NotFound(_)))
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        ServerError::Config(e.to_string())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
