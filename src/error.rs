//! Error types for storage and editor sessions

use thiserror::Error;

use crate::session::SessionState;
use crate::site::SiteId;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// Remote store answered with a non-success status
    #[error("Remote store error ({status}): {body}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Local storage could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend misconfigured
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised by an editor session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Site does not exist in any store
    #[error("Site not found: {0}")]
    NotFound(SiteId),

    /// Command not accepted in the current state
    #[error("Cannot {action} while {state}")]
    NotReady {
        /// State the session was in
        state: SessionState,
        /// Rejected command
        action: &'static str,
    },

    /// A save or publish is already in flight
    #[error("A save is already in progress")]
    SaveInProgress,

    /// No site is loaded yet
    #[error("No site loaded")]
    NoSite,

    /// Persisting failed on every store
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
