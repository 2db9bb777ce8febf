//! Crate-wide error type and result alias

use thiserror::Error;

/// Error types for certwatch operations
#[derive(Debug, Error)]
pub enum CertwatchError {
    /// Rejected configuration or command input (user-visible, no mutation)
    #[error("invalid input: {0}")]
    Validation(String),

    /// Remove of an absent name or a ledger token miss (user-visible, no mutation)
    #[error("not registered: {0}")]
    NotFound(String),

    /// Register rejected: an entry with the same key already exists
    #[error("already registered: {0}")]
    DuplicateKey(String),

    /// Register rejected: watchlist is at its configured bound
    #[error("watchlist is full ({0} entries max)")]
    CapacityExceeded(usize),

    /// Lookup or notifier transport failure (recovered as "no data this round")
    #[error("transport failure: {0}")]
    Transport(String),

    /// Callback arrived after the pending-action TTL
    #[error("action token expired")]
    ExpiredToken,

    /// Watchlist file I/O failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Watchlist file (de)serialization failure
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CertwatchError>;
