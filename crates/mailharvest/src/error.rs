//! Mailbox synchronization error types.

use thiserror::Error;

/// Errors that can occur while synchronizing a mailbox.
///
/// Every boundary operation returns a typed result instead of swallowing
/// failures, so callers can tell "no data because the mailbox is empty"
/// apart from "no data because the server misbehaved". A routing miss
/// (no business key, or criteria not matched) is deliberately *not* an
/// error; it is expressed through `Option`/`bool` returns.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Failed to reach the IMAP server, or the session is not connected.
    #[error("IMAP connection failed: {0}")]
    ConnectionFailed(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Login was rejected by the server.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested mailbox folder does not exist.
    #[error("IMAP folder '{0}' not found")]
    FolderNotFound(String),

    /// A protocol command (search/fetch/store/expunge/list) failed.
    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    /// Charset detection or MIME parsing failed for one message.
    #[error("Failed to decode message: {0}")]
    Decode(String),

    /// A network command exceeded the configured deadline.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invalid or missing configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Metadata store error.
    #[error("Metadata store error: {0}")]
    Store(String),
}

impl From<async_native_tls::Error> for SyncError {
    fn from(err: async_native_tls::Error) -> Self {
        SyncError::Tls(err.to_string())
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

/// Result type for mailbox operations.
pub type Result<T> = std::result::Result<T, SyncError>;
