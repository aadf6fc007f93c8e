//! IMAP session lifecycle and protocol primitives.

use std::future::Future;
use std::time::Duration;

use async_imap::Session;
use async_native_tls::TlsConnector;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use secrecy::ExposeSecret;

use crate::config::MailboxConfig;
use crate::error::{Result, SyncError};

/// Type alias for the underlying async stream (async-std compatible TcpStream).
type AsyncTcpStream = async_io::Async<std::net::TcpStream>;

/// Type alias for the TLS stream used by the IMAP session.
type TlsStream = async_native_tls::TlsStream<AsyncTcpStream>;

/// Connectivity state of a [`MailSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No live connection. The only permitted operation is `connect`.
    Disconnected,
    /// Logged in, no folder selected yet.
    Authenticated,
    /// Logged in with the configured folder selected.
    Selected,
}

/// Server-side message flags supported by this pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFlag {
    Seen,
    Flagged,
    Deleted,
}

impl MessageFlag {
    /// The IMAP wire representation of the flag.
    pub fn as_imap(&self) -> &'static str {
        match self {
            MessageFlag::Seen => "\\Seen",
            MessageFlag::Flagged => "\\Flagged",
            MessageFlag::Deleted => "\\Deleted",
        }
    }
}

/// Protocol primitives the sync pipeline needs from a mailbox session.
///
/// [`MailSession`] is the production implementation; tests substitute a
/// scripted fake. Taking `&mut self` on every method enforces the
/// one-in-flight-command-at-a-time rule statically.
#[async_trait]
pub trait MailService: Send {
    /// Returns the UIDs matching a server-side search expression
    /// (e.g., `"ALL"` or `"UID 43:*"`). Order is unspecified.
    async fn search_uids(&mut self, criteria: &str) -> Result<Vec<u32>>;

    /// Fetches the full raw bytes of one message without marking it seen.
    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>>;

    /// Adds a flag to a message.
    async fn set_flag(&mut self, uid: u32, flag: MessageFlag) -> Result<()>;

    /// Flags a message as deleted and expunges the folder.
    async fn delete(&mut self, uid: u32) -> Result<()>;

    /// Enumerates available folders, for diagnostics.
    async fn list_folders(&mut self) -> Result<Vec<String>>;
}

/// Owned handle to one remote mailbox.
///
/// At most one live connection exists per instance. A failed `connect`
/// leaves the session [`SessionState::Disconnected`] and every protocol
/// operation failing fast with [`SyncError::ConnectionFailed`]; it never
/// takes the process down.
pub struct MailSession {
    config: MailboxConfig,
    session: Option<Session<TlsStream>>,
    state: SessionState,
}

impl MailSession {
    /// Creates a disconnected session for the given mailbox.
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            config,
            session: None,
            state: SessionState::Disconnected,
        }
    }

    /// Establishes the TLS connection, logs in and selects the
    /// configured folder.
    ///
    /// Calling this on an already-connected session is a no-op.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("Already connected to IMAP server");
            return Ok(());
        }

        let timeout = self.config.command_timeout;
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to IMAP server at {}", addr);

        let std_stream = std::net::TcpStream::connect(&addr)
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;
        std_stream
            .set_nonblocking(true)
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;
        let tcp_stream = AsyncTcpStream::new(std_stream)
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;

        let tls = TlsConnector::new();
        let tls_stream = deadline(timeout, "tls handshake", tls.connect(&self.config.host, tcp_stream))
            .await?
            .map_err(|e| SyncError::Tls(e.to_string()))?;

        let client = async_imap::Client::new(tls_stream);

        let mut session = deadline(
            timeout,
            "login",
            client.login(&self.config.username, self.config.password.expose_secret()),
        )
        .await?
        .map_err(|(e, _)| SyncError::AuthenticationFailed(e.to_string()))?;
        self.state = SessionState::Authenticated;
        info!("Authenticated to IMAP server as {}", self.config.username);

        let folder = self.config.folder.clone();
        match deadline(timeout, "select folder", session.select(&folder)).await {
            Ok(Ok(mailbox)) => {
                debug!("Folder '{}' selected ({} messages)", folder, mailbox.exists);
                self.session = Some(session);
                self.state = SessionState::Selected;
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = SessionState::Disconnected;
                let message = e.to_string();
                if message.contains("NO") || message.contains("exist") {
                    Err(SyncError::FolderNotFound(folder))
                } else {
                    Err(SyncError::Protocol(message))
                }
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Gracefully ends the session. Safe to call when already closed.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.state = SessionState::Disconnected;
        if let Some(mut session) = self.session.take() {
            info!("Disconnecting from IMAP server");
            deadline(self.config.command_timeout, "logout", session.logout())
                .await?
                .map_err(|e| SyncError::Protocol(e.to_string()))?;
        }
        Ok(())
    }

    /// Current connectivity state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a live connection exists.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The configuration this session was built with.
    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    fn live_session(&mut self) -> Result<&mut Session<TlsStream>> {
        self.session.as_mut().ok_or_else(not_connected)
    }
}

#[async_trait]
impl MailService for MailSession {
    async fn search_uids(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let timeout = self.config.command_timeout;
        let session = self.live_session()?;

        debug!("Searching with criteria: {}", criteria);
        let uids = deadline(timeout, "uid search", session.uid_search(criteria))
            .await?
            .map_err(|e| SyncError::Protocol(e.to_string()))?;
        Ok(uids.into_iter().collect())
    }

    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>> {
        let timeout = self.config.command_timeout;
        let session = self.live_session()?;

        debug!("Fetching message UID {}", uid);
        deadline(timeout, "uid fetch", async {
            let mut messages = session
                .uid_fetch(uid.to_string(), "BODY.PEEK[]")
                .await
                .map_err(|e| SyncError::Protocol(e.to_string()))?;

            let message = messages
                .next()
                .await
                .ok_or_else(|| SyncError::Protocol(format!("message with UID {} not found", uid)))?
                .map_err(|e| SyncError::Protocol(e.to_string()))?;

            message
                .body()
                .map(|b| b.to_vec())
                .ok_or_else(|| SyncError::Protocol(format!("message UID {} has no body", uid)))
        })
        .await?
    }

    async fn set_flag(&mut self, uid: u32, flag: MessageFlag) -> Result<()> {
        let timeout = self.config.command_timeout;
        let session = self.live_session()?;

        debug!("Setting flag {} on UID {}", flag.as_imap(), uid);
        deadline(timeout, "uid store", async {
            let mut responses = session
                .uid_store(uid.to_string(), format!("+FLAGS ({})", flag.as_imap()))
                .await
                .map_err(|e| SyncError::Protocol(e.to_string()))?;
            while let Some(response) = responses.next().await {
                response.map_err(|e| SyncError::Protocol(e.to_string()))?;
            }
            Ok(())
        })
        .await?
    }

    async fn delete(&mut self, uid: u32) -> Result<()> {
        self.set_flag(uid, MessageFlag::Deleted).await?;

        let timeout = self.config.command_timeout;
        let session = self.live_session()?;

        debug!("Expunging after delete of UID {}", uid);
        deadline(timeout, "expunge", async {
            let expunged = session
                .expunge()
                .await
                .map_err(|e| SyncError::Protocol(e.to_string()))?;
            futures_util::pin_mut!(expunged);
            while let Some(seq) = expunged.next().await {
                seq.map_err(|e| SyncError::Protocol(e.to_string()))?;
            }
            Ok(())
        })
        .await?
    }

    async fn list_folders(&mut self) -> Result<Vec<String>> {
        let timeout = self.config.command_timeout;
        let session = self.live_session()?;

        let names = deadline(timeout, "list folders", async {
            let mut stream = session
                .list(Some(""), Some("*"))
                .await
                .map_err(|e| SyncError::Protocol(e.to_string()))?;
            let mut names = Vec::new();
            while let Some(item) = stream.next().await {
                let name = item.map_err(|e| SyncError::Protocol(e.to_string()))?;
                names.push(name.name().to_string());
            }
            Ok::<_, SyncError>(names)
        })
        .await??;

        for name in &names {
            debug!("Mailbox folder: {}", name);
        }
        Ok(names)
    }
}

impl Drop for MailSession {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("MailSession dropped without explicit disconnect");
        }
    }
}

fn not_connected() -> SyncError {
    SyncError::ConnectionFailed("not connected".to_string())
}

/// Wraps a network command future with the configured deadline.
async fn deadline<F, T>(timeout: Duration, what: &str, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| SyncError::Timeout(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_config() -> MailboxConfig {
        MailboxConfig::new("imap.example.com", "test@example.com", SecretString::from("pw"))
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = MailSession::new(test_config());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_operations_fail_fast_when_disconnected() {
        let mut session = MailSession::new(test_config());

        let result = session.search_uids("ALL").await;
        assert!(matches!(result, Err(SyncError::ConnectionFailed(_))));

        let result = session.fetch_raw(1).await;
        assert!(matches!(result, Err(SyncError::ConnectionFailed(_))));

        let result = session.set_flag(1, MessageFlag::Flagged).await;
        assert!(matches!(result, Err(SyncError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut session = MailSession::new(test_config());
        assert!(session.disconnect().await.is_ok());
        assert!(session.disconnect().await.is_ok());
    }

    #[test]
    fn test_flag_wire_representation() {
        assert_eq!(MessageFlag::Seen.as_imap(), "\\Seen");
        assert_eq!(MessageFlag::Flagged.as_imap(), "\\Flagged");
        assert_eq!(MessageFlag::Deleted.as_imap(), "\\Deleted");
    }
}
