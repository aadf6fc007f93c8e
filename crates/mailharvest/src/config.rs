//! Mailbox connection configuration.
//!
//! Configuration is consumed once, at session construction, from the
//! process environment. There is no runtime configuration surface.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::{Result, SyncError};

const ENV_SERVER: &str = "IMAP_SERVER";
const ENV_PORT: &str = "IMAP_PORT";
const ENV_INBOX: &str = "IMAP_INBOX";
const ENV_EMAIL: &str = "IMAP_EMAIL";
const ENV_PASSWORD: &str = "IMAP_PASSWORD";
const ENV_TIMEOUT_SECS: &str = "IMAP_TIMEOUT_SECS";

fn default_port() -> u16 {
    993
}

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Connection settings for one remote mailbox.
#[derive(Clone)]
pub struct MailboxConfig {
    /// IMAP server hostname (e.g., "imap.example.com").
    pub host: String,

    /// IMAP server port (default: 993 for IMAPS).
    pub port: u16,

    /// Folder to select after login (default: "INBOX").
    pub folder: String,

    /// Login name, typically the mailbox address.
    pub username: String,

    /// Login secret. Never logged or serialized.
    pub password: SecretString,

    /// Deadline applied to every network command.
    pub command_timeout: Duration,
}

impl MailboxConfig {
    /// Creates a configuration with default port, folder and timeout.
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            folder: default_folder(),
            username: username.into(),
            password,
            command_timeout: default_command_timeout(),
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// `IMAP_SERVER`, `IMAP_EMAIL` and `IMAP_PASSWORD` are required;
    /// `IMAP_PORT`, `IMAP_INBOX` and `IMAP_TIMEOUT_SECS` fall back to
    /// 993, "INBOX" and 60 seconds respectively.
    pub fn from_env() -> Result<Self> {
        let host = require_env(ENV_SERVER)?;
        let username = require_env(ENV_EMAIL)?;
        let password = SecretString::from(require_env(ENV_PASSWORD)?);

        let port = match std::env::var(ENV_PORT) {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| SyncError::Config(format!("invalid {}: '{}'", ENV_PORT, raw)))?,
            Err(_) => default_port(),
        };

        let folder = std::env::var(ENV_INBOX).unwrap_or_else(|_| default_folder());

        let command_timeout = match std::env::var(ENV_TIMEOUT_SECS) {
            Ok(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| {
                    SyncError::Config(format!("invalid {}: '{}'", ENV_TIMEOUT_SECS, raw))
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => default_command_timeout(),
        };

        Ok(Self {
            host,
            port,
            folder,
            username,
            password,
            command_timeout,
        })
    }
}

impl std::fmt::Debug for MailboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("folder", &self.folder)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| SyncError::Config(format!("{} not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            ENV_SERVER,
            ENV_PORT,
            ENV_INBOX,
            ENV_EMAIL,
            ENV_PASSWORD,
            ENV_TIMEOUT_SECS,
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var(ENV_SERVER, "imap.example.com");
        std::env::set_var(ENV_EMAIL, "billing@example.com");
        std::env::set_var(ENV_PASSWORD, "hunter2");

        let config = MailboxConfig::from_env().unwrap();
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.folder, "INBOX");
        assert_eq!(config.username, "billing@example.com");
        assert_eq!(config.command_timeout, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var(ENV_SERVER, "mail.internal");
        std::env::set_var(ENV_EMAIL, "in@mail.internal");
        std::env::set_var(ENV_PASSWORD, "s3cret");
        std::env::set_var(ENV_PORT, "1993");
        std::env::set_var(ENV_INBOX, "Invoices");
        std::env::set_var(ENV_TIMEOUT_SECS, "5");

        let config = MailboxConfig::from_env().unwrap();
        assert_eq!(config.port, 1993);
        assert_eq!(config.folder, "Invoices");
        assert_eq!(config.command_timeout, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_from_env_missing_server() {
        clear_env();
        std::env::set_var(ENV_EMAIL, "in@mail.internal");
        std::env::set_var(ENV_PASSWORD, "s3cret");

        let result = MailboxConfig::from_env();
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        clear_env();
        std::env::set_var(ENV_SERVER, "imap.example.com");
        std::env::set_var(ENV_EMAIL, "a@b.c");
        std::env::set_var(ENV_PASSWORD, "x");
        std::env::set_var(ENV_PORT, "not-a-port");

        let result = MailboxConfig::from_env();
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = MailboxConfig::new("h", "u", SecretString::from("topsecret"));
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("<redacted>"));
    }
}
