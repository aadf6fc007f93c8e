//! Scripted in-memory mailbox and message fixtures for integration
//! tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mailharvest::{MailService, MessageFlag, Result, SyncError};

/// In-memory mailbox that mimics IMAP UID search semantics, including
/// the server quirk that `UID n:*` always matches the newest message
/// even when `n` is past the end.
#[derive(Debug, Default)]
pub struct FakeMail {
    pub messages: BTreeMap<u32, Vec<u8>>,
    pub flagged: Vec<(u32, MessageFlag)>,
    pub deleted: Vec<u32>,
}

impl FakeMail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, uid: u32, raw: impl Into<Vec<u8>>) -> Self {
        self.messages.insert(uid, raw.into());
        self
    }
}

#[async_trait]
impl MailService for FakeMail {
    async fn search_uids(&mut self, criteria: &str) -> Result<Vec<u32>> {
        if criteria == "ALL" {
            return Ok(self.messages.keys().copied().collect());
        }

        if let Some(range) = criteria.strip_prefix("UID ") {
            if let Some(start) = range.strip_suffix(":*") {
                let start: u32 = start
                    .parse()
                    .map_err(|_| SyncError::Protocol(format!("bad criteria: {}", criteria)))?;
                let mut uids: Vec<u32> = self
                    .messages
                    .keys()
                    .copied()
                    .filter(|&uid| uid >= start)
                    .collect();
                if uids.is_empty() {
                    if let Some(&newest) = self.messages.keys().next_back() {
                        uids.push(newest);
                    }
                }
                return Ok(uids);
            }
        }

        Err(SyncError::Protocol(format!(
            "unsupported criteria: {}",
            criteria
        )))
    }

    async fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>> {
        self.messages
            .get(&uid)
            .cloned()
            .ok_or_else(|| SyncError::Protocol(format!("no message with UID {}", uid)))
    }

    async fn set_flag(&mut self, uid: u32, flag: MessageFlag) -> Result<()> {
        self.flagged.push((uid, flag));
        Ok(())
    }

    async fn delete(&mut self, uid: u32) -> Result<()> {
        self.messages.remove(&uid);
        self.deleted.push(uid);
        Ok(())
    }

    async fn list_folders(&mut self) -> Result<Vec<String>> {
        Ok(vec!["INBOX".to_string()])
    }
}

/// Builds a multipart message with an HTML body and one base64 PDF
/// attachment per name.
pub fn invoice_message(from: &str, subject: &str, pdf_names: &[&str]) -> Vec<u8> {
    let mut raw = String::new();
    raw.push_str(&format!("From: {}\r\n", from));
    raw.push_str(&format!("Subject: {}\r\n", subject));
    raw.push_str("MIME-Version: 1.0\r\n");
    raw.push_str("Content-Type: multipart/mixed; boundary=\"frontier\"\r\n");
    raw.push_str("\r\n");
    raw.push_str("--frontier\r\n");
    raw.push_str("Content-Type: text/html; charset=utf-8\r\n");
    raw.push_str("\r\n");
    raw.push_str("<html><body><p>Invoice attached.</p></body></html>\r\n");
    for name in pdf_names {
        raw.push_str("--frontier\r\n");
        raw.push_str(&format!(
            "Content-Type: application/pdf; name=\"{}\"\r\n",
            name
        ));
        raw.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n",
            name
        ));
        raw.push_str("Content-Transfer-Encoding: base64\r\n");
        raw.push_str("\r\n");
        raw.push_str("JVBERi0xLjQK\r\n");
    }
    raw.push_str("--frontier--\r\n");
    raw.into_bytes()
}

/// Builds a single-part text message without attachments.
pub fn plain_message(from: &str, subject: &str, body: &str) -> Vec<u8> {
    let mut raw = String::new();
    raw.push_str(&format!("From: {}\r\n", from));
    raw.push_str(&format!("Subject: {}\r\n", subject));
    raw.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    raw.push_str("\r\n");
    raw.push_str(body);
    raw.push_str("\r\n");
    raw.into_bytes()
}
