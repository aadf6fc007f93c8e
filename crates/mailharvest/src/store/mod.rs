//! Metadata cache: a slim per-message projection in a key-value store.
//!
//! The projection (`business`, `subject`) allows fast lookup without
//! re-fetching full messages. The backing store is a trait seam; an
//! in-memory and a SQLite implementation are provided.

pub mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::decode::MessageDecoder;
use crate::error::{Result, SyncError};
use crate::routing::extract_business;
use crate::session::MailService;

pub use sqlite::SqliteStore;

/// Slim per-message projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Business key derived from the sender, when one exists.
    pub business: Option<String>,
    /// Decoded subject.
    pub subject: String,
}

/// Key-value store for message metadata, keyed by UID.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put(&self, uid: u32, meta: MessageMeta) -> Result<()>;
    async fn get(&self, uid: u32) -> Result<Option<MessageMeta>>;
}

/// In-memory store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<u32, MessageMeta>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn put(&self, uid: u32, meta: MessageMeta) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| SyncError::Store("lock poisoned".to_string()))?;
        records.insert(uid, meta);
        Ok(())
    }

    async fn get(&self, uid: u32) -> Result<Option<MessageMeta>> {
        let records = self
            .records
            .lock()
            .map_err(|_| SyncError::Store("lock poisoned".to_string()))?;
        Ok(records.get(&uid).cloned())
    }
}

/// Summary of one batch write.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// UIDs successfully written.
    pub written: usize,
    /// UIDs that failed to fetch, decode or store.
    pub failed: Vec<u32>,
}

/// Writes the metadata projection for batches of UIDs.
pub struct MetadataWriter<'a, S: MetadataStore> {
    store: &'a S,
    decoder: MessageDecoder,
}

impl<'a, S: MetadataStore> MetadataWriter<'a, S> {
    /// Creates a writer with the default decoder.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            decoder: MessageDecoder::new(),
        }
    }

    /// Creates a writer with a custom decoder.
    pub fn with_decoder(store: &'a S, decoder: MessageDecoder) -> Self {
        Self { store, decoder }
    }

    /// Fetches each UID and writes `{business, subject}`.
    ///
    /// Only the light envelope path runs; body parts and attachments
    /// are never decoded. Per-UID failures are logged and collected,
    /// and the batch always continues.
    pub async fn write_batch<M>(&self, session: &mut M, uids: &[u32]) -> WriteReport
    where
        M: MailService,
    {
        let mut report = WriteReport::default();
        for &uid in uids {
            match self.write_one(session, uid).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    error!("Failed to cache metadata for UID {}: {}", uid, e);
                    report.failed.push(uid);
                }
            }
        }
        report
    }

    async fn write_one<M>(&self, session: &mut M, uid: u32) -> Result<()>
    where
        M: MailService,
    {
        let raw = session.fetch_raw(uid).await?;
        let envelope = self.decoder.decode_envelope(&raw)?;
        let business = extract_business(&envelope.sender);

        debug!("Caching metadata for UID {}", uid);
        self.store
            .put(
                uid,
                MessageMeta {
                    business,
                    subject: envelope.subject,
                },
            )
            .await
    }
}
