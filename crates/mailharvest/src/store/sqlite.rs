//! SQLite-backed metadata store.
//!
//! Wraps a single rusqlite connection behind a mutex. All access is
//! serialized, which is fine for SQLite (which serializes writes
//! anyway). WAL mode is enabled for concurrent read performance.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};

use super::{MessageMeta, MetadataStore};
use crate::error::{Result, SyncError};

/// Thread-safe metadata store over one SQLite connection.
///
/// Cloning is cheap (inner `Arc`).
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Store(e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        init_schema(&conn)?;

        info!("Metadata store opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store for testing.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SyncError::Store("lock poisoned".to_string()))?;
        f(&conn)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS message_meta (
            uid INTEGER PRIMARY KEY,
            business TEXT,
            subject TEXT NOT NULL
        );",
    )?;
    Ok(())
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn put(&self, uid: u32, meta: MessageMeta) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO message_meta (uid, business, subject)
                 VALUES (?1, ?2, ?3)",
                params![uid, meta.business, meta.subject],
            )?;
            Ok(())
        })
    }

    async fn get(&self, uid: u32) -> Result<Option<MessageMeta>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT business, subject FROM message_meta WHERE uid = ?1",
                    params![uid],
                    |row| {
                        Ok(MessageMeta {
                            business: row.get(0)?,
                            subject: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}
