//! Last-seen-UID watermark tracking.

use log::{debug, info};

use crate::error::{Result, SyncError};
use crate::session::MailService;

/// Tracks the last message UID considered processed.
///
/// The tracker only ever *computes* the delta of unseen UIDs; advancing
/// the watermark is the caller's decision, taken after each message has
/// been durably consumed downstream. A partial pipeline failure must not
/// silently skip messages.
#[derive(Debug, Default)]
pub struct WatermarkTracker {
    watermark: Option<u32>,
}

impl WatermarkTracker {
    /// Creates an uninitialized tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries all message UIDs and positions the watermark `1 + offset`
    /// below the highest one, so the next sync picks up the most recent
    /// `1 + offset` messages. An operator uses `offset` to rewind for
    /// backfill.
    ///
    /// With an empty mailbox the watermark stays unset.
    pub async fn initialize<S>(&mut self, session: &mut S, offset: u32) -> Result<Option<u32>>
    where
        S: MailService,
    {
        let uids = session.search_uids("ALL").await?;

        match uids.iter().max() {
            Some(&max) => {
                let watermark = rewound(max, offset);
                self.watermark = Some(watermark);
                info!("Initialized watermark: {}", watermark);
                Ok(Some(watermark))
            }
            None => {
                self.watermark = None;
                info!("No messages found; watermark left unset");
                Ok(None)
            }
        }
    }

    /// Lists the UIDs strictly greater than the watermark, ascending,
    /// without duplicates.
    ///
    /// The server is asked for `UID n+1:*`, but the result is re-filtered
    /// client-side: `n:*` always includes the newest message even when
    /// nothing is new, and some servers compare UID ranges lexically.
    pub async fn list_new<S>(&self, session: &mut S) -> Result<Vec<u32>>
    where
        S: MailService,
    {
        let watermark = self.require_initialized()?;

        let criteria = format!("UID {}:*", watermark.saturating_add(1));
        debug!("Searching for new messages with criteria: {}", criteria);
        let raw = session.search_uids(&criteria).await?;

        Ok(filter_new(watermark, raw))
    }

    /// Advances the watermark to `uid` if that moves it forward.
    /// The watermark never regresses after initialization.
    pub fn advance(&mut self, uid: u32) {
        self.watermark = Some(match self.watermark {
            Some(current) => current.max(uid),
            None => uid,
        });
    }

    /// The current watermark, if initialized.
    pub fn current(&self) -> Option<u32> {
        self.watermark
    }

    fn require_initialized(&self) -> Result<u32> {
        self.watermark.ok_or_else(|| {
            SyncError::Config("watermark not initialized; call initialize first".to_string())
        })
    }
}

/// Positions the watermark below `max` by `1 + offset`, clamped at zero.
fn rewound(max: u32, offset: u32) -> u32 {
    max.saturating_sub(1).saturating_sub(offset)
}

/// Keeps only UIDs strictly greater than the watermark, sorted ascending
/// and deduplicated.
fn filter_new(watermark: u32, raw: Vec<u32>) -> Vec<u32> {
    let mut fresh: Vec<u32> = raw.into_iter().filter(|&uid| uid > watermark).collect();
    fresh.sort_unstable();
    fresh.dedup();
    fresh
}
