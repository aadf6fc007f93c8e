//! One synchronization cycle: list new UIDs, fetch, decode, emit
//! extraction records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, info_span, warn, Instrument};

use crate::decode::{Attachment, MessageDecoder};
use crate::error::Result;
use crate::routing::extract_business;
use crate::session::MailService;
use crate::watermark::WatermarkTracker;

/// The unit handed to downstream document builders: one message paired
/// with at most one attachment.
///
/// A message with N PDF attachments produces N records sharing the same
/// message context; a message with none produces exactly one record with
/// `attachment: None`.
#[derive(Debug, Clone)]
pub struct ExtractionRecord {
    /// UID of the source message.
    pub uid: u32,
    /// The `From` header.
    pub sender: String,
    /// Business key derived from the sender, when one exists.
    pub business: Option<String>,
    /// Decoded subject.
    pub subject: String,
    /// Visible body text.
    pub body_text: String,
    /// Raw message bytes, shared across this message's records.
    pub raw: Arc<[u8]>,
    /// One PDF payload, or `None` for messages without attachments.
    pub attachment: Option<Attachment>,
}

/// What happened to one UID during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidOutcome {
    /// The message produced this many records.
    Emitted(usize),
    /// Fetch failed; the message produced no records.
    FetchFailed(String),
    /// Decode failed; the message produced no records.
    DecodeFailed(String),
}

/// Result of one synchronization cycle.
///
/// `outcomes` carries one entry per UID seen, so callers can distinguish
/// "no records because nothing was new" from "no records because every
/// message failed", and decide watermark advancement per message.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub records: Vec<ExtractionRecord>,
    pub outcomes: Vec<(u32, UidOutcome)>,
    /// True when the stop flag ended the cycle early.
    pub stopped: bool,
}

/// Drives one sync cycle over a mailbox session.
///
/// Messages are processed strictly sequentially in ascending UID order;
/// a failure on one message never halts the batch.
pub struct SyncPipeline {
    decoder: MessageDecoder,
    stop: Option<Arc<AtomicBool>>,
}

impl Default for SyncPipeline {
    fn default() -> Self {
        Self::new(MessageDecoder::new())
    }
}

impl SyncPipeline {
    /// Creates a pipeline around the given decoder.
    pub fn new(decoder: MessageDecoder) -> Self {
        Self {
            decoder,
            stop: None,
        }
    }

    /// Installs a cooperative stop flag, checked between messages.
    /// Stopping mid-batch is safe: watermark advancement is the
    /// caller's decision per consumed record.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Runs one cycle: lists UIDs above the watermark and processes each
    /// in ascending order.
    pub async fn run<S>(&self, session: &mut S, tracker: &WatermarkTracker) -> Result<SyncReport>
    where
        S: MailService,
    {
        self.run_inner(session, tracker)
            .instrument(info_span!("mail_sync"))
            .await
    }

    async fn run_inner<S>(&self, session: &mut S, tracker: &WatermarkTracker) -> Result<SyncReport>
    where
        S: MailService,
    {
        let uids = tracker.list_new(session).await?;
        if uids.is_empty() {
            info!("No new messages");
            return Ok(SyncReport::default());
        }
        info!("Found {} new message(s)", uids.len());

        let mut report = SyncReport::default();
        for uid in uids {
            if self.stop_requested() {
                warn!("Stop requested; ending cycle before UID {}", uid);
                report.stopped = true;
                break;
            }

            let outcome = self.process_uid(session, uid, &mut report.records).await;
            report.outcomes.push((uid, outcome));
        }

        info!(
            "Cycle complete: {} record(s) from {} message(s)",
            report.records.len(),
            report.outcomes.len()
        );
        Ok(report)
    }

    async fn process_uid<S>(
        &self,
        session: &mut S,
        uid: u32,
        records: &mut Vec<ExtractionRecord>,
    ) -> UidOutcome
    where
        S: MailService,
    {
        let raw = match session.fetch_raw(uid).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to fetch UID {}: {}", uid, e);
                return UidOutcome::FetchFailed(e.to_string());
            }
        };

        let decoded = match self.decoder.decode(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("Failed to decode UID {}: {}", uid, e);
                return UidOutcome::DecodeFailed(e.to_string());
            }
        };

        let business = extract_business(&decoded.sender);
        let raw: Arc<[u8]> = Arc::from(raw);

        if decoded.attachments.is_empty() {
            records.push(ExtractionRecord {
                uid,
                sender: decoded.sender,
                business,
                subject: decoded.subject,
                body_text: decoded.body_text,
                raw,
                attachment: None,
            });
            return UidOutcome::Emitted(1);
        }

        let emitted = decoded.attachments.len();
        for attachment in decoded.attachments {
            records.push(ExtractionRecord {
                uid,
                sender: decoded.sender.clone(),
                business: business.clone(),
                subject: decoded.subject.clone(),
                body_text: decoded.body_text.clone(),
                raw: Arc::clone(&raw),
                attachment: Some(attachment),
            });
        }
        UidOutcome::Emitted(emitted)
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
