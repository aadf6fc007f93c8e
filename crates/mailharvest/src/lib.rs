pub mod builder;
pub mod config;
pub mod decode;
pub mod error;
pub mod pipeline;
pub mod routing;
pub mod session;
pub mod store;
pub mod watermark;

pub use builder::{build_documents, IdocBuilder, InvoiceBuilder, SegmentTemplates};
pub use config::MailboxConfig;
pub use decode::{Attachment, CharsetDetector, DecodedMessage, Envelope, MessageDecoder};
pub use error::{Result, SyncError};
pub use pipeline::{ExtractionRecord, SyncPipeline, SyncReport, UidOutcome};
pub use routing::{extract_business, RoutingCriteria};
pub use session::{MailService, MailSession, MessageFlag, SessionState};
pub use store::{MemoryStore, MessageMeta, MetadataStore, MetadataWriter, SqliteStore, WriteReport};
pub use watermark::WatermarkTracker;
