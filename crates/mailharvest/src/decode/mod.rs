//! Message content decoding: charset detection, header decoding and
//! MIME part extraction.

pub mod charset;
pub mod message;
pub mod subject;

pub use charset::{CharsetDetector, FixedDetector, SniffDetector};
pub use message::{Attachment, DecodedMessage, Envelope, MessageDecoder};
