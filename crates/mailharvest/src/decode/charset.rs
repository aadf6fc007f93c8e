//! Pluggable character-encoding detection.
//!
//! Detector quality varies by corpus, so the heuristic lives behind a
//! strategy trait. The default implementation is chardetng's
//! confidence-scored sniffer with UTF-8 as the fallback of last resort.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::error::{Result, SyncError};

/// Guesses the character encoding of raw message bytes.
pub trait CharsetDetector: Send + Sync {
    /// Returns the best guess for `bytes`. Implementations must always
    /// return an encoding; UTF-8 when nothing better can be said.
    fn detect(&self, bytes: &[u8]) -> &'static Encoding;
}

/// Default detector backed by chardetng.
#[derive(Debug, Default, Clone, Copy)]
pub struct SniffDetector;

impl CharsetDetector for SniffDetector {
    fn detect(&self, bytes: &[u8]) -> &'static Encoding {
        if bytes.is_empty() {
            return encoding_rs::UTF_8;
        }
        let mut detector = EncodingDetector::new();
        detector.feed(bytes, true);
        detector.guess(None, true)
    }
}

/// Detector pinned to one known encoding.
#[derive(Debug, Clone, Copy)]
pub struct FixedDetector(pub &'static Encoding);

impl CharsetDetector for FixedDetector {
    fn detect(&self, _bytes: &[u8]) -> &'static Encoding {
        self.0
    }
}

/// Decodes `bytes` with `encoding`, failing when the bytes are malformed
/// for it.
pub fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(SyncError::Decode(format!(
            "input is not valid {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}
