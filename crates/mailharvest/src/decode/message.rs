//! Raw message decoding: headers, body text and PDF attachments.

use encoding_rs::Encoding;
use log::debug;
use mail_parser::{Message, MessageParser, MimeHeaders, PartType};

use super::charset::{decode_strict, CharsetDetector, SniffDetector};
use super::subject;
use crate::error::{Result, SyncError};

/// Width used when flattening HTML bodies to visible text.
const BODY_TEXT_WIDTH: usize = 80;

/// One extracted attachment payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename as declared by the message part.
    pub filename: String,
    /// Decoded binary payload.
    pub data: Vec<u8>,
}

/// Fully decoded message content.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The `From` header address.
    pub sender: String,
    /// The decoded subject.
    pub subject: String,
    /// Concatenated visible text of all text/plain and text/html parts.
    pub body_text: String,
    /// PDF attachment payloads, in part order.
    pub attachments: Vec<Attachment>,
}

/// Sender and subject only: the light decode path used for metadata
/// caching, which never touches body parts or attachments.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: String,
    pub subject: String,
}

/// Decodes raw message bytes into structured content.
pub struct MessageDecoder {
    detector: Box<dyn CharsetDetector>,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    /// Creates a decoder with the default charset sniffer.
    pub fn new() -> Self {
        Self {
            detector: Box::new(SniffDetector),
        }
    }

    /// Creates a decoder with a custom detection strategy.
    pub fn with_detector(detector: Box<dyn CharsetDetector>) -> Self {
        Self { detector }
    }

    /// Decodes one raw message.
    ///
    /// A message whose bytes do not decode under the detected charset,
    /// or whose structure does not parse, is a hard failure. Callers
    /// skip it and move on to the next identifier.
    pub fn decode(&self, raw: &[u8]) -> Result<DecodedMessage> {
        let charset = self.detector.detect(raw);
        decode_strict(charset, raw)?;

        let message = parse(raw)?;
        let sender = sender_of(&message);
        let subject = subject_of(&message, raw, charset);
        let (body_text, attachments) = walk_parts(&message);

        debug!(
            "Decoded message from '{}' with {} attachment(s)",
            sender,
            attachments.len()
        );

        Ok(DecodedMessage {
            sender,
            subject,
            body_text,
            attachments,
        })
    }

    /// Decodes only sender and subject.
    pub fn decode_envelope(&self, raw: &[u8]) -> Result<Envelope> {
        let charset = self.detector.detect(raw);
        decode_strict(charset, raw)?;

        let message = parse(raw)?;
        Ok(Envelope {
            sender: sender_of(&message),
            subject: subject_of(&message, raw, charset),
        })
    }
}

fn parse(raw: &[u8]) -> Result<Message<'_>> {
    MessageParser::default()
        .parse(raw)
        .ok_or_else(|| SyncError::Decode("failed to parse message structure".to_string()))
}

fn sender_of(message: &Message<'_>) -> String {
    message
        .from()
        .and_then(|address| address.first().map(format_address))
        .unwrap_or_default()
}

/// Formats an address as "Name <email>" when a display name is present.
fn format_address(addr: &mail_parser::Addr) -> String {
    if let Some(name) = addr.name() {
        format!("{} <{}>", name, addr.address().unwrap_or_default())
    } else {
        addr.address().unwrap_or_default().to_string()
    }
}

fn subject_of(message: &Message<'_>, raw: &[u8], outer: &'static Encoding) -> String {
    match subject::raw_header_value(raw, "Subject") {
        Some(value) => subject::decode_header_value(&value, outer),
        None => message.subject().unwrap_or_default().to_string(),
    }
}

/// Walks every MIME part once, collecting visible body text and PDF
/// attachments in document order.
fn walk_parts(message: &Message<'_>) -> (String, Vec<Attachment>) {
    let mut body_text = String::new();
    let mut attachments = Vec::new();

    for part in message.parts.iter() {
        match &part.body {
            PartType::Text(text) => body_text.push_str(text),
            PartType::Html(html) => {
                body_text.push_str(&html2text::from_read(html.as_bytes(), BODY_TEXT_WIDTH))
            }
            _ => {}
        }

        if let Some(attachment) = pdf_attachment(part) {
            attachments.push(attachment);
        }
    }

    (body_text, attachments)
}

/// A part counts as an attachment when its filename, case-insensitively,
/// contains "pdf". This is a literal substring test on the name, not a
/// content-type check: "pdfinvoice.txt" matches.
fn pdf_attachment(part: &mail_parser::MessagePart<'_>) -> Option<Attachment> {
    let filename = part
        .attachment_name()
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))?;

    if !filename.to_lowercase().contains("pdf") {
        return None;
    }

    let data = match &part.body {
        PartType::Binary(data) | PartType::InlineBinary(data) => data.to_vec(),
        PartType::Text(text) => text.as_bytes().to_vec(),
        PartType::Html(html) => html.as_bytes().to_vec(),
        _ => return None,
    };

    Some(Attachment {
        filename: filename.to_string(),
        data,
    })
}
