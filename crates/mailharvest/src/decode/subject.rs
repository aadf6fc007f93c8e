//! RFC 2047 encoded-word decoding for message headers.
//!
//! Subjects arrive as a sequence of charset-tagged fragments. Each
//! fragment is decoded with its own declared charset, falling back to
//! the charset detected for the whole message, then UTF-8.

use base64::Engine as _;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;

// The character classes cover printable ASCII except '?'.
static ENCODED_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^=\?([!->@-~]+)\?([!->@-~]+)\?([!->@-~]*)\?=$").unwrap());

/// Decodes a raw header value: encoded words are decoded with their
/// declared charsets, ordinary words are kept verbatim, and whitespace
/// between *adjacent* encoded words is elided per RFC 2047.
pub fn decode_header_value(raw: &[u8], outer: &'static Encoding) -> String {
    let (value, _) = outer.decode_without_bom_handling(raw);

    let mut out = String::new();
    let mut first = true;
    let mut previous_encoded = false;
    for word in value.split_ascii_whitespace() {
        match encoded_word(word, outer) {
            Some(decoded) => {
                if !first && !previous_encoded {
                    out.push(' ');
                }
                out.push_str(&decoded);
                previous_encoded = true;
            }
            None => {
                if !first {
                    out.push(' ');
                }
                out.push_str(word);
                previous_encoded = false;
            }
        }
        first = false;
    }
    out
}

/// Decodes a sequence of already transfer-decoded header fragments,
/// concatenated in order. Fragments without a recognized charset fall
/// back to `outer`, then UTF-8.
pub fn decode_fragments<'a, I>(fragments: I, outer: &'static Encoding) -> String
where
    I: IntoIterator<Item = (&'a [u8], Option<&'a str>)>,
{
    fragments
        .into_iter()
        .map(|(bytes, declared)| decode_with_fallback(bytes, declared, outer))
        .collect()
}

/// Decodes bytes with the declared charset, falling back to the outer
/// detected charset, then lossy UTF-8.
pub fn decode_with_fallback(bytes: &[u8], declared: Option<&str>, outer: &'static Encoding) -> String {
    if let Some(label) = declared {
        if let Some(encoding) = Encoding::for_label_no_replacement(label.as_bytes()) {
            let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
            if !had_errors {
                return text.into_owned();
            }
        }
    }

    let (text, had_errors) = outer.decode_without_bom_handling(bytes);
    if !had_errors {
        return text.into_owned();
    }

    String::from_utf8_lossy(bytes).into_owned()
}

/// Extracts the raw value bytes of header `name` from an RFC 822
/// message, with folded continuation lines joined by a single space.
pub fn raw_header_value(raw: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut value: Option<Vec<u8>> = None;

    for line in lines(raw) {
        if line.is_empty() {
            break; // end of the header section
        }

        if let Some(acc) = value.as_mut() {
            if line[0] == b' ' || line[0] == b'\t' {
                acc.push(b' ');
                acc.extend_from_slice(trimmed(line));
                continue;
            }
            break; // next header starts, value complete
        }

        if let Some(rest) = header_rest(line, name) {
            value = Some(trimmed(rest).to_vec());
        }
    }

    value
}

/// Tests if `word` in its entirety is an RFC 2047 encoded word and
/// decodes it. Returns `None` otherwise; the distinction matters
/// because only whitespace between adjacent encoded words is deleted.
fn encoded_word(word: &str, outer: &'static Encoding) -> Option<String> {
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1)?.as_str();
    let transfer = captures.get(2)?.as_str();
    let payload = captures.get(3)?.as_str();

    let bytes = match transfer {
        "b" | "B" => base64::engine::general_purpose::STANDARD
            .decode(payload)
            .ok()?,
        "q" | "Q" => q_decode(payload)?,
        _ => return None,
    };

    Some(decode_with_fallback(&bytes, Some(charset), outer))
}

/// Decodes the Q transfer encoding: `_` is an ASCII space regardless of
/// charset, `=XX` a hex-encoded byte.
fn q_decode(payload: &str) -> Option<Vec<u8>> {
    let raw = payload.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                let hi = hex_digit(*raw.get(i + 1)?)?;
                let lo = hex_digit(*raw.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn lines(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    raw.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

fn header_rest<'a>(line: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let colon = line.iter().position(|&b| b == b':')?;
    let (field, rest) = line.split_at(colon);
    if field.eq_ignore_ascii_case(name.as_bytes()) {
        Some(&rest[1..])
    } else {
        None
    }
}

fn trimmed(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
