//! Body extraction from a (possibly nested) multi-part payload.
//!
//! Search order at each node:
//! 1. the node's own inline body
//! 2. first direct `text/plain` child with a body
//! 3. first direct `text/html` child with a body
//! 4. recurse into each child that has parts of its own, first non-empty
//!    result wins
//!
//! Undecodable data counts as "no body" for that leaf and the search
//! moves on. Nothing here returns an error.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::debug;

use crate::mail::types::MessagePart;

/// Gmail emits base64url both with and without padding.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const TEXT_PLAIN: &str = "text/plain";
const TEXT_HTML: &str = "text/html";

/// Extract a single decoded text body from a payload tree.
///
/// Returns an empty string when no node carries decodable body data.
pub fn extract_body(payload: &MessagePart) -> String {
    if let Some(text) = decode_part(payload) {
        return text;
    }

    if payload.parts.is_empty() {
        return String::new();
    }

    if let Some(text) = first_decoded_of_type(&payload.parts, TEXT_PLAIN) {
        return text;
    }

    if let Some(text) = first_decoded_of_type(&payload.parts, TEXT_HTML) {
        return text;
    }

    // Leaves were covered above; a bare attachment is never a body.
    payload
        .parts
        .iter()
        .filter(|p| !p.parts.is_empty())
        .map(extract_body)
        .find(|body| !body.is_empty())
        .unwrap_or_default()
}

fn first_decoded_of_type(parts: &[MessagePart], mime: &str) -> Option<String> {
    parts
        .iter()
        .filter(|p| p.mime_essence() == mime)
        .find_map(decode_part)
}

/// Decode a part's inline body, `None` if absent or malformed.
fn decode_part(part: &MessagePart) -> Option<String> {
    let data = part.body_data()?;
    match decode_base64url(data) {
        Some(text) => Some(text),
        None => {
            debug!(
                part_id = %part.part_id,
                mime_type = %part.mime_type,
                "Skipping part with undecodable body data"
            );
            None
        }
    }
}

/// Decode base64url text to UTF-8. Invalid UTF-8 sequences are replaced.
pub fn decode_base64url(data: &str) -> Option<String> {
    // Some producers wrap long encoded bodies.
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64URL.decode(compact.as_bytes()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
