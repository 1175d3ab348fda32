//! Boundary rules for locating complete frames and lines in a channel buffer.
//!
//! Both rules return `Ok(None)` when the buffer does not hold a complete unit
//! yet; nothing but leading padding is consumed in that case.

use crate::accumulator::ByteAccumulator;
use crate::error::Result;
use crate::tags::FRAME_END_MARKER;

/// Text decoded from a frame or line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// Number of non-ASCII bytes that were dropped.
    pub dropped: usize,
}

/// Carriage return and line feed separate frames and are never content.
pub fn is_padding(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// Decode bytes as ASCII, dropping anything outside the ASCII range.
pub fn decode_ascii(bytes: &[u8]) -> Decoded {
    let mut text = String::with_capacity(bytes.len());
    let mut dropped = 0;
    for &byte in bytes {
        if byte.is_ascii() {
            text.push(char::from(byte));
        } else {
            dropped += 1;
        }
    }
    Decoded { text, dropped }
}

/// Remove every leading CR/LF byte, returning how many were removed.
pub fn strip_leading_padding(buf: &mut ByteAccumulator) -> Result<usize> {
    let count = buf
        .as_slice()
        .iter()
        .take_while(|&&byte| is_padding(byte))
        .count();
    if count > 0 {
        buf.consume_prefix(count)?;
    }
    Ok(count)
}

/// Text-frame rule: everything up to and including `</CRC>`.
///
/// CR/LF bytes directly after the marker belong to the frame but are not
/// part of the decoded text.
pub fn next_text_frame(buf: &mut ByteAccumulator) -> Result<Option<Decoded>> {
    loop {
        strip_leading_padding(buf)?;

        let Some(idx) = buf.find(FRAME_END_MARKER) else {
            return Ok(None);
        };
        let body_end = idx + FRAME_END_MARKER.len();
        let trailing = buf.as_slice()[body_end..]
            .iter()
            .take_while(|&&byte| is_padding(byte))
            .count();

        let frame = buf.consume_prefix(body_end + trailing)?;
        let decoded = decode_ascii(&frame[..body_end]);
        if decoded.text.is_empty() {
            continue;
        }
        tracing::trace!(bytes = frame.len(), "text frame located");
        return Ok(Some(decoded));
    }
}

/// Line rule: everything up to and including the next `\n`.
pub fn next_line(buf: &mut ByteAccumulator) -> Result<Option<Decoded>> {
    let Some(idx) = buf.find(b"\n") else {
        return Ok(None);
    };
    let line = buf.consume_prefix(idx + 1)?;
    Ok(Some(decode_ascii(&line)))
}
