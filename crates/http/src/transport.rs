//! ISO-8859-1 passthrough between bytes and text.
//!
//! Gateways that only speak text carry arbitrary bytes by mapping every byte
//! to the char with the same value. These helpers undo and redo that mapping
//! without losing anything.

use std::borrow::Cow;

/// Maps every byte to the char with the same code point.
pub fn decode_latin1(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.is_ascii() => Cow::Borrowed(text),
        _ => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Reverses [`decode_latin1`].
///
/// Chars above `U+00FF` can't come from a passthrough decode; they are
/// written as their utf-8 bytes so nothing is dropped.
pub fn encode_latin1(text: &str) -> Cow<'_, [u8]> {
    if text.is_ascii() {
        return Cow::Borrowed(text.as_bytes());
    }

    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => bytes.push(b),
            Err(_) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    Cow::Owned(bytes)
}
