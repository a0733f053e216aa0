//! Cookie header decoding.
//!
//! Cookies set from javascript may hold any utf-8 text, and the gateway hands
//! the header over as ISO-8859-1 transport text. Each cookie is decoded on
//! its own: one that is not valid utf-8 or carries control characters is
//! dropped, the others stay available.

use std::collections::HashMap;

use tracing::debug;

use crate::transport::encode_latin1;

/// Parses the raw bytes of a `Cookie` header into a name → value map.
///
/// Later duplicates override earlier ones. Chunks without a name are
/// ignored.
pub fn parse_cookie(raw: &[u8]) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for chunk in raw.split(|&b| b == b';') {
        let chunk = chunk.trim_ascii();
        if chunk.is_empty() {
            continue;
        }

        let (name, value) = match chunk.iter().position(|&b| b == b'=') {
            Some(idx) => (chunk[..idx].trim_ascii(), chunk[idx + 1..].trim_ascii()),
            None => (&b""[..], chunk),
        };

        if name.is_empty() {
            continue;
        }

        let Some(name) = to_clean_text(name.to_vec()) else {
            debug!("drop cookie with undecodable name");
            continue;
        };

        match to_clean_text(unquote(value)) {
            Some(value) => {
                cookies.insert(name, value);
            }
            None => debug!(cookie = %name, "drop cookie with undecodable value"),
        }
    }

    cookies
}

/// Parses a `Cookie` header handed over as ISO-8859-1 transport text.
pub fn parse_cookie_str(text: &str) -> HashMap<String, String> {
    parse_cookie(&encode_latin1(text))
}

fn to_clean_text(bytes: Vec<u8>) -> Option<String> {
    let text = String::from_utf8(bytes).ok()?;
    if text.chars().any(char::is_control) {
        return None;
    }
    Some(text)
}

/// Removes surrounding double quotes and resolves backslash escapes.
///
/// `\ooo` is an octal byte, any other escaped byte stands for itself.
fn unquote(value: &[u8]) -> Vec<u8> {
    if value.len() < 2 || value[0] != b'"' || value[value.len() - 1] != b'"' {
        return value.to_vec();
    }

    let inner = &value[1..value.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;

    while i < inner.len() {
        if inner[i] != b'\\' || i + 1 == inner.len() {
            out.push(inner[i]);
            i += 1;
            continue;
        }

        match octal_byte(&inner[i + 1..]) {
            Some(b) => {
                out.push(b);
                i += 4;
            }
            None => {
                out.push(inner[i + 1]);
                i += 2;
            }
        }
    }

    out
}

fn octal_byte(bytes: &[u8]) -> Option<u8> {
    match bytes {
        [a @ b'0'..=b'3', b @ b'0'..=b'7', c @ b'0'..=b'7', ..] => Some(((a - b'0') << 6) | ((b - b'0') << 3) | (c - b'0')),
        _ => None,
    }
}
