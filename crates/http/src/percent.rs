//! Percent-escape handling for request paths.
//!
//! Gateways hand over `PATH_INFO` already unescaped to raw bytes, and those
//! bytes come straight from the client. Nothing guarantees they are utf-8,
//! so turning them into text must never fail:
//!
//! - runs of valid utf-8 decode to their chars, keeping their exact offsets
//! - every byte of an invalid sequence is escaped again as `%XX`
//!
//! ```
//! use gate_http::percent::{repercent_broken_unicode, unquote_to_bytes};
//!
//! let raw = unquote_to_bytes(b"/%E2%99%E2%99%A5/");
//! assert_eq!(repercent_broken_unicode(&raw), "/%E2%99\u{2665}/");
//! ```

use std::borrow::Cow;

use percent_encoding::percent_decode;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Escapes a single byte as `%XX`, upper-case hex.
#[inline]
pub fn escape_byte(b: u8) -> [u8; 3] {
    [b'%', HEX_UPPER[usize::from(b >> 4)], HEX_UPPER[usize::from(b & 0x0f)]]
}

#[inline]
fn push_escaped(out: &mut String, b: u8) {
    for c in escape_byte(b) {
        out.push(char::from(c));
    }
}

/// Replaces every `%XX` escape with the byte it stands for.
///
/// Malformed escapes such as `%`, `%4` or `%zz` are kept as they are.
pub fn unquote_to_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    percent_decode(input).into()
}

/// Decodes `bytes` as utf-8, escaping every byte that is not part of a valid
/// sequence as `%XX`.
///
/// Invalid spans are the maximal invalid subsequences reported by utf-8
/// validation, so `E2 99 E2 99 A5` yields `%E2%99` followed by `♥`. An
/// incomplete sequence at the end is escaped the same way.
pub fn repercent_broken_unicode(bytes: &[u8]) -> Cow<'_, str> {
    let mut rest = bytes;
    let mut out: Option<String> = None;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                return match out {
                    None => Cow::Borrowed(valid),
                    Some(mut text) => {
                        text.push_str(valid);
                        Cow::Owned(text)
                    }
                };
            }
            Err(e) => {
                let text = out.get_or_insert_with(|| String::with_capacity(bytes.len() + 8));
                let (valid, after) = rest.split_at(e.valid_up_to());
                text.push_str(&String::from_utf8_lossy(valid));

                let invalid_len = e.error_len().unwrap_or(after.len());
                let (invalid, remaining) = after.split_at(invalid_len);
                for &b in invalid {
                    push_escaped(text, b);
                }
                rest = remaining;
            }
        }
    }
}

/// Turns raw `PATH_INFO` bytes into a path string; total over every input.
///
/// An empty input is the root path `/`.
pub fn decode_path(raw: &[u8]) -> String {
    if raw.is_empty() {
        return "/".to_string();
    }
    repercent_broken_unicode(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_path(quoted: &str) -> String {
        decode_path(&unquote_to_bytes(quoted.as_bytes()))
    }

    #[test]
    fn test_unquote_to_bytes() {
        assert_eq!(unquote_to_bytes(b"/plain").as_ref(), b"/plain");
        assert_eq!(unquote_to_bytes(b"caf%C3%A9").as_ref(), "café".as_bytes());
        assert_eq!(unquote_to_bytes(b"%aa%AA").as_ref(), &[0xaa, 0xaa]);
        assert_eq!(unquote_to_bytes(b"100%").as_ref(), b"100%");
        assert_eq!(unquote_to_bytes(b"%4").as_ref(), b"%4");
        assert_eq!(unquote_to_bytes(b"%zz%41").as_ref(), b"%zzA");
        assert_eq!(unquote_to_bytes(b"/end%41").as_ref(), b"/endA");
    }

    #[test]
    fn test_escape_byte() {
        assert_eq!(&escape_byte(0xa9), b"%A9");
        assert_eq!(&escape_byte(0x0f), b"%0F");
        assert_eq!(&escape_byte(0xff), b"%FF");
    }

    #[test]
    fn test_get_path() {
        assert_eq!(get_path("~%A9helloworld"), "~%A9helloworld");
        assert_eq!(get_path("d%aao%aaw%aan%aal%aao%aaa%aad%aa/"), "d%AAo%AAw%AAn%AAl%AAo%AAa%AAd%AA/");
        assert_eq!(get_path("/%E2%99%E2%99%A5/"), "/%E2%99\u{2665}/");
        assert_eq!(get_path("/%E2%99%A5"), "/\u{2665}");
        assert_eq!(get_path("/%E2%98%80%E2%99%A5/"), "/\u{2600}\u{2665}/");
        assert_eq!(get_path("/%E2%98%8E%E2%A9%E2%99%A5/"), "/\u{260e}%E2%A9\u{2665}/");
        assert_eq!(get_path("/%2F%25?q=%C3%B6&x=%3D%25#%25"), "//%?q=\u{f6}&x==%#%");
        assert_eq!(get_path("/%E2%98%90%E2%98%9A%E2%98%A3"), "/\u{2610}\u{261a}\u{2623}");
        assert_eq!(get_path("/%E2%99%BF%99\u{2603}%E2%99%A3%E2%98%BD%A9"), "/\u{267f}%99\u{2603}\u{2663}\u{263d}%A9");
        assert_eq!(get_path("/%E2%98%90/fred?utf8=%E2%9C%93"), "/\u{2610}/fred?utf8=\u{2713}");
        assert_eq!(get_path("/%A7%25%10%98%25"), "/%A7%\u{10}%98%");
        assert_eq!(
            get_path("/\u{e2}\u{98}\u{90}/fred?utf8=\u{e2}\u{9c}\u{93}"),
            "/\u{e2}\u{98}\u{90}/fred?utf8=\u{e2}\u{9c}\u{93}"
        );
        assert_eq!(get_path("/üsername"), "/\u{fc}sername");
        assert_eq!(get_path("/üser:pässword@\u{2603}"), "/\u{fc}ser:p\u{e4}ssword@\u{2603}");
        assert_eq!(get_path("/%3Fmeh?foo=%26%A9"), "/?meh?foo=&%A9");
        assert_eq!(get_path("/%E2%A8%87%87%A5%E2%A8%A0"), "/\u{2a07}%87%A5\u{2a20}");
        assert_eq!(get_path("/你好"), "/\u{4f60}\u{597d}");
    }

    #[test]
    fn lone_invalid_byte() {
        assert_eq!(decode_path(b"\xed"), "%ED");
        assert_eq!(decode_path(b""), "/");
    }

    #[test]
    fn truncated_sequence_at_end_is_escaped() {
        assert_eq!(decode_path(b"/a\xe2\x99"), "/a%E2%99");
    }

    #[test]
    fn valid_input_is_borrowed() {
        assert!(matches!(repercent_broken_unicode("/\u{2603}".as_bytes()), Cow::Borrowed(_)));
    }

    #[test]
    fn invalid_bytes_round_trip_through_their_escape() {
        for b in 0x80..=0xffu8 {
            let raw = [b];
            let escaped = repercent_broken_unicode(&raw);
            assert_eq!(escaped.as_bytes(), &escape_byte(b));
            assert_eq!(unquote_to_bytes(escaped.as_bytes()).as_ref(), &[b]);
        }
    }

    #[test]
    fn total_over_byte_pairs() {
        for hi in 0..=0xffu8 {
            for lo in 0..=0xffu8 {
                let raw = [hi, lo];
                let decoded = repercent_broken_unicode(&raw);
                assert!(!decoded.is_empty());
            }
        }
    }
}
