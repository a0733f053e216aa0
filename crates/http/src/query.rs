//! Query string decoding.
//!
//! The wire contract: `QUERY_STRING` arrives as bytes carried through
//! ISO-8859-1 transport text, holding percent-escaped utf-8. Decoding runs
//! in two steps:
//!
//! 1. the raw bytes become text, as utf-8 when they are valid and as
//!    ISO-8859-1 otherwise (clients that forgot to quote Latin-1)
//! 2. every `%XX` run is decoded as utf-8 with replacement chars
//!
//! Unlike paths, an undecodable escape in a query value turns into
//! `U+FFFD` instead of being escaped again.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::transport::{decode_latin1, encode_latin1};

/// An ordered multi-map of query parameters.
///
/// Keys keep their first-insertion order and every value of a repeated key
/// is kept, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDict {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryDict {
    /// Creates an empty `QueryDict`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the raw bytes of a query string.
    pub fn parse(raw: &[u8]) -> Self {
        let text = query_text(raw);
        let mut query = Self::new();

        for (key, value) in form_urlencoded::parse(text.as_bytes()) {
            query.append(key, value);
        }

        query
    }

    /// Parses a query string handed over as ISO-8859-1 transport text.
    pub fn from_transport_str(text: &str) -> Self {
        Self::parse(&encode_latin1(text))
    }

    /// Appends `value` to the values of `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Returns the last value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_list(key).last().map(String::as_str)
    }

    /// Returns every value of `key`, in input order.
    pub fn get_list(&self, key: &str) -> &[String] {
        self.entries.iter().find(|(k, _)| k == key).map_or(&[], |(_, values)| values.as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, values)| (k.as_str(), values.as_slice()))
    }
}

fn query_text(raw: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(raw) {
        Ok(text) => Cow::Borrowed(text),
        Err(e) => {
            debug!(valid_up_to = e.valid_up_to(), "query string is not utf-8, decoding as latin-1");
            decode_latin1(raw)
        }
    }
}

/// Replaces `+` with a space and decodes `%XX` runs as utf-8, substituting
/// `U+FFFD` for invalid sequences.
pub fn unquote_plus(component: &str) -> Cow<'_, str> {
    if !component.contains(['%', '+']) {
        return Cow::Borrowed(component);
    }

    let spaced = component.replace('+', " ");
    Cow::Owned(percent_decode_str(&spaced).decode_utf8_lossy().into_owned())
}
