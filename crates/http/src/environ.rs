//! The raw gateway environment a request is decoded from.
//!
//! An [`Environ`] is a CGI-style mapping of keys (`REQUEST_METHOD`,
//! `PATH_INFO`, `QUERY_STRING`, `HTTP_*`, ...) to raw bytes, plus the request
//! body. It is what a transport hands to the dispatcher: nothing in it is
//! validated, and every accessor tolerates missing or malformed entries.

use std::collections::HashMap;
use std::error::Error;

use bytes::Bytes;
use http::{HeaderMap, Request, Version};
use http_body::Body;
use http_body_util::BodyExt;
use tracing::debug;

use crate::percent::unquote_to_bytes;
use crate::protocol::ParseError;
use crate::transport::encode_latin1;

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const PATH_INFO: &str = "PATH_INFO";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const HTTP_COOKIE: &str = "HTTP_COOKIE";
pub const URL_SCHEME: &str = "wsgi.url_scheme";

const HTTP_PREFIX: &str = "HTTP_";

/// A raw, byte oriented request environment.
#[derive(Debug, Clone, Default)]
pub struct Environ {
    vars: HashMap<String, Bytes>,
    body: Bytes,
}

impl Environ {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building an environment pre-filled like a test request factory.
    pub fn builder() -> EnvironBuilder {
        EnvironBuilder::new()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Stores `text` as the bytes it carries in ISO-8859-1 transport form.
    pub fn set_transport_str(&mut self, key: impl Into<String>, text: &str) {
        self.set(key, encode_latin1(text).into_owned());
    }

    pub fn remove(&mut self, key: &str) -> Option<Bytes> {
        self.vars.remove(key)
    }

    /// Returns the raw value stored under `key`.
    pub fn var(&self, key: &str) -> Option<&[u8]> {
        self.vars.get(key).map(Bytes::as_ref)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn method(&self) -> Option<&[u8]> {
        self.var(REQUEST_METHOD)
    }

    pub fn script_name(&self) -> Option<&[u8]> {
        self.var(SCRIPT_NAME)
    }

    pub fn path_info(&self) -> Option<&[u8]> {
        self.var(PATH_INFO)
    }

    pub fn query_string(&self) -> Option<&[u8]> {
        self.var(QUERY_STRING)
    }

    pub fn cookie_header(&self) -> Option<&[u8]> {
        self.var(HTTP_COOKIE)
    }

    pub fn url_scheme(&self) -> Option<&[u8]> {
        self.var(URL_SCHEME)
    }

    /// Iterates the entries that carry request headers: every `HTTP_*` key,
    /// `CONTENT_TYPE` and `CONTENT_LENGTH`.
    pub fn header_vars(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.vars
            .iter()
            .filter(|(key, _)| key.starts_with(HTTP_PREFIX) || *key == CONTENT_TYPE || *key == CONTENT_LENGTH)
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Builds an environment from an `http` request, the way a gateway does:
    /// the path is unquoted to raw bytes, the query string is kept raw and
    /// headers become `HTTP_*` entries.
    pub async fn from_http_request<B>(request: Request<B>) -> Result<Self, ParseError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();

        let mut environ = Environ::new();
        environ.set(REQUEST_METHOD, Bytes::copy_from_slice(parts.method.as_str().as_bytes()));
        environ.set(SCRIPT_NAME, Bytes::new());
        environ.set(PATH_INFO, unquote_to_bytes(parts.uri.path().as_bytes()).into_owned());
        environ.set(QUERY_STRING, Bytes::copy_from_slice(parts.uri.query().unwrap_or_default().as_bytes()));
        environ.set(URL_SCHEME, Bytes::copy_from_slice(parts.uri.scheme_str().unwrap_or("http").as_bytes()));
        environ.set(SERVER_PROTOCOL, protocol_name(parts.version));
        if let Some(host) = parts.uri.host() {
            environ.set(SERVER_NAME, Bytes::copy_from_slice(host.as_bytes()));
        }
        if let Some(port) = parts.uri.port_u16() {
            environ.set(SERVER_PORT, port.to_string());
        }

        for (key, value) in header_entries(&parts.headers) {
            environ.set(key, value);
        }

        let collected = body.collect().await.map_err(|e| {
            let cause: Box<dyn Error + Send + Sync> = e.into();
            ParseError::invalid_body(cause)
        })?;
        environ.set_body(collected.to_bytes());

        Ok(environ)
    }
}

fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

/// Maps a header name to its environment key: `user-agent` → `HTTP_USER_AGENT`.
pub fn header_key(name: &str) -> String {
    let upper = name.to_ascii_uppercase().replace('-', "_");
    if upper == CONTENT_TYPE || upper == CONTENT_LENGTH { upper } else { format!("{HTTP_PREFIX}{upper}") }
}

/// Maps an environment key back to its header name: `HTTP_USER_AGENT` → `user-agent`.
pub fn header_name(key: &str) -> Option<String> {
    let name = match key.strip_prefix(HTTP_PREFIX) {
        Some(name) => name,
        None if key == CONTENT_TYPE || key == CONTENT_LENGTH => key,
        None => return None,
    };
    Some(name.to_ascii_lowercase().replace('_', "-"))
}

fn header_entries(headers: &HeaderMap) -> Vec<(String, Bytes)> {
    let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(headers.keys_len());

    for (name, value) in headers {
        let key = header_key(name.as_str());
        let separator: &[u8] = if key == HTTP_COOKIE { b"; " } else { b", " };
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, joined)) => {
                joined.extend_from_slice(separator);
                joined.extend_from_slice(value.as_bytes());
            }
            None => entries.push((key, value.as_bytes().to_vec())),
        }
    }

    debug!(count = entries.len(), "collected header entries");
    entries.into_iter().map(|(k, v)| (k, Bytes::from(v))).collect()
}

/// Builds [`Environ`]s the way a test request factory does.
#[derive(Debug)]
pub struct EnvironBuilder {
    environ: Environ,
}

impl EnvironBuilder {
    fn new() -> Self {
        let mut environ = Environ::new();
        environ.set(REQUEST_METHOD, "GET");
        environ.set(SCRIPT_NAME, "");
        environ.set(PATH_INFO, "/");
        environ.set(QUERY_STRING, "");
        environ.set(SERVER_NAME, "testserver");
        environ.set(SERVER_PORT, "80");
        environ.set(SERVER_PROTOCOL, "HTTP/1.1");
        environ.set(URL_SCHEME, "http");
        Self { environ }
    }

    pub fn method(mut self, method: &str) -> Self {
        self.environ.set(REQUEST_METHOD, method.to_string());
        self
    }

    /// Sets the request target. The part before `?` is unquoted to raw
    /// bytes, the rest becomes the query string.
    pub fn path(mut self, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        self.environ.set(PATH_INFO, unquote_to_bytes(path.as_bytes()).into_owned());
        self.environ.set(QUERY_STRING, query.to_string());
        self
    }

    /// Shortcut for a `GET` of `target`.
    pub fn get(self, target: &str) -> Self {
        self.method("GET").path(target)
    }

    /// Shortcut for a `POST` of `body` to `target`.
    pub fn post(self, target: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.method("POST").path(target).content_type(content_type).body(body)
    }

    pub fn script_name(mut self, script_name: &str) -> Self {
        self.environ.set(SCRIPT_NAME, script_name.to_string());
        self
    }

    /// Sets the raw path bytes, bypassing unquoting.
    pub fn raw_path(mut self, path: impl Into<Bytes>) -> Self {
        self.environ.set(PATH_INFO, path);
        self
    }

    pub fn query_string(mut self, query: impl Into<Bytes>) -> Self {
        self.environ.set(QUERY_STRING, query);
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<Bytes>) -> Self {
        self.environ.set(header_key(name), value);
        self
    }

    pub fn cookie(self, cookie: impl Into<Bytes>) -> Self {
        self.header("cookie", cookie)
    }

    pub fn content_type(self, content_type: &str) -> Self {
        self.header("content-type", content_type.to_string())
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.environ.set(CONTENT_LENGTH, body.len().to_string());
        self.environ.set_body(body);
        self
    }

    pub fn secure(mut self) -> Self {
        self.environ.set(URL_SCHEME, "https");
        self
    }

    pub fn build(self) -> Environ {
        self.environ
    }
}
