//! The decoded request.
//!
//! A [`Request`] is built once from an [`Environ`] and never changes
//! afterwards. Decoding is isolated per field:
//!
//! - the path goes through [`decode_path`], which can't fail
//! - the query string is decoded with replacement chars
//! - cookies that don't decode are dropped one by one
//! - headers keep their raw transport text
//!
//! Only a missing environment or an unusable method make decoding fail.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, Method};
use mime::Mime;
use tracing::debug;

use crate::cookie::parse_cookie;
use crate::environ::{Environ, header_name};
use crate::percent::decode_path;
use crate::protocol::ParseError;
use crate::query::QueryDict;
use crate::transport::decode_latin1;

#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    path_info: String,
    query: QueryDict,
    cookies: HashMap<String, String>,
    headers: HeaderMap<String>,
    environ: Environ,
}

impl Request {
    /// Decodes a request from an optional environment.
    ///
    /// An absent environment is reported as [`ParseError::MissingEnviron`]
    /// instead of faulting, so callers can still answer.
    pub fn decode(environ: Option<Environ>) -> Result<Self, ParseError> {
        environ.ok_or(ParseError::MissingEnviron).and_then(Self::from_environ)
    }

    pub fn from_environ(environ: Environ) -> Result<Self, ParseError> {
        let method = decode_method(environ.method())?;

        let path_info = decode_path(environ.path_info().unwrap_or_default());
        let script_name = environ.script_name().map(decode_path).filter(|name| name != "/").unwrap_or_default();
        let path = join_path(&script_name, &path_info);

        let query = QueryDict::parse(environ.query_string().unwrap_or_default());
        let cookies = environ.cookie_header().map(parse_cookie).unwrap_or_default();
        let headers = decode_headers(&environ);

        Ok(Self { method, path, path_info, query, cookies, headers, environ })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full decoded path: script name followed by path info.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The decoded path below the script name; what routing matches on.
    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    /// Returns the path followed by the raw query string, if there is one.
    pub fn full_path(&self) -> String {
        let query = self.environ.query_string().unwrap_or_default();
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, decode_latin1(query))
        }
    }

    /// The decoded query parameters.
    pub fn query(&self) -> &QueryDict {
        &self.query
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Request headers, values kept as raw transport text.
    pub fn headers(&self) -> &HeaderMap<String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Parses the `content-type` header, if present and well formed.
    pub fn content_type(&self) -> Option<Mime> {
        self.header(http::header::CONTENT_TYPE.as_str()).and_then(|value| value.parse().ok())
    }

    pub fn scheme(&self) -> &str {
        match self.environ.url_scheme() {
            Some(b"https") => "https",
            _ => "http",
        }
    }

    pub fn is_secure(&self) -> bool {
        self.scheme() == "https"
    }

    pub fn body(&self) -> &Bytes {
        self.environ.body()
    }

    /// The environment this request was decoded from.
    pub fn meta(&self) -> &Environ {
        &self.environ
    }
}

fn decode_method(raw: Option<&[u8]>) -> Result<Method, ParseError> {
    let raw = raw.ok_or_else(|| ParseError::invalid_method("REQUEST_METHOD is missing"))?;
    Ok(Method::from_bytes(&raw.to_ascii_uppercase())?)
}

/// Joins a script name and a path info into one absolute path.
fn join_path(script_name: &str, path_info: &str) -> String {
    let script_name = script_name.trim_end_matches('/');
    let path_info = path_info.strip_prefix('/').unwrap_or(path_info);
    format!("{script_name}/{path_info}")
}

fn decode_headers(environ: &Environ) -> HeaderMap<String> {
    let mut headers = HeaderMap::default();

    for (key, value) in environ.header_vars() {
        let Some(name) = header_name(key) else {
            continue;
        };
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => {
                headers.insert(name, decode_latin1(value).into_owned());
            }
            Err(e) => debug!(key, cause = %e, "skip environment entry with invalid header name"),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple_get() {
        let environ = Environ::builder()
            .get("/index/?a=1&b=2&a=3")
            .header("user-agent", "curl/7.79.1")
            .header("accept", "*/*")
            .build();

        let request = Request::from_environ(environ).unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/index/");
        assert_eq!(request.path_info(), "/index/");
        assert_eq!(request.full_path(), "/index/?a=1&b=2&a=3");
        assert_eq!(request.query().get_list("a"), ["1".to_string(), "3".to_string()]);
        assert_eq!(request.query().get("b"), Some("2"));
        assert_eq!(request.header("user-agent"), Some("curl/7.79.1"));
        assert_eq!(request.headers().len(), 2);
        assert!(request.cookies().is_empty());
        assert!(!request.is_secure());
    }

    #[test]
    fn bad_path_info_still_decodes() {
        let environ = Environ::builder().raw_path(&b"\xed"[..]).build();

        let request = Request::from_environ(environ).unwrap();

        assert_eq!(request.path_info(), "%ED");
        assert_eq!(request.path(), "/%ED");
    }

    #[test]
    fn missing_path_is_root() {
        let mut environ = Environ::builder().build();
        environ.remove(crate::environ::PATH_INFO);

        let request = Request::from_environ(environ).unwrap();
        assert_eq!(request.path(), "/");
    }

    #[test]
    fn script_name_is_prefixed() {
        let environ = Environ::builder().script_name("/mount/").get("/page").build();

        let request = Request::from_environ(environ).unwrap();

        assert_eq!(request.path(), "/mount/page");
        assert_eq!(request.path_info(), "/page");
    }

    #[test]
    fn missing_environ_and_method() {
        assert!(matches!(Request::decode(None), Err(ParseError::MissingEnviron)));

        let mut environ = Environ::builder().build();
        environ.remove(crate::environ::REQUEST_METHOD);
        assert!(matches!(Request::from_environ(environ), Err(ParseError::InvalidMethod { .. })));

        let environ = Environ::builder().method("GE T").build();
        assert!(matches!(Request::from_environ(environ), Err(ParseError::InvalidMethod { .. })));
    }

    #[test]
    fn method_is_upper_cased() {
        let environ = Environ::builder().method("post").build();
        assert_eq!(Request::from_environ(environ).unwrap().method(), &Method::POST);
    }

    #[test]
    fn invalid_cookie_does_not_fail_the_request() {
        let environ = Environ::builder().cookie(&b"x=W\x03c(h]\x8e; ok=yes"[..]).build();

        let request = Request::from_environ(environ).unwrap();

        assert_eq!(request.cookies().len(), 1);
        assert_eq!(request.cookie("ok"), Some("yes"));
        assert_eq!(request.cookie("x"), None);
    }

    #[test]
    fn post_body_and_content_type() {
        let form = "name=hello&zip=world";
        let environ = Environ::builder().post("/form", "application/x-www-form-urlencoded", form).secure().build();

        let request = Request::from_environ(environ).unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.content_type(), Some(mime::APPLICATION_WWW_FORM_URLENCODED));
        assert_eq!(request.header("content-length"), Some("20"));
        assert_eq!(request.body().as_ref(), b"name=hello&zip=world");
        assert!(request.is_secure());
    }

    #[test]
    fn header_values_keep_transport_text() {
        let environ = Environ::builder().header("x-name", &b"caf\xe9"[..]).build();

        let request = Request::from_environ(environ).unwrap();

        assert_eq!(request.header("x-name"), Some("caf\u{e9}"));
    }
}
