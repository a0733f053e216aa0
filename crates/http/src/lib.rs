//! Tolerant decoding of gateway environments into requests.
//!
//! A transport hands every request over as an [`environ::Environ`]: a
//! CGI-style mapping of keys to raw bytes. Those bytes come from clients and
//! can't be trusted to be well formed, so this crate turns them into a
//! [`protocol::Request`] without ever failing on the parts a misbehaving
//! client controls:
//!
//! - paths keep undecodable bytes as `%XX` escapes ([`percent`])
//! - query values substitute `U+FFFD` for invalid utf-8 ([`query`])
//! - cookies that don't decode are dropped one by one ([`cookie`])
//!
//! # Example
//!
//! ```
//! use gate_http::environ::Environ;
//! use gate_http::protocol::Request;
//!
//! let environ = Environ::builder()
//!     .get("/caf%C3%A9/?want=caf%E9")
//!     .cookie("theme=dark")
//!     .build();
//!
//! let request = Request::from_environ(environ).unwrap();
//!
//! assert_eq!(request.path(), "/café/");
//! assert_eq!(request.query().get("want"), Some("caf\u{fffd}"));
//! assert_eq!(request.cookie("theme"), Some("dark"));
//! ```
//!
//! # Wire contract
//!
//! Query strings and cookie headers are accepted as ISO-8859-1 transport
//! text carrying (percent-escaped) utf-8; see [`transport`].

pub mod cookie;
pub mod environ;
pub mod percent;
pub mod protocol;
pub mod query;
pub mod transport;
