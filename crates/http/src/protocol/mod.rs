//! Request types produced by the decode layer.
//!
//! - [`Request`]: the immutable, decoded view of an environment
//! - [`ParseError`]: the few ways decoding can fail

mod error;
pub use error::ParseError;

mod request;
pub use request::Request;
