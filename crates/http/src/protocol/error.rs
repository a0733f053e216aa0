use thiserror::Error;

/// Failures while turning an environment into a [`Request`](crate::protocol::Request).
///
/// Paths, query strings and cookies never fail to decode; only the parts a
/// request can't exist without end up here.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("request environment is missing")]
    MissingEnviron,

    #[error("invalid http method: {reason}")]
    InvalidMethod { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl ParseError {
    pub fn invalid_method<S: ToString>(str: S) -> Self {
        Self::InvalidMethod { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_header<N: ToString, S: ToString>(name: N, str: S) -> Self {
        Self::InvalidHeader { name: name.to_string(), reason: str.to_string() }
    }
}

impl From<http::method::InvalidMethod> for ParseError {
    fn from(e: http::method::InvalidMethod) -> Self {
        Self::invalid_method(e)
    }
}
