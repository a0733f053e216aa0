//! Error types of the dispatch layer.
//!
//! - [`HandlerError`]: conditions raised while handling a request; the chain
//!   translates each of them into a response
//! - [`ConfigError`]: the middleware chain could not be built
//! - [`TransactionError`]: the transaction capability failed

use std::error::Error;

use http::StatusCode;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// Client input that breaks an invariant the server relies on, such as
    /// a path traversal attempt.
    #[error("suspicious operation ({kind}): {reason}")]
    SuspiciousOperation { kind: String, reason: String },

    #[error("not found: {reason}")]
    NotFound { reason: String },

    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("transaction error: {source}")]
    Transaction {
        #[from]
        source: TransactionError,
    },

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl HandlerError {
    pub fn suspicious_operation<K: ToString, S: ToString>(kind: K, str: S) -> Self {
        Self::SuspiciousOperation { kind: kind.to_string(), reason: str.to_string() }
    }

    pub fn not_found<S: ToString>(str: S) -> Self {
        Self::NotFound { reason: str.to_string() }
    }

    pub fn permission_denied<S: ToString>(str: S) -> Self {
        Self::PermissionDenied { reason: str.to_string() }
    }

    pub fn other<E: Into<BoxError>>(e: E) -> Self {
        Self::Other(e.into())
    }

    /// The status code this error is answered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SuspiciousOperation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Self::Transaction { .. } | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("improperly configured: {reason}")]
    ImproperlyConfigured { reason: String },

    /// Returned by a middleware factory that opts out of the chain.
    #[error("middleware is not used")]
    NotUsed,

    #[error("middleware `{name}` failed to build: {source}")]
    Factory { name: String, source: BoxError },
}

impl ConfigError {
    pub fn improperly_configured<S: ToString>(str: S) -> Self {
        Self::ImproperlyConfigured { reason: str.to_string() }
    }

    pub fn factory<N: ToString, E: Into<BoxError>>(name: N, e: E) -> Self {
        Self::Factory { name: name.to_string(), source: e.into() }
    }
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("failed to begin transaction on `{alias}`: {reason}")]
    Begin { alias: String, reason: String },

    #[error("failed to commit transaction on `{alias}`: {reason}")]
    Commit { alias: String, reason: String },

    #[error("failed to roll back transaction on `{alias}`: {reason}")]
    Rollback { alias: String, reason: String },
}

impl TransactionError {
    pub fn begin<A: ToString, S: ToString>(alias: A, str: S) -> Self {
        Self::Begin { alias: alias.to_string(), reason: str.to_string() }
    }

    pub fn commit<A: ToString, S: ToString>(alias: A, str: S) -> Self {
        Self::Commit { alias: alias.to_string(), reason: str.to_string() }
    }

    pub fn rollback<A: ToString, S: ToString>(alias: A, str: S) -> Self {
        Self::Rollback { alias: alias.to_string(), reason: str.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn status_codes() {
        assert_eq!(HandlerError::suspicious_operation("DisallowedHost", "evil.com").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(HandlerError::not_found("/missing").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(HandlerError::permission_denied("staff only").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            HandlerError::from(TransactionError::begin("default", "gone")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            HandlerError::other(io::Error::other("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn other_is_transparent() {
        let error = HandlerError::other(io::Error::other("boom"));
        assert_eq!(error.to_string(), "boom");
    }
}
