//! Per-request transactions.
//!
//! A [`Connection`] is the database capability the dispatcher needs: begin,
//! commit and roll back. For each request the [`TransactionWrapper`] picks the
//! connections whose settings ask for atomic requests and that the resolved
//! view doesn't opt out of, then runs the chain inside one atomic scope over
//! all of them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{HandlerError, TransactionError};
use crate::settings::Settings;
use crate::view::View;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    fn alias(&self) -> &str;

    async fn begin(&self) -> Result<(), TransactionError>;

    async fn commit(&self) -> Result<(), TransactionError>;

    async fn rollback(&self) -> Result<(), TransactionError>;

    /// Whether a transaction is open on this connection.
    fn in_atomic_block(&self) -> bool;
}

#[derive(Default, Clone)]
pub struct TransactionWrapper {
    connections: Vec<Arc<dyn Connection>>,
}

impl fmt::Debug for TransactionWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let aliases = self.connections.iter().map(|connection| connection.alias()).collect::<Vec<_>>();
        f.debug_struct("TransactionWrapper").field("connections", &aliases).finish()
    }
}

impl TransactionWrapper {
    pub fn new(connections: Vec<Arc<dyn Connection>>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &[Arc<dyn Connection>] {
        &self.connections
    }

    /// The connections a request for `view` has to run atomically on.
    ///
    /// Settings are read on every call, so toggling `atomic_requests` takes
    /// effect with the next request.
    pub fn scope_for(&self, settings: &Settings, view: Option<&dyn View>) -> Vec<Arc<dyn Connection>> {
        self.connections
            .iter()
            .filter(|connection| settings.atomic_requests(connection.alias()))
            .filter(|connection| !view.is_some_and(|view| view.non_atomic_requests(connection.alias())))
            .map(Arc::clone)
            .collect()
    }
}

/// Runs `fut` inside a transaction on every connection in `scope`.
///
/// Commits in reverse order when `fut` succeeds and rolls back otherwise. A
/// failing `begin` or `commit` rolls back what is still open, the failed
/// connection included on commit, and surfaces as
/// [`HandlerError::Transaction`].
pub async fn atomic<F, T>(scope: &[Arc<dyn Connection>], fut: F) -> Result<T, HandlerError>
where
    F: Future<Output = Result<T, HandlerError>>,
{
    if scope.is_empty() {
        return fut.await;
    }

    for (index, connection) in scope.iter().enumerate() {
        if let Err(e) = connection.begin().await {
            rollback_all(&scope[..index]).await;
            return Err(e.into());
        }
        debug!(alias = connection.alias(), "transaction started");
    }

    match fut.await {
        Ok(value) => {
            for (index, connection) in scope.iter().enumerate().rev() {
                if let Err(e) = connection.commit().await {
                    rollback_all(&scope[..=index]).await;
                    return Err(e.into());
                }
            }
            Ok(value)
        }
        Err(e) => {
            rollback_all(scope).await;
            Err(e)
        }
    }
}

async fn rollback_all(connections: &[Arc<dyn Connection>]) {
    for connection in connections.iter().rev() {
        if let Err(e) = connection.rollback().await {
            error!(alias = connection.alias(), cause = %e, "rollback failed");
        }
    }
}
