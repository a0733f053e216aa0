//! Application logic behind a route.
//!
//! A [`View`] answers a request or fails with a [`HandlerError`]. Plain async
//! functions become views through [`view_fn`]; their return value only has to
//! be a [`Responder`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::Response;

use crate::body::ResponseBody;
use crate::decorator::Decorator;
use crate::error::HandlerError;
use crate::request::RequestContext;
use crate::responder::Responder;

pub const DEFAULT_DB_ALIAS: &str = "default";

#[async_trait]
pub trait View: Send + Sync {
    async fn call(&self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError>;

    /// Whether this view opts out of the request transaction on `alias`.
    fn non_atomic_requests(&self, _alias: &str) -> bool {
        false
    }
}

#[async_trait]
impl<V: View + ?Sized> View for Box<V> {
    async fn call(&self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        (**self).call(req).await
    }

    fn non_atomic_requests(&self, alias: &str) -> bool {
        (**self).non_atomic_requests(alias)
    }
}

#[async_trait]
impl<V: View + ?Sized> View for Arc<V> {
    async fn call(&self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        (**self).call(req).await
    }

    fn non_atomic_requests(&self, alias: &str) -> bool {
        (**self).non_atomic_requests(alias)
    }
}

/// An async function used as a view.
#[derive(Clone, Copy)]
pub struct FnView<F> {
    f: F,
}

impl<F> fmt::Debug for FnView<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnView").finish_non_exhaustive()
    }
}

pub fn view_fn<F, Fut, R>(f: F) -> FnView<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
    R: Responder,
{
    FnView { f }
}

#[async_trait]
impl<F, Fut, R> View for FnView<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
    R: Responder,
{
    async fn call(&self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        let responder = (self.f)(req.clone()).await;
        responder.response_to(req)
    }
}

/// Exempts the decorated view from the request transaction of one database.
#[derive(Debug, Clone)]
pub struct NonAtomicRequests {
    alias: String,
}

impl NonAtomicRequests {
    pub fn using(alias: impl Into<String>) -> Self {
        Self { alias: alias.into() }
    }
}

impl Default for NonAtomicRequests {
    fn default() -> Self {
        Self::using(DEFAULT_DB_ALIAS)
    }
}

impl<V: View> Decorator<V> for NonAtomicRequests {
    type Out = NonAtomicView<V>;

    fn decorate(&self, raw: V) -> Self::Out {
        NonAtomicView { view: raw, alias: self.alias.clone() }
    }
}

#[derive(Debug)]
pub struct NonAtomicView<V> {
    view: V,
    alias: String,
}

#[async_trait]
impl<V: View> View for NonAtomicView<V> {
    async fn call(&self, req: &RequestContext) -> Result<Response<ResponseBody>, HandlerError> {
        self.view.call(req).await
    }

    fn non_atomic_requests(&self, alias: &str) -> bool {
        self.alias == alias || self.view.non_atomic_requests(alias)
    }
}

/// Shorthand for decorating `view` with [`NonAtomicRequests::default`].
pub fn non_atomic_requests<V: View>(view: V) -> NonAtomicView<V> {
    NonAtomicRequests::default().decorate(view)
}
