//! The middleware chain.
//!
//! The chain is built lazily, from the settings active when the first request
//! arrives. Building happens under an async mutex; once the list is stored,
//! later requests read it without locking. A failed build leaves the chain
//! empty and unlocked, and the next request tries again.
//!
//! [`MiddlewareChain::dispatch`] runs one request through the loaded
//! middlewares and the view and always produces a response: errors left over
//! after the exception hooks are translated into 400, 403, 404 or 500
//! responses, which then go through the response hooks like any other.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response};
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::body::ResponseBody;
use crate::error::{ConfigError, HandlerError};
use crate::middleware::{Middleware, MiddlewareSource};
use crate::request::RequestContext;
use crate::settings::Settings;
use crate::transaction::{Connection, atomic};
use crate::view::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Never built.
    Idle,
    /// A build is in progress.
    Loading,
    Ready,
    /// The last build failed; the next request retries.
    Failed,
}

pub struct MiddlewareChain {
    source: Box<dyn MiddlewareSource>,
    loaded: OnceCell<Vec<Arc<dyn Middleware>>>,
    init_lock: Mutex<()>,
    failed: AtomicBool,
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain").field("state", &self.state()).finish_non_exhaustive()
    }
}

impl MiddlewareChain {
    pub fn new(source: impl MiddlewareSource + 'static) -> Self {
        Self { source: Box::new(source), loaded: OnceCell::new(), init_lock: Mutex::new(()), failed: AtomicBool::new(false) }
    }

    /// Builds the chain unless it is already built.
    ///
    /// The guard is released on every exit path, including a panicking
    /// middleware factory.
    pub async fn ensure_loaded(&self, settings: &Settings) -> Result<&[Arc<dyn Middleware>], ConfigError> {
        if let Some(middlewares) = self.loaded.get() {
            return Ok(middlewares.as_slice());
        }

        let _guard = self.init_lock.lock().await;
        if let Some(middlewares) = self.loaded.get() {
            return Ok(middlewares.as_slice());
        }

        info!(middleware = ?settings.middleware, "loading middleware chain");
        match self.source.load(settings) {
            Ok(middlewares) => {
                self.failed.store(false, Ordering::Release);
                Ok(self.loaded.get_or_init(|| middlewares).as_slice())
            }
            Err(e) => {
                self.failed.store(true, Ordering::Release);
                error!(cause = %e, "failed to load middleware chain");
                Err(e)
            }
        }
    }

    pub fn state(&self) -> ChainState {
        if self.loaded.get().is_some() {
            ChainState::Ready
        } else if self.is_locked() {
            ChainState::Loading
        } else if self.failed.load(Ordering::Acquire) {
            ChainState::Failed
        } else {
            ChainState::Idle
        }
    }

    /// Whether the construction guard is currently held.
    pub fn is_locked(&self) -> bool {
        self.init_lock.try_lock().is_err()
    }

    /// The loaded middlewares; empty until the chain is built.
    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        self.loaded.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Runs `req` through the middlewares and `view`.
    ///
    /// When `scope` is not empty the request, view and response phases run
    /// inside one transaction over its connections. A failure is translated
    /// after the rollback; the response hooks then see the error response,
    /// unless the failure came out of the response phase itself.
    pub async fn dispatch(
        &self,
        req: &RequestContext,
        view: Option<&Arc<dyn View>>,
        scope: &[Arc<dyn Connection>],
        settings: &Settings,
    ) -> Response<ResponseBody> {
        let middlewares = self.middlewares();
        let mut responding = false;

        let result = atomic(scope, self.run(middlewares, req, view, &mut responding)).await;
        match result {
            Ok(response) => response,
            Err(e) if responding => error_response(req, &e, settings),
            Err(e) => {
                let response = error_response(req, &e, settings);
                match self.process_response(middlewares, req, response).await {
                    Ok(response) => response,
                    Err(e) => error_response(req, &e, settings),
                }
            }
        }
    }

    async fn run(
        &self,
        middlewares: &[Arc<dyn Middleware>],
        req: &RequestContext,
        view: Option<&Arc<dyn View>>,
        responding: &mut bool,
    ) -> Result<Response<ResponseBody>, HandlerError> {
        let response = self.handle_request(middlewares, req, view).await?;
        *responding = true;
        self.process_response(middlewares, req, response).await
    }

    async fn process_response(
        &self,
        middlewares: &[Arc<dyn Middleware>],
        req: &RequestContext,
        mut response: Response<ResponseBody>,
    ) -> Result<Response<ResponseBody>, HandlerError> {
        for middleware in middlewares.iter().rev() {
            response = middleware.process_response(req, response).await?;
        }
        Ok(response)
    }

    async fn handle_request(
        &self,
        middlewares: &[Arc<dyn Middleware>],
        req: &RequestContext,
        view: Option<&Arc<dyn View>>,
    ) -> Result<Response<ResponseBody>, HandlerError> {
        for middleware in middlewares {
            if let Some(response) = middleware.process_request(req).await? {
                return Ok(response);
            }
        }

        let Some(view) = view else {
            return Err(HandlerError::not_found(req.path()));
        };

        for middleware in middlewares {
            if let Some(response) = middleware.process_view(req, view.as_ref()).await? {
                return Ok(response);
            }
        }

        match view.call(req).await {
            Ok(response) => Ok(response),
            Err(e) => {
                for middleware in middlewares {
                    if let Some(response) = middleware.process_exception(req, &e).await {
                        return Ok(response);
                    }
                }
                Err(e)
            }
        }
    }
}

/// Translates an error nothing else handled into a response.
pub fn error_response(req: &RequestContext, error: &HandlerError, settings: &Settings) -> Response<ResponseBody> {
    let status = error.status_code();
    let body = match error {
        HandlerError::SuspiciousOperation { kind, .. } => {
            warn!(target: "security", kind = %kind, path = req.path(), cause = %error, "suspicious operation");
            ResponseBody::from("Bad Request (400)")
        }
        HandlerError::PermissionDenied { .. } => {
            warn!(path = req.path(), cause = %error, "forbidden");
            ResponseBody::from("Forbidden (403)")
        }
        HandlerError::NotFound { .. } => {
            warn!(path = req.path(), "not found");
            ResponseBody::from("Not Found (404)")
        }
        HandlerError::Transaction { .. } | HandlerError::Other(_) => {
            error!(path = req.path(), cause = %error, "internal server error");
            if settings.debug {
                ResponseBody::from(format!("Internal Server Error (500)\n\n{error}"))
            } else {
                ResponseBody::from("Internal Server Error (500)")
            }
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, text_content_type(settings));
    response
}

pub(crate) fn text_content_type(settings: &Settings) -> HeaderValue {
    HeaderValue::from_str(&format!("text/plain; charset={}", settings.default_charset))
        .unwrap_or_else(|_| HeaderValue::from_static("text/plain; charset=utf-8"))
}
