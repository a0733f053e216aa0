//! The request entry point.
//!
//! [`Dispatcher::handle`] takes one gateway environment through the whole
//! lifecycle:
//!
//! 1. make sure the middleware chain is built (a build failure is the only
//!    error `handle` returns)
//! 2. send `started`
//! 3. decode the request; a request that can't be decoded is answered 404
//! 4. resolve the view and run the chain, inside a transaction when the
//!    settings ask for one
//! 5. report status and headers through `start_response`
//! 6. send `finished`, right away for buffered bodies and once the body is
//!    drained for streaming ones

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use gate_http::environ::Environ;
use gate_http::protocol::Request;
use http::{HeaderMap, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::body::ResponseBody;
use crate::chain::{ChainState, MiddlewareChain, text_content_type};
use crate::error::ConfigError;
use crate::middleware::{MiddlewareRegistry, MiddlewareSource};
use crate::request::{PathParams, RequestContext};
use crate::router::Resolver;
use crate::settings::Settings;
use crate::signal::Signals;
use crate::transaction::{Connection, TransactionWrapper};

pub struct DispatcherBuilder {
    resolver: Option<Box<dyn Resolver>>,
    chain: Option<MiddlewareChain>,
    settings: Settings,
    connections: Vec<Arc<dyn Connection>>,
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder").field("settings", &self.settings).finish_non_exhaustive()
    }
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self { resolver: None, chain: None, settings: Settings::default(), connections: Vec::new() }
    }

    pub fn resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Where the middleware chain comes from; an empty registry by default.
    pub fn middleware(mut self, source: impl MiddlewareSource + 'static) -> Self {
        self.chain = Some(MiddlewareChain::new(source));
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn build(self) -> Result<Dispatcher, DispatcherBuildError> {
        let resolver = self.resolver.ok_or(DispatcherBuildError::MissingResolver)?;
        let chain = self.chain.unwrap_or_else(|| MiddlewareChain::new(MiddlewareRegistry::builder().build()));

        Ok(Dispatcher {
            resolver,
            chain,
            settings: ArcSwap::from_pointee(self.settings),
            signals: Signals::default(),
            transactions: TransactionWrapper::new(self.connections),
        })
    }
}

#[derive(Error, Debug)]
pub enum DispatcherBuildError {
    #[error("resolver must be set")]
    MissingResolver,
}

pub struct Dispatcher {
    resolver: Box<dyn Resolver>,
    chain: MiddlewareChain,
    settings: ArcSwap<Settings>,
    signals: Signals,
    transactions: TransactionWrapper,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chain", &self.chain)
            .field("settings", &self.settings.load())
            .field("signals", &self.signals)
            .field("transactions", &self.transactions)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Handles one request.
    ///
    /// `start_response` is called exactly once, with the final status and
    /// headers, before the response is returned. An absent `environ` is
    /// answered 404 like any other request that can't be decoded.
    pub async fn handle<S>(&self, environ: Option<Environ>, start_response: S) -> Result<Response<ResponseBody>, ConfigError>
    where
        S: FnOnce(StatusCode, &HeaderMap),
    {
        let settings = self.settings.load_full();
        self.chain.ensure_loaded(&settings).await?;

        self.signals.started.send();

        let response = match Request::decode(environ) {
            Ok(request) => self.dispatch(request, &settings).await,
            Err(e) => {
                warn!(cause = %e, "bad request environment");
                let mut response = Response::new(ResponseBody::from("Not Found (404)"));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response.headers_mut().insert(http::header::CONTENT_TYPE, text_content_type(&settings));
                response
            }
        };

        start_response(response.status(), response.headers());
        Ok(self.finish(response))
    }

    async fn dispatch(&self, request: Request, settings: &Settings) -> Response<ResponseBody> {
        let (view, params) = match self.resolver.resolve(request.path_info()) {
            Some(matched) => {
                debug!(path = request.path_info(), route = matched.route(), "resolved");
                let (view, params) = matched.into_parts();
                (Some(view), params)
            }
            None => (None, PathParams::empty()),
        };

        let scope = self.transactions.scope_for(settings, view.as_deref());
        let context = RequestContext::new(Arc::new(request), params);

        self.chain.dispatch(&context, view.as_ref(), &scope, settings).await
    }

    fn finish(&self, response: Response<ResponseBody>) -> Response<ResponseBody> {
        if response.body().is_stream() {
            let finished = Arc::clone(&self.signals.finished);
            response.map(|body| body.on_drained(move || finished.send()))
        } else {
            self.signals.finished.send();
            response
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Changes the settings seen by the next requests.
    pub fn update_settings<F>(&self, f: F)
    where
        F: Fn(&mut Settings),
    {
        self.settings.rcu(|current| {
            let mut next = Settings::clone(current);
            f(&mut next);
            next
        });
    }

    pub fn replace_settings(&self, settings: Settings) {
        self.settings.store(Arc::new(settings));
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn chain_state(&self) -> ChainState {
        self.chain.state()
    }

    pub fn is_chain_locked(&self) -> bool {
        self.chain.is_locked()
    }
}
