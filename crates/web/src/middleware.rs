//! Middleware hooks and the registry building them from settings.
//!
//! A [`Middleware`] can take part in four phases of a request:
//!
//! 1. `process_request`: before resolution; returning a response skips the view
//! 2. `process_view`: right before the view; returning a response skips it
//! 3. `process_exception`: when the view fails; the first response wins
//! 4. `process_response`: on the way out, in reverse order
//!
//! Every hook defaults to doing nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::Response;
use tracing::{debug, info};

use crate::body::ResponseBody;
use crate::error::{ConfigError, HandlerError};
use crate::request::RequestContext;
use crate::settings::Settings;
use crate::view::View;

pub type MiddlewareResult = Result<Option<Response<ResponseBody>>, HandlerError>;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process_request(&self, _req: &RequestContext) -> MiddlewareResult {
        Ok(None)
    }

    async fn process_view(&self, _req: &RequestContext, _view: &dyn View) -> MiddlewareResult {
        Ok(None)
    }

    async fn process_exception(&self, _req: &RequestContext, _error: &HandlerError) -> Option<Response<ResponseBody>> {
        None
    }

    async fn process_response(
        &self,
        _req: &RequestContext,
        response: Response<ResponseBody>,
    ) -> Result<Response<ResponseBody>, HandlerError> {
        Ok(response)
    }
}

/// Builds the ordered middleware list for the active settings.
pub trait MiddlewareSource: Send + Sync {
    fn load(&self, settings: &Settings) -> Result<Vec<Arc<dyn Middleware>>, ConfigError>;
}

impl<F> MiddlewareSource for F
where
    F: Fn(&Settings) -> Result<Vec<Arc<dyn Middleware>>, ConfigError> + Send + Sync,
{
    fn load(&self, settings: &Settings) -> Result<Vec<Arc<dyn Middleware>>, ConfigError> {
        self(settings)
    }
}

type Factory = Box<dyn Fn(&Settings) -> Result<Arc<dyn Middleware>, ConfigError> + Send + Sync>;

/// Resolves the names listed in [`Settings::middleware`] to factories.
///
/// A factory returning [`ConfigError::NotUsed`] is left out of the chain.
pub struct MiddlewareRegistry {
    factories: HashMap<String, Factory>,
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry").field("names", &self.factories.keys().collect::<Vec<_>>()).finish()
    }
}

impl MiddlewareRegistry {
    pub fn builder() -> MiddlewareRegistryBuilder {
        MiddlewareRegistryBuilder::new()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl MiddlewareSource for MiddlewareRegistry {
    fn load(&self, settings: &Settings) -> Result<Vec<Arc<dyn Middleware>>, ConfigError> {
        let mut middlewares = Vec::with_capacity(settings.middleware.len());

        for name in &settings.middleware {
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| ConfigError::improperly_configured(format!("middleware `{name}` is not registered")))?;

            match factory(settings) {
                Ok(middleware) => middlewares.push(middleware),
                Err(ConfigError::NotUsed) => debug!(name = %name, "middleware not used"),
                Err(e) => return Err(e),
            }
        }

        info!(count = middlewares.len(), "middleware chain loaded");
        Ok(middlewares)
    }
}

pub struct MiddlewareRegistryBuilder {
    factories: HashMap<String, Factory>,
}

impl fmt::Debug for MiddlewareRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistryBuilder").finish_non_exhaustive()
    }
}

impl MiddlewareRegistryBuilder {
    fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register<F, M>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Settings) -> Result<M, ConfigError> + Send + Sync + 'static,
        M: Middleware + 'static,
    {
        let factory: Factory = Box::new(move |settings| {
            let middleware: Arc<dyn Middleware> = Arc::new(factory(settings)?);
            Ok(middleware)
        });
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn build(self) -> MiddlewareRegistry {
        MiddlewareRegistry { factories: self.factories }
    }
}
