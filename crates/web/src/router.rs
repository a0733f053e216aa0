//! URL resolution.
//!
//! The dispatcher only knows the [`Resolver`] contract. [`Router`] is the
//! default implementation, backed by `matchit`; route syntax is matchit's
//! (`/articles/{year}/`, `/static/{*path}`).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::decorator::{Decorator, DecoratorComposer, DecoratorExt, IdentityDecorator};
use crate::request::PathParams;
use crate::view::View;

/// Maps a decoded path to the view answering it.
pub trait Resolver: Send + Sync {
    fn resolve(&self, path: &str) -> Option<ResolverMatch>;
}

/// A resolved route: the view, the captured parameters and the route pattern.
#[derive(Clone)]
pub struct ResolverMatch {
    view: Arc<dyn View>,
    params: PathParams,
    route: String,
}

impl ResolverMatch {
    pub fn new(view: Arc<dyn View>, params: PathParams, route: impl Into<String>) -> Self {
        Self { view, params, route: route.into() }
    }

    pub fn view(&self) -> &Arc<dyn View> {
        &self.view
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn into_parts(self) -> (Arc<dyn View>, PathParams) {
        (self.view, self.params)
    }
}

impl fmt::Debug for ResolverMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverMatch").field("route", &self.route).field("params", &self.params).finish_non_exhaustive()
    }
}

struct Route {
    pattern: String,
    view: Arc<dyn View>,
}

pub struct Router {
    inner: matchit::Router<Route>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl Router {
    pub fn builder() -> RouterBuilder<IdentityDecorator> {
        RouterBuilder::new()
    }

    /// Matches `path` against the registered routes.
    pub fn at(&self, path: &str) -> Option<ResolverMatch> {
        match self.inner.at(path) {
            Ok(matched) => Some(ResolverMatch {
                view: Arc::clone(&matched.value.view),
                params: matched.params.into(),
                route: matched.value.pattern.clone(),
            }),
            Err(e) => {
                trace!(path, cause = %e, "no route matched");
                None
            }
        }
    }
}

impl Resolver for Router {
    fn resolve(&self, path: &str) -> Option<ResolverMatch> {
        self.at(path)
    }
}

impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    fn resolve(&self, path: &str) -> Option<ResolverMatch> {
        (**self).resolve(path)
    }
}

pub struct RouterBuilder<D> {
    routes: HashMap<String, Box<dyn View>>,
    decorator: D,
}

impl<D> fmt::Debug for RouterBuilder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("routes", &self.routes.keys().collect::<Vec<_>>()).finish_non_exhaustive()
    }
}

impl RouterBuilder<IdentityDecorator> {
    fn new() -> Self {
        Self { routes: HashMap::new(), decorator: IdentityDecorator }
    }
}

impl<D> RouterBuilder<D> {
    /// Registers `view` at `route`; a later registration of the same route
    /// replaces the earlier one.
    pub fn route<V: View + 'static>(mut self, route: impl Into<String>, view: V) -> Self {
        self.routes.insert(route.into(), Box::new(view));
        self
    }

    /// Adds a decorator applied to every view when the router is built.
    pub fn with_global_decorator<D2>(self, decorator: D2) -> RouterBuilder<DecoratorComposer<D, D2>>
    where
        D: Decorator<Box<dyn View>>,
        D2: Decorator<D::Out>,
    {
        RouterBuilder { routes: self.routes, decorator: self.decorator.and_then(decorator) }
    }

    pub fn build(self) -> Result<Router, matchit::InsertError>
    where
        D: Decorator<Box<dyn View>>,
        D::Out: View + 'static,
    {
        let mut inner = matchit::Router::new();

        for (pattern, view) in self.routes {
            let view: Arc<dyn View> = Arc::new(self.decorator.decorate(view));
            inner.insert(pattern.clone(), Route { pattern, view })?;
        }

        Ok(Router { inner })
    }
}
