//! Request context handed to middleware and views.
//!
//! - `RequestContext`: the decoded request plus the path parameters the
//!   resolver captured for it
//! - `PathParams`: named segments captured from the request path

use std::ops::Deref;
use std::sync::Arc;

use gate_http::protocol::Request;
use matchit::Params;

/// The decoded request together with its route match.
///
/// Cloning is cheap: the request itself is shared.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: Arc<Request>,
    path_params: PathParams,
}

impl RequestContext {
    pub fn new(request: Arc<Request>, path_params: PathParams) -> Self {
        Self { request, path_params }
    }

    /// Returns the shared request
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the path parameters captured by the resolver
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }
}

impl Deref for RequestContext {
    type Target = Request;

    fn deref(&self) -> &Self::Target {
        &self.request
    }
}

impl From<Request> for RequestContext {
    fn from(request: Request) -> Self {
        Self::new(Arc::new(request), PathParams::empty())
    }
}

/// Path parameters captured from the request path.
///
/// For the route `/articles/{year}/`, `year` is a path parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl From<Params<'_, '_>> for PathParams {
    fn from(params: Params<'_, '_>) -> Self {
        Self { params: params.iter().map(|(name, value)| (name.to_owned(), value.to_owned())).collect() }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { params: iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect() }
    }
}
