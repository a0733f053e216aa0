//! Request dispatch for gateway environments.
//!
//! A [`Dispatcher`] receives decoded requests from [`gate_http`], resolves
//! them to a [`View`] and runs them through a lazily built chain of
//! [`Middleware`]s, optionally inside a database transaction, while emitting
//! `started` / `finished` [`signal`]s.
//!
//! # Example
//!
//! ```
//! use gate_http::environ::Environ;
//! use gate_web::{Dispatcher, RequestContext, Router, view_fn};
//! use http::StatusCode;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let router = Router::builder()
//!     .route("/hello/{name}", view_fn(|req: RequestContext| async move {
//!         format!("hello {}", req.path_params().get("name").unwrap_or("nobody"))
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::builder().resolver(router).build().unwrap();
//!
//! let environ = Environ::builder().get("/hello/world").build();
//! let response = dispatcher.handle(Some(environ), |_status, _headers| {}).await.unwrap();
//!
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.body().as_bytes(), Some(&b"hello world"[..]));
//! # }
//! ```

mod body;
mod error;
mod request;
mod responder;

pub mod chain;
pub mod decorator;
pub mod dispatcher;
pub mod middleware;
pub mod router;
pub mod settings;
pub mod signal;
pub mod transaction;
pub mod view;

pub use body::ResponseBody;
pub use chain::{ChainState, MiddlewareChain};
pub use dispatcher::{Dispatcher, DispatcherBuildError, DispatcherBuilder};
pub use error::{BoxError, ConfigError, HandlerError, TransactionError};
pub use middleware::{Middleware, MiddlewareRegistry, MiddlewareSource};
pub use request::{PathParams, RequestContext};
pub use responder::{Responder, text_response};
pub use router::{Resolver, ResolverMatch, Router};
pub use settings::{DatabaseSettings, Settings};
pub use signal::{LifecycleEvent, Signal, Signals};
pub use transaction::{Connection, TransactionWrapper};
pub use view::{View, non_atomic_requests, view_fn};
