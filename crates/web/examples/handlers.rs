//! Feeds a few requests through a dispatcher and prints the answers.
//!
//! run with `cargo run -p gate-web --example handlers`

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use gate_http::environ::Environ;
use gate_web::{
    Dispatcher, HandlerError, Middleware, MiddlewareRegistry, RequestContext, ResponseBody, Router, Settings, view_fn,
};
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

struct Timing;

#[async_trait]
impl Middleware for Timing {
    async fn process_request(&self, req: &RequestContext) -> Result<Option<Response<ResponseBody>>, HandlerError> {
        info!(method = %req.method(), path = req.path(), "request");
        Ok(None)
    }

    async fn process_response(
        &self,
        req: &RequestContext,
        response: Response<ResponseBody>,
    ) -> Result<Response<ResponseBody>, HandlerError> {
        info!(path = req.path(), status = %response.status(), "response");
        Ok(response)
    }
}

async fn hello(req: RequestContext) -> String {
    let name = req.path_params().get("name").unwrap_or("world");
    format!("hello {name}, you want {}\r\n", req.query().get("want").unwrap_or("nothing"))
}

async fn stream(_req: RequestContext) -> ResponseBody {
    ResponseBody::from_chunks(vec![Bytes::from_static(b"streaming "), Bytes::from_static(b"content\r\n")])
}

async fn admin(_req: RequestContext) -> Result<&'static str, HandlerError> {
    Err(HandlerError::permission_denied("staff only"))
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder()
        .route("/hello/{name}", view_fn(hello))
        .route("/stream/", view_fn(stream))
        .route("/admin/", view_fn(admin))
        .build()
        .expect("routes should not conflict");

    let dispatcher = Dispatcher::builder()
        .resolver(router)
        .middleware(MiddlewareRegistry::builder().register("timing", |_: &Settings| Ok(Timing)).build())
        .settings(Settings { middleware: vec!["timing".to_string()], ..Settings::default() })
        .build()
        .expect("resolver is set");

    dispatcher.signals().finished.connect(|event| info!(%event, "signal"));

    for uri in ["/hello/gate?want=caf%C3%A9", "/stream/", "/admin/", "/caf%E9/"] {
        let request = Request::get(uri).body(Full::new(Bytes::new())).expect("valid request");
        let environ = Environ::from_http_request(request).await.expect("in-memory body");

        let start = Instant::now();
        let response = dispatcher
            .handle(Some(environ), |status, headers| info!(%status, headers = headers.len(), "start_response"))
            .await
            .expect("chain should load");
        let status = response.status();
        let body = response.into_body().collect().await.expect("body should drain").to_bytes();

        println!("{uri} -> {status} {:?} in {:?}", String::from_utf8_lossy(&body), start.elapsed());
    }
}
