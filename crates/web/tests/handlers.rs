use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use gate_http::environ::Environ;
use gate_http::protocol::Request;
use gate_web::{
    ChainState, ConfigError, Connection, DatabaseSettings, Dispatcher, HandlerError, Middleware, MiddlewareRegistry,
    RequestContext, ResponseBody, Router, Settings, TransactionError, non_atomic_requests, view_fn,
};
use http::{Response, StatusCode};
use http_body_util::BodyExt;

/// A connection keeping track of how many transactions are open.
#[derive(Debug, Default)]
struct MemoryConnection {
    depth: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn alias(&self) -> &str {
        "default"
    }

    async fn begin(&self) -> Result<(), TransactionError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<(), TransactionError> {
        self.depth.fetch_sub(1, Ordering::SeqCst);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), TransactionError> {
        self.depth.fetch_sub(1, Ordering::SeqCst);
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn in_atomic_block(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }
}

fn router(connection: &Arc<MemoryConnection>) -> Router {
    let in_transaction = Arc::clone(connection);
    let not_in_transaction = Arc::clone(connection);
    let failing = Arc::clone(connection);

    Router::builder()
        .route("/regular/", view_fn(|_req| async { "regular content" }))
        .route(
            "/streaming/",
            view_fn(|_req| async {
                ResponseBody::from_chunks(vec![Bytes::from_static(b"streaming "), Bytes::from_static(b"content")])
            }),
        )
        .route(
            "/in_transaction/",
            view_fn(move |_req| {
                let connection = Arc::clone(&in_transaction);
                async move { connection.in_atomic_block().to_string() }
            }),
        )
        .route(
            "/not_in_transaction/",
            non_atomic_requests(view_fn(move |_req| {
                let connection = Arc::clone(&not_in_transaction);
                async move { connection.in_atomic_block().to_string() }
            })),
        )
        .route(
            "/failing_in_transaction/",
            view_fn(move |_req| {
                let connection = Arc::clone(&failing);
                async move {
                    assert!(connection.in_atomic_block());
                    Err::<String, _>(HandlerError::other(std::io::Error::other("write failed")))
                }
            }),
        )
        .route(
            "/suspicious/",
            view_fn(|_req| async { Err::<String, _>(HandlerError::suspicious_operation("DisallowedHost", "dubious")) }),
        )
        .route("/query/", view_fn(|req: RequestContext| async move { req.query().get("want").unwrap_or_default().to_string() }))
        .build()
        .unwrap()
}

fn dispatcher_with(connection: &Arc<MemoryConnection>, settings: Settings) -> Dispatcher {
    Dispatcher::builder()
        .resolver(router(connection))
        .settings(settings)
        .connection(Arc::clone(connection) as Arc<dyn Connection>)
        .build()
        .unwrap()
}

fn dispatcher() -> Dispatcher {
    dispatcher_with(&Arc::new(MemoryConnection::default()), Settings::default())
}

async fn get(dispatcher: &Dispatcher, environ: Environ) -> Response<ResponseBody> {
    dispatcher.handle(Some(environ), |_, _| {}).await.unwrap()
}

async fn body_text(response: Response<ResponseBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn lock_safety() {
    let dispatcher = Dispatcher::builder()
        .resolver(router(&Arc::new(MemoryConnection::default())))
        .middleware(MiddlewareRegistry::builder().build())
        .settings(Settings { middleware: vec!["42".to_string()], ..Settings::default() })
        .build()
        .unwrap();
    assert!(!dispatcher.is_chain_locked());
    assert_eq!(dispatcher.chain_state(), ChainState::Idle);

    let result = dispatcher.handle(None, |_, _| panic!("start_response must not be called")).await;

    assert!(matches!(result, Err(ConfigError::ImproperlyConfigured { .. })));
    assert!(!dispatcher.is_chain_locked());
    assert_eq!(dispatcher.chain_state(), ChainState::Failed);

    dispatcher.update_settings(|settings| settings.middleware.clear());
    let response = get(&dispatcher, Environ::builder().get("/regular/").build()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dispatcher.chain_state(), ChainState::Ready);
}

#[tokio::test]
async fn bad_path_info() {
    let dispatcher = dispatcher();

    let response = get(&dispatcher, Environ::builder().raw_path(&b"\xed"[..]).build()).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_environ_is_not_found() {
    let dispatcher = dispatcher();
    let mut status = None;

    let response = dispatcher.handle(None, |code, _| status = Some(code)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(status, Some(StatusCode::NOT_FOUND));
}

#[test]
fn non_ascii_query_string() {
    let raw_query_strings: [&[u8]; 4] = [b"want=caf%C3%A9", b"want=caf\xc3\xa9", b"want=caf%E9", b"want=caf\xe9"];

    let got = raw_query_strings
        .iter()
        .map(|raw| {
            let environ = Environ::builder().get("/").query_string(Bytes::copy_from_slice(raw)).build();
            let request = Request::from_environ(environ).unwrap();
            request.query().get("want").unwrap().to_string()
        })
        .collect::<Vec<_>>();

    assert_eq!(got, ["café", "café", "caf\u{fffd}", "café"]);
}

#[tokio::test]
async fn non_ascii_query_string_through_the_dispatcher() {
    let dispatcher = dispatcher();

    let response = get(&dispatcher, Environ::builder().get("/query/").query_string(&b"want=caf\xe9"[..]).build()).await;

    assert_eq!(body_text(response).await, "café");
}

#[test]
fn non_ascii_cookie() {
    let environ = Environ::builder().cookie("want=\"café\"").build();

    let request = Request::from_environ(environ).unwrap();

    assert_eq!(request.cookie("want"), Some("café"));
}

#[test]
fn invalid_unicode_cookie() {
    let environ = Environ::builder().cookie(&b"x=W\x03c(h]\x8e"[..]).build();

    let request = Request::from_environ(environ).unwrap();

    assert!(request.cookies().get("x").is_none());
}

#[tokio::test]
async fn no_transaction() {
    let dispatcher = dispatcher();

    let response = get(&dispatcher, Environ::builder().get("/in_transaction/").build()).await;

    assert_eq!(body_text(response).await, "false");
}

#[tokio::test]
async fn auto_transaction() {
    let connection = Arc::new(MemoryConnection::default());
    let dispatcher = dispatcher_with(&connection, Settings::default());

    dispatcher.update_settings(|settings| {
        if let Some(database) = settings.database_mut("default") {
            database.atomic_requests = true;
        }
    });
    let response = get(&dispatcher, Environ::builder().get("/in_transaction/").build()).await;

    assert_eq!(body_text(response).await, "true");
    assert_eq!(connection.commits.load(Ordering::SeqCst), 1);
    assert!(!connection.in_atomic_block());
}

#[tokio::test]
async fn no_auto_transaction() {
    let connection = Arc::new(MemoryConnection::default());
    let settings = Settings { databases: vec![DatabaseSettings::atomic("default")], ..Settings::default() };
    let dispatcher = dispatcher_with(&connection, settings);

    let response = get(&dispatcher, Environ::builder().get("/not_in_transaction/").build()).await;

    assert_eq!(body_text(response).await, "false");
    assert_eq!(connection.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_view_rolls_back() {
    let connection = Arc::new(MemoryConnection::default());
    let settings = Settings { databases: vec![DatabaseSettings::atomic("default")], ..Settings::default() };
    let dispatcher = dispatcher_with(&connection, settings);

    let response = get(&dispatcher, Environ::builder().get("/failing_in_transaction/").build()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(connection.rollbacks.load(Ordering::SeqCst), 1);
    assert_eq!(connection.commits.load(Ordering::SeqCst), 0);
    assert!(!connection.in_atomic_block());
}

fn record_signals(dispatcher: &Dispatcher) -> Arc<Mutex<Vec<&'static str>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let started = Arc::clone(&seen);
    dispatcher.signals().started.connect(move |event| started.lock().unwrap().push(event.as_str()));
    let finished = Arc::clone(&seen);
    dispatcher.signals().finished.connect(move |event| finished.lock().unwrap().push(event.as_str()));

    seen
}

#[tokio::test]
async fn request_signals() {
    let dispatcher = dispatcher();
    let seen = record_signals(&dispatcher);

    let response = get(&dispatcher, Environ::builder().get("/regular/").build()).await;

    assert_eq!(*seen.lock().unwrap(), ["started", "finished"]);
    assert_eq!(body_text(response).await, "regular content");
}

#[tokio::test]
async fn request_signals_streaming_response() {
    let dispatcher = dispatcher();
    let seen = record_signals(&dispatcher);

    let response = get(&dispatcher, Environ::builder().get("/streaming/").build()).await;

    assert_eq!(*seen.lock().unwrap(), ["started"]);
    assert_eq!(body_text(response).await, "streaming content");
    assert_eq!(*seen.lock().unwrap(), ["started", "finished"]);
}

#[tokio::test]
async fn suspicious_operation_in_view_returns_400() {
    let dispatcher = dispatcher();

    let response = get(&dispatcher, Environ::builder().get("/suspicious/").build()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_urls() {
    let dispatcher = dispatcher();

    for target in ["~%A9helloworld", "d%aao%aaw%aan%aal%aao%aaa%aad%aa/", "/%E2%99%E2%99%A5/"] {
        let response = get(&dispatcher, Environ::builder().get(target).build()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{target}");
    }
}

struct Counting {
    seen: Arc<AtomicUsize>,
}

#[async_trait]
impl Middleware for Counting {
    async fn process_request(&self, _req: &RequestContext) -> Result<Option<Response<ResponseBody>>, HandlerError> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

struct Deny;

#[async_trait]
impl Middleware for Deny {
    async fn process_request(&self, req: &RequestContext) -> Result<Option<Response<ResponseBody>>, HandlerError> {
        if req.path().starts_with("/regular/") { Err(HandlerError::permission_denied("staff only")) } else { Ok(None) }
    }
}

#[tokio::test]
async fn registry_builds_the_configured_chain() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let builds = Arc::new(AtomicUsize::new(0));
    let build_counter = Arc::clone(&builds);

    let registry = MiddlewareRegistry::builder()
        .register("counting", move |_: &Settings| {
            build_counter.fetch_add(1, Ordering::SeqCst);
            Ok(Counting { seen: Arc::clone(&counter) })
        })
        .register("deny", |_: &Settings| Ok(Deny))
        .register("debug_toolbar", |settings: &Settings| if settings.debug { Ok(Deny) } else { Err(ConfigError::NotUsed) })
        .build();
    let dispatcher = Dispatcher::builder()
        .resolver(router(&Arc::new(MemoryConnection::default())))
        .middleware(registry)
        .settings(Settings {
            middleware: vec!["counting".to_string(), "debug_toolbar".to_string(), "deny".to_string()],
            ..Settings::default()
        })
        .build()
        .unwrap();

    let response = get(&dispatcher, Environ::builder().get("/streaming/").build()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&dispatcher, Environ::builder().get("/regular/").build()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests() {
    let dispatcher = Arc::new(dispatcher());

    let tasks = (0..32)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let response = get(&dispatcher, Environ::builder().get("/regular/").build()).await;
                body_text(response).await
            })
        })
        .collect::<Vec<_>>();

    for task in tasks {
        assert_eq!(task.await.unwrap(), "regular content");
    }
    assert_eq!(dispatcher.chain_state(), ChainState::Ready);
}
