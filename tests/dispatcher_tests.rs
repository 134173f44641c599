//! End-to-end tests for the dispatch pipeline
//!
//! # Test Coverage
//!
//! - Full flow through `handle`: route → args → handler → rendered JSON
//! - Routing failures rendered as 404 / 405
//! - Filter rejection, including a custom return mapper matching the
//!   filter's concrete error type through the anyhow wrapper
//! - Handler errors and panics rendered as 500s
//! - Payload-too-large refused before the handler runs
//! - Body buffered once and shared by two body-consuming parameters
//! - Overload path when the executor refuses the submission

mod common;

use common::{open_ctx, MockRequest};
use http::Method;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use turnpike::config::DispatchConfig;
use turnpike::context::RequestContext;
use turnpike::dispatcher::Dispatcher;
use turnpike::handler::Args;
use turnpike::mapper::args::{ParamDecl, ParamSpec};
use turnpike::mapper::returns::{write_response, Outcome, Response, ReturnMapper};
use turnpike::router::{Route, RoutingTable};

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> DispatchConfig {
    DispatchConfig {
        workers: 2,
        max_body_bytes: 256,
        ..DispatchConfig::default()
    }
}

#[test]
fn test_handle_renders_json_from_matched_route() {
    common::init_tracing();
    let routes = RoutingTable::builder()
        .route(
            Route::new("^/users/(?<id>[0-9]+)$", |_ctx: &RequestContext, args: &Args| {
                Outcome::json(serde_json::json!({ "id": args.str(0) }))
            })
            .named("get_user")
            .param(ParamDecl::of(ParamSpec::path("id"))),
        )
        .build();
    let dispatcher = Dispatcher::builder(test_config()).routes(routes).build();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/users/42?verbose=1"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT), "request should complete");

    let record = record.lock().unwrap();
    assert_eq!(record.status, 200);
    assert_eq!(record.header("content-type"), Some("application/json"));
    assert_eq!(record.body_json()["id"], "42");
}

#[test]
fn test_unmatched_route_renders_404() {
    common::init_tracing();
    let dispatcher = Dispatcher::builder(test_config()).build();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/nowhere"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));

    let record = record.lock().unwrap();
    assert_eq!(record.status, 404);
    assert!(record.body_json()["error"]
        .as_str()
        .unwrap_or_default()
        .contains("no route"));
}

#[test]
fn test_wrong_method_renders_405() {
    common::init_tracing();
    let routes = RoutingTable::builder()
        .route(
            Route::new("^/items$", |_: &RequestContext, _: &Args| Outcome::unit())
                .method(Method::POST),
        )
        .build();
    let dispatcher = Dispatcher::builder(test_config()).routes(routes).build();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/items"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));
    assert_eq!(record.lock().unwrap().status, 405);
}

#[derive(Debug)]
struct AccessDenied;

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "access denied")
    }
}

impl std::error::Error for AccessDenied {}

struct AccessDeniedMapper;

impl ReturnMapper for AccessDeniedMapper {
    fn accepts(&self, outcome: &Outcome) -> bool {
        outcome.is_failure() && outcome.downcast_ref::<AccessDenied>().is_some()
    }

    fn render(&self, ctx: &RequestContext, _outcome: &Outcome) -> anyhow::Result<()> {
        write_response(ctx, &Response::error(403, "access denied"))
    }
}

#[test]
fn test_filter_rejection_skips_handler_and_maps_error_type() {
    common::init_tracing();
    let invoked = Arc::new(AtomicBool::new(false));
    let invoked_probe = invoked.clone();
    let routes = RoutingTable::builder()
        .route(
            Route::new("^/admin$", move |_: &RequestContext, _: &Args| {
                invoked_probe.store(true, Ordering::SeqCst);
                Outcome::unit()
            })
            .filter(Arc::new(|_ctx: &RequestContext| -> anyhow::Result<()> {
                Err(anyhow::Error::from(AccessDenied).context("admin filter"))
            })),
        )
        .build();
    let dispatcher = Dispatcher::builder(test_config())
        .routes(routes)
        .return_mapper(Arc::new(AccessDeniedMapper))
        .build();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/admin"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));

    // The filter's concrete error type was matched through the anyhow
    // wrapper; the handler never ran.
    assert_eq!(record.lock().unwrap().status, 403);
    assert!(!invoked.load(Ordering::SeqCst));
}

#[test]
fn test_handler_error_renders_500_with_message() {
    common::init_tracing();
    let routes = RoutingTable::builder()
        .route(Route::new("^/fail$", |_: &RequestContext, _: &Args| {
            Outcome::failure(AccessDenied)
        }))
        .build();
    let dispatcher = Dispatcher::builder(test_config()).routes(routes).build();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/fail"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));

    let record = record.lock().unwrap();
    assert_eq!(record.status, 500);
    assert_eq!(record.body_json()["error"], "access denied");
}

#[test]
fn test_handler_panic_renders_500() {
    common::init_tracing();
    let routes = RoutingTable::builder()
        .route(Route::new(
            "^/explode$",
            |_: &RequestContext, _: &Args| -> Outcome { panic!("handler exploded") },
        ))
        .build();
    let dispatcher = Dispatcher::builder(test_config()).routes(routes).build();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/explode"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));

    let record = record.lock().unwrap();
    assert_eq!(record.status, 500);
    assert!(record.body_json()["error"]
        .as_str()
        .unwrap_or_default()
        .contains("exploded"));
}

#[test]
fn test_oversized_body_refused_before_handler_runs() {
    common::init_tracing();
    let invoked = Arc::new(AtomicBool::new(false));
    let invoked_probe = invoked.clone();
    let routes = RoutingTable::builder()
        .route(
            Route::new("^/upload$", move |_: &RequestContext, _: &Args| {
                invoked_probe.store(true, Ordering::SeqCst);
                Outcome::unit()
            })
            .method(Method::POST)
            .param(ParamDecl::of(ParamSpec::body())),
        )
        .build();
    let dispatcher = Dispatcher::builder(test_config()).routes(routes).build();

    let (ctx, record, async_ctx) = open_ctx(
        MockRequest::post("/upload")
            .with_unsized_body(b"small".to_vec())
            .with_declared_length(100_000),
    );
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));

    assert_eq!(record.lock().unwrap().status, 413);
    assert!(!invoked.load(Ordering::SeqCst));
}

#[test]
fn test_two_body_params_share_one_buffer() {
    common::init_tracing();
    let routes = RoutingTable::builder()
        .route(
            Route::new("^/echo$", |_: &RequestContext, args: &Args| {
                // Slot 0: parsed JSON; slot 1: raw text of the same body.
                let parsed = args.get(0).cloned().unwrap_or(serde_json::Value::Null);
                let raw = args.str(1).unwrap_or_default().to_string();
                Outcome::json(serde_json::json!({ "parsed": parsed, "raw": raw }))
            })
            .method(Method::POST)
            .param(ParamDecl::of(ParamSpec::json_body()))
            .param(ParamDecl::of(ParamSpec::body())),
        )
        .build();
    let dispatcher = Dispatcher::builder(test_config()).routes(routes).build();

    let (ctx, record, async_ctx) =
        open_ctx(MockRequest::post("/echo").with_body(br#"{"name":"fluffy"}"#.to_vec()));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));

    let record = record.lock().unwrap();
    assert_eq!(record.status, 200);
    let body = record.body_json();
    assert_eq!(body["parsed"]["name"], "fluffy");
    // The raw mapper saw the same bytes even though the stream was
    // already drained by the JSON mapper: the buffer was reused.
    assert_eq!(body["raw"], r#"{"name":"fluffy"}"#);
}

#[test]
fn test_shutdown_renders_overloaded() {
    common::init_tracing();
    let dispatcher = Dispatcher::builder(test_config()).build();
    dispatcher.shutdown();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/any"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));
    assert_eq!(record.lock().unwrap().status, 503);
}

#[test]
fn test_dispatch_now_runs_synchronously() {
    common::init_tracing();
    let routes = RoutingTable::builder()
        .route(Route::new("^/sync$", |_: &RequestContext, _: &Args| {
            Outcome::success("sync".to_string())
        }))
        .build();
    let dispatcher = Dispatcher::builder(test_config()).routes(routes).build();

    let (ctx, record, async_ctx) = open_ctx(MockRequest::get("/sync"));
    dispatcher.dispatch_now(ctx);

    // No waiting: the calling thread did the work.
    assert_eq!(async_ctx.completion_count(), 1);
    let record = record.lock().unwrap();
    assert_eq!(record.status, 200);
    assert_eq!(record.body_text(), "sync");
    assert!(record
        .header("content-type")
        .unwrap_or_default()
        .starts_with("text/plain"));
}

#[test]
fn test_timeout_is_armed_from_config() {
    common::init_tracing();
    let config = DispatchConfig {
        timeout_ms: 1234,
        ..test_config()
    };
    let routes = RoutingTable::builder()
        .route(Route::new("^/t$", |_: &RequestContext, _: &Args| {
            Outcome::unit()
        }))
        .build();
    let dispatcher = Dispatcher::builder(config).routes(routes).build();

    let (ctx, _, async_ctx) = open_ctx(MockRequest::get("/t"));
    dispatcher.handle(ctx);
    assert!(async_ctx.wait_completed(WAIT));
    assert_eq!(
        async_ctx.armed_timeout(),
        Some(Some(Duration::from_millis(1234)))
    );
}
