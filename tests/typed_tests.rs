//! Tests for the typed handler adapter
//!
//! # Test Coverage
//!
//! - Path, query, and JSON body fields merged into one decoded request
//! - JSON encoding of the typed response
//! - Decode failure rendered as 400 with the serde message

mod common;

use common::{open_ctx, MockRequest};
use http::Method;
use serde::{Deserialize, Serialize};
use turnpike::config::DispatchConfig;
use turnpike::dispatcher::Dispatcher;
use turnpike::mapper::args::{ParamDecl, ParamSpec};
use turnpike::router::{Route, RoutingTable};
use turnpike::typed::{typed, TypedRequest};

#[derive(Debug, Deserialize)]
struct CreatePet {
    id: String,
    name: String,
    collar: Option<String>,
}

#[derive(Debug, Serialize)]
struct PetCreated {
    id: String,
    label: String,
}

fn pet_dispatcher() -> Dispatcher {
    let routes = RoutingTable::builder()
        .route(
            Route::new(
                "^/pets/(?<id>[0-9]+)$",
                typed(|req: TypedRequest<CreatePet>| PetCreated {
                    id: req.data.id,
                    label: match req.data.collar {
                        Some(collar) => format!("{} ({})", req.data.name, collar),
                        None => req.data.name,
                    },
                }),
            )
            .method(Method::POST)
            .named("create_pet")
            .param(ParamDecl::of(ParamSpec::json_body())),
        )
        .build();
    Dispatcher::builder(DispatchConfig {
        workers: 1,
        ..DispatchConfig::default()
    })
    .routes(routes)
    .build()
}

#[test]
fn test_typed_handler_merges_path_query_and_body() {
    common::init_tracing();
    let dispatcher = pet_dispatcher();
    let (ctx, record, async_ctx) = open_ctx(
        MockRequest::post("/pets/7?collar=red").with_body(br#"{"name":"fluffy"}"#.to_vec()),
    );
    dispatcher.dispatch_now(ctx);

    assert_eq!(async_ctx.completion_count(), 1);
    let record = record.lock().unwrap();
    assert_eq!(record.status, 200);
    let body = record.body_json();
    assert_eq!(body["id"], "7");
    assert_eq!(body["label"], "fluffy (red)");
}

#[test]
fn test_typed_handler_decode_failure_renders_400() {
    common::init_tracing();
    let dispatcher = pet_dispatcher();
    // Body lacks the required "name" field.
    let (ctx, record, async_ctx) =
        open_ctx(MockRequest::post("/pets/7").with_body(br#"{"age": 3}"#.to_vec()));
    dispatcher.dispatch_now(ctx);

    assert_eq!(async_ctx.completion_count(), 1);
    let record = record.lock().unwrap();
    assert_eq!(record.status, 400);
    assert!(record.body_json()["error"]
        .as_str()
        .unwrap_or_default()
        .contains("invalid request data"));
}
