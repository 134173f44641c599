//! Tests for route registration and resolution
//!
//! # Test Coverage
//!
//! - First-match-wins across overlapping patterns
//! - Named capture extraction on the resolution path
//! - Default methods (GET + HEAD) when a route declares none
//! - Malformed patterns skipped at build time without aborting the table
//! - Not-found vs method-not-allowed discrimination

mod common;

use http::Method;
use std::sync::Arc;
use turnpike::context::RequestContext;
use turnpike::handler::Args;
use turnpike::mapper::Outcome;
use turnpike::matcher::TemplatePathMatcher;
use turnpike::router::{Route, RouteResolution, RoutingTable};

fn noop_route(pattern: &str) -> Route {
    Route::new(pattern, |_ctx: &RequestContext, _args: &Args| Outcome::unit())
}

#[test]
fn test_first_declared_match_wins() {
    common::init_tracing();
    let table = RoutingTable::builder()
        .route(noop_route("^/items/(?<rest>.+)$").named("wildcard"))
        .route(noop_route("^/items/special$").named("special"))
        .build();

    match table.resolve(&Method::GET, "/items/special") {
        RouteResolution::Matched { invokable, .. } => {
            assert_eq!(invokable.name(), "wildcard");
        }
        _ => panic!("expected a match"),
    }
}

#[test]
fn test_named_captures_on_resolution() {
    common::init_tracing();
    let table = RoutingTable::builder()
        .route(noop_route("^/users/(?<id>[0-9]+)$"))
        .build();

    match table.resolve(&Method::GET, "/users/42") {
        RouteResolution::Matched { params, .. } => {
            assert_eq!(params.len(), 1);
            assert_eq!(params[0].0.as_ref(), "id");
            assert_eq!(params[0].1, "42");
        }
        _ => panic!("expected a match"),
    }

    assert!(matches!(
        table.resolve(&Method::GET, "/users/abc"),
        RouteResolution::NotFound
    ));
}

#[test]
fn test_default_methods_are_get_and_head() {
    common::init_tracing();
    let table = RoutingTable::builder().route(noop_route("^/ping$")).build();

    assert_eq!(table.routes_for(&Method::GET).len(), 1);
    assert_eq!(table.routes_for(&Method::HEAD).len(), 1);
    assert!(table.routes_for(&Method::POST).is_empty());
    assert_eq!(table.route_count(), 2);
}

#[test]
fn test_malformed_route_is_skipped_not_fatal() {
    common::init_tracing();
    let table = RoutingTable::builder()
        .route(noop_route("^/broken/(unclosed$").named("broken"))
        .route(noop_route("^/ok$").named("ok"))
        .build();

    // The malformed route is gone; the good one still resolves.
    assert!(matches!(
        table.resolve(&Method::GET, "/broken/x"),
        RouteResolution::NotFound
    ));
    assert!(matches!(
        table.resolve(&Method::GET, "/ok"),
        RouteResolution::Matched { .. }
    ));
    assert_eq!(table.route_count(), 2); // GET + HEAD for "ok" only
}

#[test]
fn test_method_not_allowed_vs_not_found() {
    common::init_tracing();
    let table = RoutingTable::builder()
        .route(noop_route("^/items$").method(Method::POST))
        .build();

    assert!(matches!(
        table.resolve(&Method::GET, "/items"),
        RouteResolution::MethodNotAllowed
    ));
    assert!(matches!(
        table.resolve(&Method::GET, "/missing"),
        RouteResolution::NotFound
    ));
}

#[test]
fn test_route_with_template_matcher() {
    common::init_tracing();
    let table = RoutingTable::builder()
        .route(
            noop_route("/pets/{pet_id}")
                .matcher(Arc::new(TemplatePathMatcher::new()))
                .named("get_pet"),
        )
        .build();

    match table.resolve(&Method::GET, "/pets/99") {
        RouteResolution::Matched { params, .. } => {
            assert_eq!(params[0].0.as_ref(), "pet_id");
            assert_eq!(params[0].1, "99");
        }
        _ => panic!("expected a match"),
    }
}

#[test]
fn test_multi_method_registration() {
    common::init_tracing();
    let table = RoutingTable::builder()
        .route(noop_route("^/things$").methods([Method::GET, Method::POST, Method::PUT]))
        .build();

    for method in [Method::GET, Method::POST, Method::PUT] {
        assert!(matches!(
            table.resolve(&method, "/things"),
            RouteResolution::Matched { .. }
        ));
    }
    assert!(matches!(
        table.resolve(&Method::DELETE, "/things"),
        RouteResolution::MethodNotAllowed
    ));
}
