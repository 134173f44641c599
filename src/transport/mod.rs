//! # Transport Boundary Module
//!
//! Abstractions the dispatch engine consumes from the surrounding I/O
//! layer. The engine never parses wire-level HTTP itself: an embedding
//! server implements [`HttpRequest`], [`HttpResponse`], and
//! [`AsyncContext`] over its own connection types and hands them to
//! [`RequestContext::open`](crate::context::RequestContext::open) when a
//! request arrives.
//!
//! Completion, timeout, and transport-error events are delivered to the
//! engine as explicit calls on the dispatcher
//! ([`Dispatcher::on_timeout`](crate::dispatcher::Dispatcher::on_timeout),
//! [`Dispatcher::on_async_error`](crate::dispatcher::Dispatcher::on_async_error))
//! rather than registered listeners, so the transport owns its threads and
//! the engine owns the exactly-once completion guarantee.

mod context;
mod request;
mod response;

pub use context::AsyncContext;
pub use request::{parse_cookies, parse_query, HttpRequest};
pub(crate) use request::path_of;
pub use response::HttpResponse;
