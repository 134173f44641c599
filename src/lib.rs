//! # Turnpike
//!
//! **Turnpike** is a type-driven HTTP request-dispatch engine: it turns an
//! inbound request into a resolved handler invocation, and turns whatever
//! the handler produced - or threw - into a rendered response, entirely
//! through lookup tables built once at startup.
//!
//! ## Overview
//!
//! Turnpike is not a server. The surrounding transport layer parses HTTP,
//! implements the [`transport`] boundary traits, and opens a
//! [`RequestContext`](context::RequestContext) per request; everything
//! after that is the engine's job:
//!
//! - **[`router`]** - explicit route registration and first-match-wins
//!   resolution, keyed by HTTP method
//! - **[`matcher`]** - pluggable pattern matching with named-capture
//!   extraction and a shared compiled-pattern cache
//! - **[`mapper`]** - the two type-keyed tables: argument mappers
//!   (parameter metadata → request value) and return mappers (result or
//!   error type → rendered response, memoized per concrete type)
//! - **[`completion`]** - the CAS-guarded OPEN→STARTED→COMPLETED machine
//!   that makes completion exactly-once under races between success,
//!   failure, timeout, and transport errors
//! - **[`executor`]** - the bounded `may` coroutine pool that keeps
//!   blocking work off the transport thread
//! - **[`components`]** - an explicitly wired dependency-injection
//!   registry with topological construction order
//! - **[`dispatcher`]** - the orchestrator tying the above together
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use turnpike::{
//!     config::DispatchConfig,
//!     dispatcher::Dispatcher,
//!     handler::Args,
//!     context::RequestContext,
//!     mapper::{Outcome, ParamDecl, ParamSpec},
//!     router::{Route, RoutingTable},
//! };
//!
//! let routes = RoutingTable::builder()
//!     .route(
//!         Route::new("^/users/(?<id>[0-9]+)$", |_ctx: &RequestContext, args: &Args| {
//!             Outcome::json(serde_json::json!({ "id": args.str(0) }))
//!         })
//!         .named("get_user")
//!         .param(ParamDecl::of(ParamSpec::path("id"))),
//!     )
//!     .build();
//!
//! let dispatcher = Dispatcher::builder(DispatchConfig::from_env())
//!     .routes(routes)
//!     .build();
//!
//! // Per request, the transport layer does:
//! // let ctx = RequestContext::open(request, response, async_ctx);
//! // dispatcher.handle(ctx);
//! ```
//!
//! ## Runtime considerations
//!
//! Turnpike uses the `may` coroutine runtime for its worker pool, not
//! tokio. Handlers run on pool coroutines; stack size and pool width are
//! configured through [`DispatchConfig`](config::DispatchConfig)
//! (`TURNPIKE_*` environment variables). Transport callbacks - timeout,
//! async error - may arrive on any thread the transport owns; the
//! completion state machine makes the races safe.

pub mod completion;
pub mod components;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod filter;
pub mod handler;
pub mod ids;
pub mod mapper;
pub mod matcher;
pub mod router;
pub mod transport;
pub mod typed;

pub use completion::{CompletionPhase, CompletionState};
pub use config::DispatchConfig;
pub use context::RequestContext;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::DispatchError;
pub use filter::Filter;
pub use handler::{Args, Handler};
pub use ids::RequestId;
pub use mapper::{Outcome, OutcomeKind, Response};
pub use matcher::{ParamVec, PathMatcher, RegexPathMatcher, TemplatePathMatcher};
pub use router::{Route, RoutingTable};
