//! Dispatcher core - hot path for request dispatch.

use crate::completion::CompletionGuard;
use crate::config::DispatchConfig;
use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::executor::DispatchExecutor;
use crate::mapper::args::{ArgumentMapper, ArgumentMapperRegistry, ParamKind};
use crate::mapper::returns::{Outcome, ReturnMapper, ReturnMapperRegistry};
use crate::router::{RouteResolution, RoutingTable};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Immutable wiring shared by every dispatch worker.
struct DispatchCore {
    routes: RoutingTable,
    args: ArgumentMapperRegistry,
    returns: ReturnMapperRegistry,
    config: DispatchConfig,
}

/// The request-dispatch engine.
///
/// Cheap to clone - clones share the same wiring and executor. Built once
/// at startup via [`Dispatcher::builder`]; read-only thereafter except for
/// the return-type cache and the executor queue.
#[derive(Clone)]
pub struct Dispatcher {
    core: Arc<DispatchCore>,
    executor: Arc<DispatchExecutor>,
}

impl Dispatcher {
    pub fn builder(config: DispatchConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Accept a request whose async context was just opened.
    ///
    /// Arms the transport timeout and hands the blocking work to the
    /// executor; never blocks the calling (transport) thread. A rejected
    /// submission completes the request immediately with an overloaded
    /// outcome.
    pub fn handle(&self, ctx: Arc<RequestContext>) {
        ctx.async_context().set_timeout(self.core.config.timeout());
        info!(
            request_id = %ctx.id(),
            method = %ctx.method(),
            path = %ctx.path(),
            "Request accepted"
        );
        let core = self.core.clone();
        let worker_ctx = ctx.clone();
        let submitted = self
            .executor
            .submit(move || Self::process(&core, worker_ctx));
        if let Err(err) = submitted {
            warn!(
                request_id = %ctx.id(),
                error = %err,
                "Executor rejected request"
            );
            Self::finish(&self.core, ctx, Outcome::failure(DispatchError::Overloaded));
        }
    }

    /// Run the full resolution pipeline on the calling thread.
    ///
    /// The synchronous variant of [`handle`](Self::handle), for embedders
    /// that bring their own worker threads and for tests.
    pub fn dispatch_now(&self, ctx: Arc<RequestContext>) {
        Self::process(&self.core, ctx);
    }

    fn process(core: &Arc<DispatchCore>, ctx: Arc<RequestContext>) {
        let outcome = Self::run(core, &ctx);
        Self::finish(core, ctx, outcome);
    }

    /// Route → filters → arguments → invocation, producing the outcome.
    fn run(core: &Arc<DispatchCore>, ctx: &Arc<RequestContext>) -> Outcome {
        let (invokable, params) = match core.routes.resolve(ctx.method(), ctx.path()) {
            RouteResolution::Matched { invokable, params } => (invokable, params),
            RouteResolution::MethodNotAllowed => {
                return Outcome::failure(DispatchError::MethodNotAllowed {
                    method: ctx.method().to_string(),
                    path: ctx.path().to_string(),
                });
            }
            RouteResolution::NotFound => {
                return Outcome::failure(DispatchError::RouteNotFound {
                    method: ctx.method().to_string(),
                    path: ctx.path().to_string(),
                });
            }
        };
        ctx.set_path_params(params);

        // Declared-length precheck: an oversized body is refused before
        // any argument mapper receives control.
        if let Some(declared) = ctx.content_length() {
            if declared > core.config.max_body_bytes {
                return Outcome::failure(DispatchError::PayloadTooLarge {
                    limit: core.config.max_body_bytes,
                    actual: declared,
                });
            }
        }

        for filter in invokable.filters() {
            if let Err(err) = filter.apply(ctx) {
                debug!(
                    request_id = %ctx.id(),
                    route = invokable.name(),
                    error = %err,
                    "Filter rejected request"
                );
                return Outcome::from_error(err);
            }
        }

        let args = match core.args.resolve_all(invokable.params(), ctx) {
            Ok(args) => args,
            Err(err) => return Outcome::from_error(err),
        };

        debug!(
            request_id = %ctx.id(),
            route = invokable.name(),
            args = args.len(),
            "Invoking handler"
        );
        let handler = invokable.handler().clone();
        match catch_unwind(AssertUnwindSafe(|| handler.invoke(ctx, &args))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(
                    request_id = %ctx.id(),
                    route = invokable.name(),
                    "Handler panicked"
                );
                Outcome::from_panic(panic)
            }
        }
    }

    /// Transport callback: the per-request timeout fired.
    ///
    /// Synthesizes a timeout outcome and races it through the completion
    /// gate; if the worker already won, this is a logged no-op.
    pub fn on_timeout(&self, ctx: Arc<RequestContext>) {
        let elapsed = ctx.age();
        warn!(
            request_id = %ctx.id(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Request timeout fired"
        );
        Self::finish(
            &self.core,
            ctx,
            Outcome::failure(DispatchError::Timeout { elapsed }),
        );
    }

    /// Transport callback: the async context reported an error.
    pub fn on_async_error(&self, ctx: Arc<RequestContext>, message: Option<&str>) {
        let message = message
            .unwrap_or("transport reported an error with no attached cause")
            .to_string();
        Self::finish(
            &self.core,
            ctx,
            Outcome::failure(DispatchError::Async { message }),
        );
    }

    /// Complete a request with an explicit outcome.
    pub fn complete_with(&self, ctx: Arc<RequestContext>, outcome: Outcome) {
        Self::finish(&self.core, ctx, outcome);
    }

    /// The STARTED→render→COMPLETED section.
    ///
    /// Only the `try_start` winner proceeds; everyone else observes a lost
    /// race and no-ops, because the response may already be partially
    /// written. The guard finalizes the context whether the render
    /// succeeds, errors, or panics.
    fn finish(core: &Arc<DispatchCore>, ctx: Arc<RequestContext>, outcome: Outcome) {
        if !ctx.completion().try_start() {
            warn!(
                request_id = %ctx.id(),
                outcome = ?outcome.kind(),
                "Completion race lost - outcome dropped"
            );
            return;
        }
        let guard = CompletionGuard::new(ctx.clone());
        let mapper = core.returns.resolve(&outcome);
        match catch_unwind(AssertUnwindSafe(|| mapper.render(&ctx, &outcome))) {
            Ok(Ok(())) => {
                debug!(
                    request_id = %ctx.id(),
                    latency_ms = ctx.age().as_millis() as u64,
                    "Response rendered"
                );
            }
            Ok(Err(err)) => {
                if outcome.is_failure() {
                    error!(
                        request_id = %ctx.id(),
                        error = %err,
                        "Error-response rendering failed - abandoning response"
                    );
                } else {
                    error!(
                        request_id = %ctx.id(),
                        error = %err,
                        "Response rendering failed - abandoning response"
                    );
                }
            }
            Err(_) => {
                error!(
                    request_id = %ctx.id(),
                    "Renderer panicked - abandoning response"
                );
            }
        }
        drop(guard);
    }

    /// Request executor shutdown: queued work drains, new submissions are
    /// rejected.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    pub fn executor(&self) -> &Arc<DispatchExecutor> {
        &self.executor
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.core.routes
    }

    pub fn return_mappers(&self) -> &ReturnMapperRegistry {
        &self.core.returns
    }

    pub fn argument_mappers(&self) -> &ArgumentMapperRegistry {
        &self.core.args
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.core.config
    }
}

/// Wires the dispatcher: routes, user mappers, executor.
pub struct DispatcherBuilder {
    config: DispatchConfig,
    routes: Option<RoutingTable>,
    arg_mappers: Vec<(ParamKind, Arc<dyn ArgumentMapper>)>,
    return_mappers: Vec<Arc<dyn ReturnMapper>>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            routes: None,
            arg_mappers: Vec::new(),
            return_mappers: Vec::new(),
        }
    }

    /// Install the routing table built by [`RoutingTableBuilder`].
    ///
    /// [`RoutingTableBuilder`]: crate::router::RoutingTableBuilder
    pub fn routes(mut self, routes: RoutingTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Register (or override) an argument mapper for a parameter kind.
    pub fn argument_mapper(mut self, kind: ParamKind, mapper: Arc<dyn ArgumentMapper>) -> Self {
        self.arg_mappers.push((kind, mapper));
        self
    }

    /// Register a user return mapper. User mappers are consulted before
    /// the built-in defaults, in registration order.
    pub fn return_mapper(mut self, mapper: Arc<dyn ReturnMapper>) -> Self {
        self.return_mappers.push(mapper);
        self
    }

    pub fn build(self) -> Dispatcher {
        let mut args = ArgumentMapperRegistry::with_defaults(self.config.max_body_bytes);
        for (kind, mapper) in self.arg_mappers {
            args.register(kind, mapper);
        }

        let mut returns = ReturnMapperRegistry::builder().charset(&self.config.charset);
        for mapper in self.return_mappers {
            returns = returns.register(mapper);
        }

        let routes = self
            .routes
            .unwrap_or_else(|| RoutingTable::builder().build());
        let executor = Arc::new(DispatchExecutor::new(&self.config));

        Dispatcher {
            core: Arc::new(DispatchCore {
                routes,
                args,
                returns: returns.build(),
                config: self.config,
            }),
            executor,
        }
    }
}
