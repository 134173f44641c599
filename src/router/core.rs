//! Routing table core - hot path for route resolution.

use crate::filter::Filter;
use crate::handler::Handler;
use crate::mapper::args::ParamDecl;
use crate::matcher::{ParamVec, PathMatcher, RegexPathMatcher};
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A route declaration: what a controller registers to receive requests.
///
/// Methods default to GET and HEAD when none are declared. The matcher
/// defaults to the table's shared [`RegexPathMatcher`].
pub struct Route {
    pattern: String,
    methods: Vec<Method>,
    matcher: Option<Arc<dyn PathMatcher>>,
    filters: Vec<Arc<dyn Filter>>,
    params: Vec<ParamDecl>,
    handler: Arc<dyn Handler>,
    name: Option<String>,
}

impl Route {
    pub fn new(pattern: &str, handler: impl Handler + 'static) -> Self {
        Self {
            pattern: pattern.to_string(),
            methods: Vec::new(),
            matcher: None,
            filters: Vec::new(),
            params: Vec::new(),
            handler: Arc::new(handler),
            name: None,
        }
    }

    /// Name used in logs; defaults to the pattern.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Add an HTTP method this route serves.
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Declare the full method list at once.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Override the matcher for this route.
    pub fn matcher(mut self, matcher: Arc<dyn PathMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Append a pre-invocation filter. Declaration order is run order.
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Declare the next handler parameter.
    pub fn param(mut self, decl: ParamDecl) -> Self {
        self.params.push(decl);
        self
    }
}

/// An immutable route binding: pattern + matcher + ordered filters +
/// parameter declarations + handler.
///
/// Built once at startup, never mutated, shared across dispatch workers.
pub struct Invokable {
    pattern: Arc<str>,
    matcher: Arc<dyn PathMatcher>,
    filters: Vec<Arc<dyn Filter>>,
    params: Vec<ParamDecl>,
    handler: Arc<dyn Handler>,
    name: Arc<str>,
}

impl Invokable {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    pub fn params(&self) -> &[ParamDecl] {
        &self.params
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Test a request path against this binding's pattern.
    pub fn match_path(&self, path: &str) -> Option<ParamVec> {
        self.matcher.matches(&self.pattern, path)
    }
}

/// Result of resolving a request against the routing table.
pub enum RouteResolution {
    /// First declared binding whose pattern matched, with its extracted
    /// path parameters
    Matched {
        invokable: Arc<Invokable>,
        params: ParamVec,
    },
    /// The path matches under at least one other method
    MethodNotAllowed,
    /// No binding matches the path under any method
    NotFound,
}

/// Method-keyed multimap of invokables, first-match-wins.
///
/// Built once at startup and read-only thereafter; safe for concurrent
/// lookups from every dispatch worker.
pub struct RoutingTable {
    by_method: HashMap<Method, Vec<Arc<Invokable>>>,
    route_count: usize,
}

impl RoutingTable {
    pub fn builder() -> RoutingTableBuilder {
        RoutingTableBuilder::new()
    }

    /// The bindings registered for `method`, in declaration order. Empty
    /// for a method with no routes - never an error.
    pub fn routes_for(&self, method: &Method) -> &[Arc<Invokable>] {
        self.by_method
            .get(method)
            .map(|routes| routes.as_slice())
            .unwrap_or(&[])
    }

    /// Number of registered bindings, counting one per declared method.
    pub fn route_count(&self) -> usize {
        self.route_count
    }

    /// Resolve a request to its invokable.
    ///
    /// Walks the method's bindings in declaration order; the first
    /// matching pattern wins. Distinguishes "method not allowed" (the path
    /// is served under a different method) from "not found".
    pub fn resolve(&self, method: &Method, path: &str) -> RouteResolution {
        for invokable in self.routes_for(method) {
            if let Some(params) = invokable.match_path(path) {
                debug!(
                    method = %method,
                    path = %path,
                    route = invokable.name(),
                    "Route matched"
                );
                return RouteResolution::Matched {
                    invokable: invokable.clone(),
                    params,
                };
            }
        }
        let served_elsewhere = self.by_method.iter().any(|(other, routes)| {
            other != method && routes.iter().any(|inv| inv.match_path(path).is_some())
        });
        if served_elsewhere {
            RouteResolution::MethodNotAllowed
        } else {
            RouteResolution::NotFound
        }
    }
}

/// Builds the routing table, validating patterns as it goes.
pub struct RoutingTableBuilder {
    routes: Vec<Route>,
    default_matcher: Arc<dyn PathMatcher>,
}

impl RoutingTableBuilder {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            default_matcher: Arc::new(RegexPathMatcher::new()),
        }
    }

    /// Replace the matcher used by routes that do not declare their own.
    pub fn default_matcher(mut self, matcher: Arc<dyn PathMatcher>) -> Self {
        self.default_matcher = matcher;
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Freeze the table.
    ///
    /// A route whose pattern fails its matcher's validation is logged and
    /// skipped; the rest of the table still builds. Routes with no
    /// declared methods register under GET and HEAD.
    pub fn build(self) -> RoutingTable {
        let mut by_method: HashMap<Method, Vec<Arc<Invokable>>> = HashMap::new();
        let mut route_count = 0usize;
        let mut skipped = 0usize;

        for route in self.routes {
            let matcher = route
                .matcher
                .unwrap_or_else(|| self.default_matcher.clone());
            if let Err(err) = matcher.check(&route.pattern) {
                error!(
                    pattern = %route.pattern,
                    error = %err,
                    "Skipping malformed route"
                );
                skipped += 1;
                continue;
            }
            let name = route.name.unwrap_or_else(|| route.pattern.clone());
            let invokable = Arc::new(Invokable {
                pattern: Arc::from(route.pattern.as_str()),
                matcher,
                filters: route.filters,
                params: route.params,
                handler: route.handler,
                name: Arc::from(name.as_str()),
            });
            let methods = if route.methods.is_empty() {
                vec![Method::GET, Method::HEAD]
            } else {
                route.methods
            };
            for method in methods {
                by_method
                    .entry(method)
                    .or_default()
                    .push(invokable.clone());
                route_count += 1;
            }
        }

        info!(
            routes_count = route_count,
            skipped = skipped,
            methods = by_method.len(),
            "Routing table built"
        );
        RoutingTable {
            by_method,
            route_count,
        }
    }
}

impl Default for RoutingTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
