//! # Request Context Module
//!
//! One [`RequestContext`] exists per in-flight request, from the moment the
//! transport opens its asynchronous processing context until the completion
//! guard finalizes it. It carries the boxed transport abstractions, a
//! mutable string-keyed property map that cooperating argument mappers use
//! to pass derived values (a pre-buffered body, extracted path parameters),
//! and the completion state machine.
//!
//! The context has a single active owner at any time - the transport thread
//! or the worker performing the invocation - handed off deterministically.
//! The mutexes around the transport abstractions and property map enforce
//! that rule at the type level; they are uncontended by construction.

use crate::completion::CompletionState;
use crate::ids::RequestId;
use crate::matcher::ParamVec;
use crate::transport::{parse_cookies, parse_query, path_of, AsyncContext, HttpRequest, HttpResponse};
use http::Method;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Well-known property-map keys used by the built-in machinery.
pub mod keys {
    /// Path parameters extracted by the matched route (`ParamVec`).
    pub const PATH_PARAMS: &str = "turnpike.path_params";
    /// Buffered request body (`Arc<[u8]>`), written once per request.
    pub const BUFFERED_BODY: &str = "turnpike.buffered_body";
}

fn relock<T: ?Sized>(mutex: &Mutex<Box<T>>) -> MutexGuard<'_, Box<T>> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-request mutable state container spanning transport hand-off through
/// completion.
pub struct RequestContext {
    id: RequestId,
    method: Method,
    path: String,
    query_params: ParamVec,
    created_at: Instant,
    request: Mutex<Box<dyn HttpRequest>>,
    response: Mutex<Box<dyn HttpResponse>>,
    async_ctx: Arc<dyn AsyncContext>,
    properties: Mutex<HashMap<String, Box<dyn Any + Send>>>,
    completion: CompletionState,
}

impl RequestContext {
    /// Open a context for a newly arrived request.
    ///
    /// The method, path, and query string are captured eagerly; the body
    /// stream stays untouched until a body-consuming argument mapper asks
    /// for it.
    pub fn open(
        request: Box<dyn HttpRequest>,
        response: Box<dyn HttpResponse>,
        async_ctx: Arc<dyn AsyncContext>,
    ) -> Arc<Self> {
        let method = request.method();
        let target = request.target();
        let path = path_of(target).to_string();
        let query_params = parse_query(target);
        Arc::new(Self {
            id: RequestId::new(),
            method,
            path,
            query_params,
            created_at: Instant::now(),
            request: Mutex::new(request),
            response: Mutex::new(response),
            async_ctx,
            properties: Mutex::new(HashMap::new()),
            completion: CompletionState::new(),
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the context was opened.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn completion(&self) -> &CompletionState {
        &self.completion
    }

    pub fn async_context(&self) -> &Arc<dyn AsyncContext> {
        &self.async_ctx
    }

    /// Get a query parameter by name, last occurrence winning.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_params(&self) -> &ParamVec {
        &self.query_params
    }

    /// Get a path parameter extracted by the matched route, last occurrence
    /// winning. Empty until routing has resolved the request.
    pub fn path_param(&self, name: &str) -> Option<String> {
        self.path_params().and_then(|params| {
            params
                .iter()
                .rfind(|(k, _)| k.as_ref() == name)
                .map(|(_, v)| v.clone())
        })
    }

    /// Path parameters extracted by the matched route.
    pub fn path_params(&self) -> Option<ParamVec> {
        self.property::<ParamVec>(keys::PATH_PARAMS)
    }

    pub(crate) fn set_path_params(&self, params: ParamVec) {
        self.put_property(keys::PATH_PARAMS, params);
    }

    /// First header value for `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<String> {
        relock(&self.request).header(name)
    }

    /// Cookie value by name, parsed from the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.header("cookie")?;
        parse_cookies(&header)
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.clone())
    }

    /// Declared body length, if the transport knows it.
    pub fn content_length(&self) -> Option<u64> {
        relock(&self.request).content_length()
    }

    /// Run `f` with exclusive access to the request abstraction.
    pub fn with_request<R>(&self, f: impl FnOnce(&mut dyn HttpRequest) -> R) -> R {
        f(relock(&self.request).as_mut())
    }

    /// Run `f` with exclusive access to the response abstraction.
    pub fn with_response<R>(&self, f: impl FnOnce(&mut dyn HttpResponse) -> R) -> R {
        f(relock(&self.response).as_mut())
    }

    /// Store a derived value for later pipeline stages.
    pub fn put_property<T: Any + Send>(&self, key: &str, value: T) {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Box::new(value));
    }

    /// Read back a property by key. Stored values are read by clone so the
    /// map keeps ownership; share large payloads as `Arc`s.
    pub fn property<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|boxed| boxed.as_ref().downcast_ref::<T>())
            .cloned()
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Drop every stored property. Called by the completion guard.
    pub(crate) fn clear_properties(&self) {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("phase", &self.completion.phase())
            .finish()
    }
}
