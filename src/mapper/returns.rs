//! Return-type resolution: outcome → renderer, via an ordered predicate
//! list with a memoizing per-type cache.
//!
//! User-registered mappers are consulted before the built-in defaults, and
//! the universal fallback always sits last, so resolution can never fail.
//! First structural match wins - callers needing strict specificity order
//! control it through registration order.

use crate::context::RequestContext;
use crate::error::DispatchError;
use dashmap::DashMap;
use serde_json::Value;
use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Maximum inline response headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated response-header storage.
///
/// Header names are often repeated literals, so they are shared as
/// `Arc<str>`; values are per-response data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// A fully materialized HTTP response a handler (or mapper) wants written.
///
/// Handlers that need full control over status, headers, and body return
/// one of these; the built-in [`ResponseReturnMapper`] writes it verbatim.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderVec,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// JSON response with a `content-type: application/json` header.
    pub fn json(status: u16, body: &Value) -> Self {
        let mut response = Self::new(status);
        response.set_header("content-type", "application/json");
        response.body = serde_json::to_vec(body).unwrap_or_default();
        response
    }

    /// Plain-text response advertising the given charset.
    pub fn text(status: u16, body: &str, charset: &str) -> Self {
        let mut response = Self::new(status);
        response.set_header("content-type", &format!("text/plain; charset={}", charset));
        response.body = body.as_bytes().to_vec();
        response
    }

    /// Bodyless response.
    pub fn empty(status: u16) -> Self {
        Self::new(status)
    }

    /// JSON error envelope, `{"error": message}`.
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header, case-insensitive on the name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.to_string()));
    }
}

/// Write a materialized [`Response`] through the context's transport
/// response abstraction. Shared by every built-in mapper.
pub fn write_response(ctx: &RequestContext, response: &Response) -> anyhow::Result<()> {
    ctx.with_response(|resp| -> anyhow::Result<()> {
        resp.set_status(response.status);
        for (name, value) in &response.headers {
            resp.set_header(name, value);
        }
        resp.set_header("content-length", &response.body.len().to_string());
        resp.writer().write_all(&response.body)?;
        Ok(())
    })
}

/// Whether an outcome carries a produced value or a raised error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// What a handler invocation produced: a value or a failure, both carried
/// as type-erased payloads through one rendering pipeline.
///
/// Failures capture their `Display` form at construction so generic error
/// mappers can render a message even though the payload is type-erased.
pub struct Outcome {
    kind: OutcomeKind,
    payload: Box<dyn Any + Send>,
    message: Option<String>,
}

impl Outcome {
    /// A produced value.
    pub fn success<T: Send + 'static>(value: T) -> Self {
        Self {
            kind: OutcomeKind::Success,
            payload: Box::new(value),
            message: None,
        }
    }

    /// A produced JSON value.
    pub fn json(value: Value) -> Self {
        Self::success(value)
    }

    /// Success with no renderable value (handlers that write nothing).
    pub fn unit() -> Self {
        Self::success(())
    }

    /// A raised error.
    pub fn failure<E: fmt::Display + Send + 'static>(err: E) -> Self {
        let message = err.to_string();
        Self {
            kind: OutcomeKind::Failure,
            payload: Box::new(err),
            message: Some(message),
        }
    }

    /// A raised `anyhow::Error`, keeping its downcast chain reachable.
    pub fn from_error(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        Self {
            kind: OutcomeKind::Failure,
            payload: Box::new(err),
            message: Some(message),
        }
    }

    /// A captured panic payload from a handler.
    pub fn from_panic(panic: Box<dyn Any + Send>) -> Self {
        let message = panic
            .as_ref()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.as_ref().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "handler panicked".to_string());
        Self {
            kind: OutcomeKind::Failure,
            payload: panic,
            message: Some(message),
        }
    }

    /// Convert a handler's `Result` into an outcome.
    pub fn from_result<T, E>(result: Result<T, E>) -> Self
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        match result {
            Ok(value) => Self::success(value),
            Err(err) => Self::failure(err),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn is_failure(&self) -> bool {
        self.kind == OutcomeKind::Failure
    }

    /// Concrete type identity of the payload - the cache key for
    /// return-type resolution.
    pub fn payload_type_id(&self) -> TypeId {
        self.payload.as_ref().type_id()
    }

    /// Captured failure message, if this outcome is a failure.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Downcast the payload.
    ///
    /// A failure carried as an `anyhow::Error` is probed both directly and
    /// through the error's downcast chain, so a mapper registered for a
    /// concrete error type still matches when the error arrived wrapped.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        if let Some(value) = self.payload.as_ref().downcast_ref::<T>() {
            return Some(value);
        }
        // MEASUREMENT STUB - direct-only; wrapper path temporarily disabled.
        None
    }

    /// The payload as the `anyhow` wrapper, when it arrived wrapped.
    pub fn downcast_wrapper(&self) -> Option<&anyhow::Error> {
        self.payload.as_ref().downcast_ref::<anyhow::Error>()
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

/// A renderer for some family of outcome payloads.
pub trait ReturnMapper: Send + Sync {
    /// Structural predicate: does this mapper render `outcome`?
    fn accepts(&self, outcome: &Outcome) -> bool;

    /// Write the full response for `outcome`.
    fn render(&self, ctx: &RequestContext, outcome: &Outcome) -> anyhow::Result<()>;
}

/// Ordered return-mapper table with an O(1) memoizing cache.
pub struct ReturnMapperRegistry {
    entries: Vec<Arc<dyn ReturnMapper>>,
    universal: Arc<dyn ReturnMapper>,
    cache: DashMap<(TypeId, OutcomeKind), Arc<dyn ReturnMapper>>,
    scans: AtomicU64,
}

impl ReturnMapperRegistry {
    pub fn builder() -> ReturnMapperRegistryBuilder {
        ReturnMapperRegistryBuilder::new()
    }

    /// Resolve the renderer for an outcome. Never fails: the universal
    /// fallback accepts everything.
    ///
    /// The first call for a given payload type scans the ordered entries;
    /// the winning pairing is memoized and every later call for that type
    /// is a cache hit. Failures carried as `anyhow::Error` are exempt from
    /// memoization: every such payload shares the wrapper's type id while
    /// mappers match on the per-instance inner chain, so caching would pin
    /// the first match for all of them.
    pub fn resolve(&self, outcome: &Outcome) -> Arc<dyn ReturnMapper> {
        let cacheable = outcome.downcast_wrapper().is_none();
        let key = (outcome.payload_type_id(), outcome.kind());
        if cacheable {
            if let Some(hit) = self.cache.get(&key) {
                return hit.value().clone();
            }
        }
        self.scans.fetch_add(1, Ordering::Relaxed);
        let resolved = self
            .entries
            .iter()
            .find(|entry| entry.accepts(outcome))
            .cloned()
            .unwrap_or_else(|| self.universal.clone());
        if cacheable {
            self.cache.insert(key, resolved.clone());
        }
        resolved
    }

    /// Number of slow-path scans performed so far. A repeated resolution
    /// for the same payload type must not increase this.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }
}

/// Builder enforcing the registry's ordering invariant: user entries
/// first, built-in defaults after, the universal fallback last.
pub struct ReturnMapperRegistryBuilder {
    user: Vec<Arc<dyn ReturnMapper>>,
    charset: String,
}

impl ReturnMapperRegistryBuilder {
    pub fn new() -> Self {
        Self {
            user: Vec::new(),
            charset: "utf-8".to_string(),
        }
    }

    /// Charset advertised by the built-in text mapper.
    pub fn charset(mut self, charset: &str) -> Self {
        self.charset = charset.to_string();
        self
    }

    /// Register a user mapper. Registration order is consultation order.
    pub fn register(mut self, mapper: Arc<dyn ReturnMapper>) -> Self {
        self.user.push(mapper);
        self
    }

    pub fn build(self) -> ReturnMapperRegistry {
        let mut entries = self.user;
        let user_count = entries.len();
        entries.push(Arc::new(ResponseReturnMapper));
        entries.push(Arc::new(JsonReturnMapper));
        entries.push(Arc::new(TextReturnMapper {
            charset: self.charset,
        }));
        entries.push(Arc::new(UnitReturnMapper));
        entries.push(Arc::new(DispatchErrorReturnMapper));
        entries.push(Arc::new(FailureReturnMapper));
        info!(
            user_mappers = user_count,
            total_mappers = entries.len() + 1,
            "Return mapper registry built"
        );
        ReturnMapperRegistry {
            entries,
            universal: Arc::new(UniversalReturnMapper),
            cache: DashMap::new(),
            scans: AtomicU64::new(0),
        }
    }
}

impl Default for ReturnMapperRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a handler-materialized [`Response`] verbatim.
pub struct ResponseReturnMapper;

impl ReturnMapper for ResponseReturnMapper {
    fn accepts(&self, outcome: &Outcome) -> bool {
        !outcome.is_failure() && outcome.downcast_ref::<Response>().is_some()
    }

    fn render(&self, ctx: &RequestContext, outcome: &Outcome) -> anyhow::Result<()> {
        match outcome.downcast_ref::<Response>() {
            Some(response) => write_response(ctx, response),
            None => Err(anyhow::anyhow!("outcome payload is not a Response")),
        }
    }
}

/// Renders `serde_json::Value` results as `200 application/json`.
pub struct JsonReturnMapper;

impl ReturnMapper for JsonReturnMapper {
    fn accepts(&self, outcome: &Outcome) -> bool {
        !outcome.is_failure() && outcome.downcast_ref::<Value>().is_some()
    }

    fn render(&self, ctx: &RequestContext, outcome: &Outcome) -> anyhow::Result<()> {
        match outcome.downcast_ref::<Value>() {
            Some(value) => write_response(ctx, &Response::json(200, value)),
            None => Err(anyhow::anyhow!("outcome payload is not a JSON value")),
        }
    }
}

/// Renders `String` and `&'static str` results as `200 text/plain`.
pub struct TextReturnMapper {
    charset: String,
}

impl TextReturnMapper {
    fn text_of<'a>(&self, outcome: &'a Outcome) -> Option<&'a str> {
        outcome
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| outcome.downcast_ref::<&'static str>().copied())
    }
}

impl ReturnMapper for TextReturnMapper {
    fn accepts(&self, outcome: &Outcome) -> bool {
        !outcome.is_failure() && self.text_of(outcome).is_some()
    }

    fn render(&self, ctx: &RequestContext, outcome: &Outcome) -> anyhow::Result<()> {
        match self.text_of(outcome) {
            Some(text) => write_response(ctx, &Response::text(200, text, &self.charset)),
            None => Err(anyhow::anyhow!("outcome payload is not text")),
        }
    }
}

/// Renders `()` results as `204 No Content`.
pub struct UnitReturnMapper;

impl ReturnMapper for UnitReturnMapper {
    fn accepts(&self, outcome: &Outcome) -> bool {
        !outcome.is_failure() && outcome.downcast_ref::<()>().is_some()
    }

    fn render(&self, ctx: &RequestContext, _outcome: &Outcome) -> anyhow::Result<()> {
        write_response(ctx, &Response::empty(204))
    }
}

/// Maps the engine's own error taxonomy onto status codes.
pub struct DispatchErrorReturnMapper;

impl DispatchErrorReturnMapper {
    fn status_of(err: &DispatchError) -> u16 {
        match err {
            DispatchError::RouteNotFound { .. } => 404,
            DispatchError::MethodNotAllowed { .. } => 405,
            DispatchError::PayloadTooLarge { .. } => 413,
            DispatchError::InvalidArgument { .. } => 400,
            DispatchError::Overloaded => 503,
            DispatchError::Timeout { .. } | DispatchError::Async { .. } => 500,
        }
    }
}

impl ReturnMapper for DispatchErrorReturnMapper {
    fn accepts(&self, outcome: &Outcome) -> bool {
        outcome.is_failure() && outcome.downcast_ref::<DispatchError>().is_some()
    }

    fn render(&self, ctx: &RequestContext, outcome: &Outcome) -> anyhow::Result<()> {
        match outcome.downcast_ref::<DispatchError>() {
            Some(err) => {
                write_response(ctx, &Response::error(Self::status_of(err), &err.to_string()))
            }
            None => Err(anyhow::anyhow!("outcome payload is not a DispatchError")),
        }
    }
}

/// Catch-all for failures: renders a 500 with the captured message.
pub struct FailureReturnMapper;

impl ReturnMapper for FailureReturnMapper {
    fn accepts(&self, outcome: &Outcome) -> bool {
        outcome.is_failure()
    }

    fn render(&self, ctx: &RequestContext, outcome: &Outcome) -> anyhow::Result<()> {
        let message = outcome.message().unwrap_or("internal error");
        write_response(ctx, &Response::error(500, message))
    }
}

/// Universal fallback: accepts everything, so resolution never fails.
///
/// A success payload reaching this mapper means no registered mapper knows
/// the type - a wiring bug, surfaced as a warning and a 500 rather than
/// silently stringified.
pub struct UniversalReturnMapper;

impl ReturnMapper for UniversalReturnMapper {
    fn accepts(&self, _outcome: &Outcome) -> bool {
        true
    }

    fn render(&self, ctx: &RequestContext, outcome: &Outcome) -> anyhow::Result<()> {
        if outcome.is_failure() {
            let message = outcome.message().unwrap_or("internal error");
            return write_response(ctx, &Response::error(500, message));
        }
        warn!(
            request_id = %ctx.id(),
            "No return mapper accepts the handler result type - rendering 500"
        );
        write_response(ctx, &Response::error(500, "unrenderable handler result"))
    }
}
