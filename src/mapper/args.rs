//! Argument resolution: parameter metadata → extracted request value.
//!
//! Each declared parameter carries an ordered list of [`ParamSpec`]
//! annotations; only the first is consulted - a documented limitation of
//! the system this engine models, preserved deliberately. The registry
//! maps the spec's exact [`ParamKind`] to a mapper; an unregistered kind
//! resolves the argument to null rather than raising an error.

use crate::context::{keys, RequestContext};
use crate::error::DispatchError;
use crate::handler::Args;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

/// The kinds of parameter metadata the built-in mappers understand.
///
/// `Custom` lets embedders register their own resolvers; lookup is by
/// exact kind, never structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Named capture from the matched route pattern
    Path,
    /// Query-string parameter
    Query,
    /// Request header
    Header,
    /// Cookie from the `Cookie` header
    Cookie,
    /// The request method, as a string
    Method,
    /// The raw request path
    RawPath,
    /// The request id minted for this context
    RequestId,
    /// The buffered request body, decoded as text
    Body,
    /// The buffered request body, parsed as JSON
    JsonBody,
    /// Embedder-defined parameter source
    Custom(&'static str),
}

/// One parameter annotation: a kind plus an optional source name
/// (the path-capture, query, header, or cookie name).
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub name: Option<Arc<str>>,
}

impl ParamSpec {
    pub fn path(name: &str) -> Self {
        Self {
            kind: ParamKind::Path,
            name: Some(Arc::from(name)),
        }
    }

    pub fn query(name: &str) -> Self {
        Self {
            kind: ParamKind::Query,
            name: Some(Arc::from(name)),
        }
    }

    pub fn header(name: &str) -> Self {
        Self {
            kind: ParamKind::Header,
            name: Some(Arc::from(name)),
        }
    }

    pub fn cookie(name: &str) -> Self {
        Self {
            kind: ParamKind::Cookie,
            name: Some(Arc::from(name)),
        }
    }

    pub fn method() -> Self {
        Self {
            kind: ParamKind::Method,
            name: None,
        }
    }

    pub fn raw_path() -> Self {
        Self {
            kind: ParamKind::RawPath,
            name: None,
        }
    }

    pub fn request_id() -> Self {
        Self {
            kind: ParamKind::RequestId,
            name: None,
        }
    }

    pub fn body() -> Self {
        Self {
            kind: ParamKind::Body,
            name: None,
        }
    }

    pub fn json_body() -> Self {
        Self {
            kind: ParamKind::JsonBody,
            name: None,
        }
    }

    pub fn custom(kind: &'static str, name: Option<&str>) -> Self {
        Self {
            kind: ParamKind::Custom(kind),
            name: name.map(Arc::from),
        }
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A declared handler parameter: an ordered annotation list.
///
/// Only the first annotation is consulted during resolution; the rest are
/// carried for diagnostics. Most parameters declare exactly one.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    annotations: SmallVec<[ParamSpec; 1]>,
}

impl ParamDecl {
    /// The common case: one annotation.
    pub fn of(spec: ParamSpec) -> Self {
        let mut annotations = SmallVec::new();
        annotations.push(spec);
        Self { annotations }
    }

    /// A parameter carrying several annotations. Only the first positioned
    /// one is consulted.
    pub fn annotated(specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        Self {
            annotations: specs.into_iter().collect(),
        }
    }

    /// An unannotated parameter; always resolves to null.
    pub fn bare() -> Self {
        Self {
            annotations: SmallVec::new(),
        }
    }

    pub fn first(&self) -> Option<&ParamSpec> {
        self.annotations.first()
    }
}

/// A resolver that produces a parameter value from the request.
pub trait ArgumentMapper: Send + Sync {
    /// Produce the value for `spec`, or `None` for "no value available"
    /// (passed through as a null argument). Errors abort the request into
    /// error rendering.
    fn resolve(&self, spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>>;
}

/// Buffer the request body into memory, exactly once per request.
///
/// The buffered bytes are cached on the context property map so multiple
/// body-consuming mappers never re-read the transport stream. The declared
/// content length is checked against `max_bytes` before reading, and the
/// read itself is capped, so an oversized body raises
/// [`DispatchError::PayloadTooLarge`] either way.
pub fn buffered_body(ctx: &RequestContext, max_bytes: u64) -> anyhow::Result<Arc<[u8]>> {
    if let Some(bytes) = ctx.property::<Arc<[u8]>>(keys::BUFFERED_BODY) {
        return Ok(bytes);
    }
    if let Some(declared) = ctx.content_length() {
        if declared > max_bytes {
            return Err(DispatchError::PayloadTooLarge {
                limit: max_bytes,
                actual: declared,
            }
            .into());
        }
    }
    let bytes = ctx.with_request(|req| -> anyhow::Result<Vec<u8>> {
        let mut buf = Vec::new();
        req.body().take(max_bytes + 1).read_to_end(&mut buf)?;
        Ok(buf)
    })?;
    if bytes.len() as u64 > max_bytes {
        return Err(DispatchError::PayloadTooLarge {
            limit: max_bytes,
            actual: bytes.len() as u64,
        }
        .into());
    }
    debug!(
        request_id = %ctx.id(),
        body_bytes = bytes.len(),
        "Request body buffered"
    );
    let shared: Arc<[u8]> = Arc::from(bytes);
    ctx.put_property(keys::BUFFERED_BODY, shared.clone());
    Ok(shared)
}

/// Exact-kind lookup table from parameter metadata to resolver.
pub struct ArgumentMapperRegistry {
    mappers: HashMap<ParamKind, Arc<dyn ArgumentMapper>>,
}

impl ArgumentMapperRegistry {
    /// Empty registry, for embedders that want full control.
    pub fn new() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in mappers.
    pub fn with_defaults(max_body_bytes: u64) -> Self {
        let mut registry = Self::new();
        registry.register(ParamKind::Path, Arc::new(PathParamMapper));
        registry.register(ParamKind::Query, Arc::new(QueryParamMapper));
        registry.register(ParamKind::Header, Arc::new(HeaderMapper));
        registry.register(ParamKind::Cookie, Arc::new(CookieMapper));
        registry.register(ParamKind::Method, Arc::new(MethodMapper));
        registry.register(ParamKind::RawPath, Arc::new(RawPathMapper));
        registry.register(ParamKind::RequestId, Arc::new(RequestIdMapper));
        registry.register(ParamKind::Body, Arc::new(BodyMapper { max_body_bytes }));
        registry.register(ParamKind::JsonBody, Arc::new(JsonBodyMapper { max_body_bytes }));
        registry
    }

    /// Associate `kind` with a resolver, replacing any existing entry.
    pub fn register(&mut self, kind: ParamKind, mapper: Arc<dyn ArgumentMapper>) {
        if self.mappers.insert(kind.clone(), mapper).is_some() {
            warn!(kind = ?kind, "Replaced existing argument mapper");
        }
    }

    pub fn lookup(&self, kind: &ParamKind) -> Option<&Arc<dyn ArgumentMapper>> {
        self.mappers.get(kind)
    }

    /// Resolve every declared parameter, in declaration order.
    ///
    /// Per the engine's documented policy: only the first annotation on a
    /// parameter is consulted, and a parameter whose annotation kind has
    /// no registered mapper resolves to null.
    pub fn resolve_all(&self, decls: &[ParamDecl], ctx: &RequestContext) -> anyhow::Result<Args> {
        let mut values = Vec::with_capacity(decls.len());
        for decl in decls {
            let value = match decl.first() {
                Some(spec) => match self.lookup(&spec.kind) {
                    Some(mapper) => mapper.resolve(spec, ctx)?,
                    None => {
                        debug!(
                            request_id = %ctx.id(),
                            kind = ?spec.kind,
                            "No argument mapper registered - resolving to null"
                        );
                        None
                    }
                },
                None => None,
            };
            values.push(value);
        }
        Ok(Args::new(values))
    }
}

impl Default for ArgumentMapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves a named capture from the matched route.
pub struct PathParamMapper;

impl ArgumentMapper for PathParamMapper {
    fn resolve(&self, spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        Ok(spec
            .name()
            .and_then(|name| ctx.path_param(name))
            .map(Value::String))
    }
}

/// Resolves a query-string parameter.
pub struct QueryParamMapper;

impl ArgumentMapper for QueryParamMapper {
    fn resolve(&self, spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        Ok(spec
            .name()
            .and_then(|name| ctx.query_param(name))
            .map(|v| Value::String(v.to_string())))
    }
}

/// Resolves a request header.
pub struct HeaderMapper;

impl ArgumentMapper for HeaderMapper {
    fn resolve(&self, spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        Ok(spec
            .name()
            .and_then(|name| ctx.header(name))
            .map(Value::String))
    }
}

/// Resolves a cookie value.
pub struct CookieMapper;

impl ArgumentMapper for CookieMapper {
    fn resolve(&self, spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        Ok(spec
            .name()
            .and_then(|name| ctx.cookie(name))
            .map(Value::String))
    }
}

/// Resolves the request method as a string.
pub struct MethodMapper;

impl ArgumentMapper for MethodMapper {
    fn resolve(&self, _spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        Ok(Some(Value::String(ctx.method().to_string())))
    }
}

/// Resolves the raw request path.
pub struct RawPathMapper;

impl ArgumentMapper for RawPathMapper {
    fn resolve(&self, _spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        Ok(Some(Value::String(ctx.path().to_string())))
    }
}

/// Resolves the request id minted for this context.
pub struct RequestIdMapper;

impl ArgumentMapper for RequestIdMapper {
    fn resolve(&self, _spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        Ok(Some(Value::String(ctx.id().to_string())))
    }
}

/// Resolves the buffered body as text.
pub struct BodyMapper {
    pub max_body_bytes: u64,
}

impl ArgumentMapper for BodyMapper {
    fn resolve(&self, _spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        let bytes = buffered_body(ctx, self.max_body_bytes)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        )))
    }
}

/// Resolves the buffered body as a parsed JSON value.
///
/// A present but malformed body aborts the request with
/// [`DispatchError::InvalidArgument`]; an empty body resolves to null.
pub struct JsonBodyMapper {
    pub max_body_bytes: u64,
}

impl ArgumentMapper for JsonBodyMapper {
    fn resolve(&self, _spec: &ParamSpec, ctx: &RequestContext) -> anyhow::Result<Option<Value>> {
        let bytes = buffered_body(ctx, self.max_body_bytes)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&bytes).map_err(|err| {
            anyhow::Error::from(DispatchError::InvalidArgument {
                message: format!("malformed JSON body: {}", err),
            })
        })?;
        Ok(Some(value))
    }
}
