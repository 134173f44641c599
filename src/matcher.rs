//! # Path Matcher Module
//!
//! Pluggable strategies for testing a request path against a route pattern
//! and extracting named variables.
//!
//! Two implementations ship with the crate:
//!
//! - [`RegexPathMatcher`] (the default) treats the route pattern as a
//!   regular expression; named capture groups become path parameters.
//! - [`TemplatePathMatcher`] compiles `/users/{id}` style templates into
//!   anchored regexes with one named group per placeholder.
//!
//! Both share the same caching discipline: compiled patterns are cached
//! keyed by the literal pattern text, since many requests reuse the same
//! route. A pattern that fails to compile is logged once and cached as
//! poisoned, so a malformed route fails closed (never matches) instead of
//! propagating an error on the hot path.

use dashmap::DashMap;
use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::warn;

/// Maximum number of path/query parameters before heap allocation.
/// Most routes have well under 8 named captures.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from compiled patterns
/// known at startup and are shared across requests; values are per-request
/// data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Strategy for matching a route pattern against a request path.
///
/// Implementations must be cheap to call concurrently; the routing table
/// shares one instance across every route that uses it.
pub trait PathMatcher: Send + Sync {
    /// Test `path` against `pattern`.
    ///
    /// Returns the extracted named parameters on a match, `None` otherwise.
    /// A malformed pattern is "no match", not an error.
    fn matches(&self, pattern: &str, path: &str) -> Option<ParamVec>;

    /// Startup validation hook: report whether `pattern` is well-formed.
    ///
    /// The routing-table builder calls this once per route so malformed
    /// patterns can be skipped (and logged) at build time rather than
    /// silently never matching.
    fn check(&self, pattern: &str) -> anyhow::Result<()> {
        let _ = pattern;
        Ok(())
    }
}

/// Shared compile cache: pattern text → compiled regex, or `None` for a
/// pattern that failed to compile (poisoned, fails closed).
type CompileCache = DashMap<String, Option<Arc<Regex>>>;

fn compile_cached(cache: &CompileCache, pattern: &str) -> Option<Arc<Regex>> {
    if let Some(entry) = cache.get(pattern) {
        return entry.value().clone();
    }
    let compiled = match Regex::new(pattern) {
        Ok(re) => Some(Arc::new(re)),
        Err(err) => {
            warn!(
                pattern = %pattern,
                error = %err,
                "Route pattern failed to compile - treating as non-matching"
            );
            None
        }
    };
    cache.insert(pattern.to_string(), compiled.clone());
    compiled
}

fn capture_params(re: &Regex, path: &str) -> Option<ParamVec> {
    let caps = re.captures(path)?;
    let mut params = ParamVec::new();
    for name in re.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            params.push((Arc::from(name), m.as_str().to_string()));
        }
    }
    Some(params)
}

/// Default matcher: the route pattern is a regular expression.
///
/// Named capture groups (`(?<id>[0-9]+)`) are extracted by name into the
/// result. Patterns are matched as written - routes that want full-path
/// semantics should anchor with `^` and `$`.
pub struct RegexPathMatcher {
    cache: CompileCache,
}

impl RegexPathMatcher {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Number of distinct patterns currently cached (compiled or poisoned).
    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }
}

impl Default for RegexPathMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMatcher for RegexPathMatcher {
    fn matches(&self, pattern: &str, path: &str) -> Option<ParamVec> {
        let re = compile_cached(&self.cache, pattern)?;
        capture_params(&re, path)
    }

    fn check(&self, pattern: &str) -> anyhow::Result<()> {
        Regex::new(pattern)
            .map(|_| ())
            .map_err(|err| anyhow::anyhow!("invalid route regex {:?}: {}", pattern, err))
    }
}

/// Template matcher: compiles `/users/{id}` into `^/users/([^/]+)$` with a
/// named group per placeholder.
pub struct TemplatePathMatcher {
    cache: CompileCache,
}

impl TemplatePathMatcher {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Convert a path template into an anchored regex source string.
    ///
    /// Each `{name}` segment becomes a named group matching one path
    /// segment; literal segments are escaped.
    fn template_to_regex(template: &str) -> String {
        if template == "/" {
            return "^/$".to_string();
        }
        let mut pattern = String::with_capacity(template.len() + 8);
        pattern.push('^');
        for segment in template.split('/') {
            if segment.is_empty() {
                continue;
            }
            pattern.push('/');
            if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
            {
                pattern.push_str("(?<");
                pattern.push_str(name);
                pattern.push_str(">[^/]+)");
            } else {
                pattern.push_str(&regex::escape(segment));
            }
        }
        pattern.push('$');
        pattern
    }
}

impl Default for TemplatePathMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMatcher for TemplatePathMatcher {
    fn matches(&self, pattern: &str, path: &str) -> Option<ParamVec> {
        let source = Self::template_to_regex(pattern);
        let re = compile_cached(&self.cache, &source)?;
        capture_params(&re, path)
    }

    fn check(&self, pattern: &str) -> anyhow::Result<()> {
        let source = Self::template_to_regex(pattern);
        Regex::new(&source)
            .map(|_| ())
            .map_err(|err| anyhow::anyhow!("invalid route template {:?}: {}", pattern, err))
    }
}
