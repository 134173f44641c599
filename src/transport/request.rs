use crate::matcher::ParamVec;
use http::Method;
use std::io::Read;
use std::sync::Arc;

/// Readable view of an inbound HTTP request, implemented by the transport.
///
/// The body stream may only be consumed once; the engine buffers it through
/// the request context's property map so cooperating argument mappers never
/// re-read the transport stream.
pub trait HttpRequest: Send {
    /// Request method.
    fn method(&self) -> Method;

    /// Request target: the path plus an optional `?query` suffix.
    fn target(&self) -> &str;

    /// First header value for `name`, case-insensitive.
    fn header(&self, name: &str) -> Option<String>;

    /// All header names, lowercased.
    fn header_names(&self) -> Vec<String>;

    /// Declared body length, if the transport knows it.
    fn content_length(&self) -> Option<u64>;

    /// The readable body stream.
    fn body(&mut self) -> &mut dyn Read;
}

/// Split a request target into its path component.
pub(crate) fn path_of(target: &str) -> &str {
    match target.split_once('?') {
        Some((path, _)) => path,
        None => target,
    }
}

/// Parse the query-string portion of a request target.
///
/// Percent-decodes names and values. Duplicate names are kept in order, so
/// last-write-wins accessors see the final occurrence.
pub fn parse_query(target: &str) -> ParamVec {
    let mut params = ParamVec::new();
    if let Some((_, query)) = target.split_once('?') {
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            params.push((Arc::from(k.as_ref()), v.to_string()));
        }
    }
    params
}

/// Parse a `Cookie` header value into name/value pairs.
pub fn parse_cookies(header: &str) -> ParamVec {
    let mut cookies = ParamVec::new();
    for pair in header.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let name = match parts.next() {
            Some(n) if !n.is_empty() => n.trim(),
            _ => continue,
        };
        let value = parts.next().unwrap_or("").trim();
        cookies.push((Arc::from(name), value.to_string()));
    }
    cookies
}
