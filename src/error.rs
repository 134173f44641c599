//! Dispatch error taxonomy.
//!
//! One variant per condition in the spec's error taxonomy (§7). Status
//! mapping lives in the return-mapper layer (`DispatchErrorReturnMapper`),
//! not here: this type only describes *what* went wrong.
//!
//! Hand-written `Display` + [`std::error::Error`] so the enum carries no
//! derive-macro dependency; the variants and their fields are those
//! constructed across the dispatcher, argument mappers, and typed layer.

use std::fmt;
use std::time::Duration;

/// A failure surfaced by the dispatch pipeline.
#[derive(Debug)]
pub enum DispatchError {
    /// No registered route matched the request path, under any method.
    RouteNotFound {
        /// The request method.
        method: String,
        /// The request path.
        path: String,
    },
    /// A route matched the path but not under the request's method.
    MethodNotAllowed {
        /// The request method.
        method: String,
        /// The request path.
        path: String,
    },
    /// The request body exceeded the configured maximum.
    PayloadTooLarge {
        /// The configured limit, in bytes.
        limit: u64,
        /// The observed (declared or read) size, in bytes.
        actual: u64,
    },
    /// A typed argument could not be decoded from the request.
    InvalidArgument {
        /// Human-readable description of the decode failure.
        message: String,
    },
    /// The dispatch executor rejected the request (queue full or shut down).
    Overloaded,
    /// The per-request timeout fired before completion.
    Timeout {
        /// How long the request had been running when the timeout fired.
        elapsed: Duration,
    },
    /// The transport reported an asynchronous error.
    Async {
        /// The attached cause, or a synthesized placeholder.
        message: String,
    },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::RouteNotFound { method, path } => {
                write!(f, "route not found: {} {}", method, path)
            }
            DispatchError::MethodNotAllowed { method, path } => {
                write!(f, "method not allowed: {} {}", method, path)
            }
            DispatchError::PayloadTooLarge { limit, actual } => {
                write!(
                    f,
                    "payload too large: {} bytes exceeds limit of {} bytes",
                    actual, limit
                )
            }
            DispatchError::InvalidArgument { message } => {
                write!(f, "invalid argument: {}", message)
            }
            DispatchError::Overloaded => write!(f, "overloaded: request rejected"),
            DispatchError::Timeout { elapsed } => {
                write!(f, "timeout after {:?}", elapsed)
            }
            DispatchError::Async { message } => {
                write!(f, "async transport error: {}", message)
            }
        }
    }
}

impl std::error::Error for DispatchError {}
