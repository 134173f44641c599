//! # Runtime Configuration Module
//!
//! Environment-variable configuration for the dispatch engine.
//!
//! ## Environment Variables
//!
//! - `TURNPIKE_WORKERS` - number of dispatch worker coroutines (default: 4)
//! - `TURNPIKE_WORKER_NAME` - worker label pattern, `{}` replaced by the
//!   worker index (default: `dispatch-worker-{}`)
//! - `TURNPIKE_QUEUE_BOUND` - maximum executor queue depth (default: 1024)
//! - `TURNPIKE_STACK_SIZE` - worker coroutine stack size in bytes, decimal
//!   or `0x`-prefixed hex (default: `0x10000`, 64 KB)
//! - `TURNPIKE_TIMEOUT_MS` - default per-request timeout in milliseconds,
//!   `0` meaning "never" (default: 30000)
//! - `TURNPIKE_MAX_BODY_BYTES` - maximum buffered request-body size
//!   (default: 1 MiB)
//! - `TURNPIKE_CHARSET` - charset advertised on text responses
//!   (default: `utf-8`)

use std::env;
use std::time::Duration;

/// Runtime configuration for the dispatch engine.
///
/// Load once at startup with [`DispatchConfig::from_env()`] and pass it to
/// the dispatcher builder. All knobs have working defaults.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of dispatch worker coroutines
    pub workers: usize,
    /// Worker label pattern; `{}` is replaced by the worker index
    pub worker_name: String,
    /// Maximum executor queue depth before submissions are rejected
    pub queue_bound: usize,
    /// Stack size for worker coroutines in bytes
    pub stack_size: usize,
    /// Default per-request timeout in milliseconds; 0 means "never"
    pub timeout_ms: u64,
    /// Maximum buffered request-body size in bytes
    pub max_body_bytes: u64,
    /// Charset advertised on text responses
    pub charset: String,
}

impl DispatchConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: parse_env("TURNPIKE_WORKERS").unwrap_or(defaults.workers),
            worker_name: env::var("TURNPIKE_WORKER_NAME").unwrap_or(defaults.worker_name),
            queue_bound: parse_env("TURNPIKE_QUEUE_BOUND").unwrap_or(defaults.queue_bound),
            stack_size: parse_size_env("TURNPIKE_STACK_SIZE").unwrap_or(defaults.stack_size),
            timeout_ms: parse_env("TURNPIKE_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            max_body_bytes: parse_env("TURNPIKE_MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            charset: env::var("TURNPIKE_CHARSET").unwrap_or(defaults.charset),
        }
    }

    /// Default timeout as a `Duration`, `None` meaning "never".
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }

    /// Label for a worker, from the configured pattern.
    pub fn worker_label(&self, index: usize) -> String {
        if self.worker_name.contains("{}") {
            self.worker_name.replace("{}", &index.to_string())
        } else {
            format!("{}-{}", self.worker_name, index)
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            worker_name: "dispatch-worker-{}".to_string(),
            queue_bound: 1024,
            stack_size: 0x10000,
            timeout_ms: 30_000,
            max_body_bytes: 1024 * 1024,
            charset: "utf-8".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Parse a size value that may be decimal (`65536`) or hex (`0x10000`).
fn parse_size_env(name: &str) -> Option<usize> {
    env::var(name).ok().and_then(|s| {
        if let Some(hex) = s.strip_prefix("0x") {
            usize::from_str_radix(hex, 16).ok()
        } else {
            s.parse().ok()
        }
    })
}
