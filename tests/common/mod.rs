//! Shared test helpers: a mock transport and context plumbing.
#![allow(dead_code)]

use http::Method;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use turnpike::context::RequestContext;
use turnpike::transport::{AsyncContext, HttpRequest, HttpResponse};

/// Initialize tracing once per test binary; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// In-memory request the tests hand to the engine.
pub struct MockRequest {
    method: Method,
    target: String,
    headers: Vec<(String, String)>,
    body: Cursor<Vec<u8>>,
    content_length: Option<u64>,
}

impl MockRequest {
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            headers: Vec::new(),
            body: Cursor::new(Vec::new()),
            content_length: None,
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }

    /// Attach a body with a declared content length.
    pub fn with_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        self.content_length = Some(bytes.len() as u64);
        self.body = Cursor::new(bytes);
        self
    }

    /// Attach a body without declaring its length (chunked-style).
    pub fn with_unsized_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Cursor::new(bytes.into());
        self.content_length = None;
        self
    }

    /// Override the declared content length, independent of actual bytes.
    pub fn with_declared_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }
}

impl HttpRequest for MockRequest {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    fn header_names(&self) -> Vec<String> {
        self.headers.iter().map(|(k, _)| k.clone()).collect()
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    fn body(&mut self) -> &mut dyn Read {
        &mut self.body
    }
}

/// Everything the mock response observed, for assertions after dispatch.
#[derive(Debug, Default)]
pub struct ResponseRecord {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body should be JSON")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct RecordWriter(Arc<Mutex<ResponseRecord>>);

impl Write for RecordWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// In-memory response that records everything written through it.
pub struct MockResponse {
    record: Arc<Mutex<ResponseRecord>>,
    writer: RecordWriter,
}

impl MockResponse {
    pub fn new() -> (Self, Arc<Mutex<ResponseRecord>>) {
        let record = Arc::new(Mutex::new(ResponseRecord::default()));
        let writer = RecordWriter(record.clone());
        (
            Self {
                record: record.clone(),
                writer,
            },
            record,
        )
    }
}

impl HttpResponse for MockResponse {
    fn set_status(&mut self, status: u16) {
        self.record.lock().unwrap().status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        let mut record = self.record.lock().unwrap();
        record.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        record.headers.push((name.to_lowercase(), value.to_string()));
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }
}

/// Mock async context counting completion signals.
#[derive(Debug, Default)]
pub struct MockAsyncContext {
    completions: AtomicU64,
    timeout: Mutex<Option<Option<Duration>>>,
}

impl MockAsyncContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn completion_count(&self) -> u64 {
        self.completions.load(Ordering::Acquire)
    }

    /// The last timeout value the engine armed, if any.
    pub fn armed_timeout(&self) -> Option<Option<Duration>> {
        *self.timeout.lock().unwrap()
    }

    /// Poll until the context completes or `deadline` elapses.
    pub fn wait_completed(&self, deadline: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if self.completion_count() > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }
}

impl AsyncContext for MockAsyncContext {
    fn set_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.lock().unwrap() = Some(timeout);
    }

    fn complete(&self) {
        self.completions.fetch_add(1, Ordering::Release);
    }
}

/// Open a request context over the mock transport.
pub fn open_ctx(
    request: MockRequest,
) -> (
    Arc<RequestContext>,
    Arc<Mutex<ResponseRecord>>,
    Arc<MockAsyncContext>,
) {
    let (response, record) = MockResponse::new();
    let async_ctx = MockAsyncContext::new();
    let ctx = RequestContext::open(Box::new(request), Box::new(response), async_ctx.clone());
    (ctx, record, async_ctx)
}
