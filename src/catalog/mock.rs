//! Scripted in-memory transport for testing purposes.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Transport, TransportError, TransportResponse};

/// One scripted reply
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: Result<TransportResponse, TransportError>,
    delay: Duration,
}

impl MockReply {
    /// Reply with a status and body
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            outcome: Ok(TransportResponse::new(status, body)),
            delay: Duration::ZERO,
        }
    }

    /// Reply with a 200 carrying `value` serialized as JSON
    pub fn ok(value: &serde_json::Value) -> Self {
        Self::json(200, value.to_string())
    }

    /// Fail as if the connection were refused
    pub fn connect_error() -> Self {
        Self {
            outcome: Err(TransportError::Connect("connection refused".to_string())),
            delay: Duration::ZERO,
        }
    }

    /// Fail as if the request timed out
    pub fn timeout_error() -> Self {
        Self {
            outcome: Err(TransportError::Timeout("deadline elapsed".to_string())),
            delay: Duration::ZERO,
        }
    }

    /// Hold the reply back for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request the mock has seen
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub method: String,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

/// A transport that serves scripted replies by method and URL path
///
/// Replies queued for a route are served in order; the last one keeps being
/// served once the queue is down to it. Unscripted routes answer 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(String, String), VecDeque<MockReply>>>,
    calls: Mutex<Vec<MockCall>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Create a mock with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply by at least `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a reply for `method` on `path`
    pub fn respond(&self, method: &str, path: &str, reply: MockReply) {
        lock(&self.routes)
            .entry((method.to_uppercase(), path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Every request seen so far
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Number of requests seen for a path
    pub fn call_count(&self, path: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.path == path).count()
    }

    /// Highest number of requests that were in flight at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, method: &str, path: &str) -> MockReply {
        let mut routes = lock(&self.routes);
        match routes.get_mut(&(method.to_string(), path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }

    async fn serve(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<TransportResponse, TransportError> {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());

        lock(&self.calls).push(MockCall {
            method: method.to_string(),
            path: path.clone(),
            params: params.to_vec(),
            body: body.cloned(),
        });

        let reply = self.next_reply(method, &path);
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        let delay = reply.delay.max(self.latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply.outcome
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.serve("GET", url, params, None).await
    }

    async fn post_json(
        &self,
        url: &str,
        params: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        self.serve("POST", url, params, Some(body)).await
    }
}

fn not_found() -> MockReply {
    MockReply::json(404, r#"{"title":"Not Found"}"#)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts a request as in flight until dropped, even if the caller gives up on it
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(current, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
