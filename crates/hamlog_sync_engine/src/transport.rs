//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use hamlog_sync_protocol::{ExchangeResponse, SyncRequest, SyncResponseBody};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A sync transport performs the single request/response exchange of a cycle.
///
/// Implementations report an answer the service gave, accepted or not, as
/// `Ok`. `Err` is reserved for failures where no answer arrived or the
/// answer could not be read.
pub trait SyncTransport: Send + Sync {
    /// Sends a request and waits for the answer.
    fn exchange(
        &self,
        request: &SyncRequest,
    ) -> impl Future<Output = SyncResult<ExchangeResponse>> + Send;
}

impl<T: SyncTransport> SyncTransport for Arc<T> {
    fn exchange(
        &self,
        request: &SyncRequest,
    ) -> impl Future<Output = SyncResult<ExchangeResponse>> + Send {
        (**self).exchange(request)
    }
}

/// A scripted outcome for [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Accept the request and answer with this body.
    Respond(SyncResponseBody),
    /// Answer with a non-2xx status.
    Reject(u16),
    /// Fail as if the network dropped.
    NetworkError(String),
    /// Answer 2xx with an unreadable body.
    Malformed,
}

/// A mock transport for testing.
///
/// Outcomes are consumed in order; once the script runs out every
/// exchange is accepted with an empty body.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<SyncRequest>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an outcome to the script.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().push_back(outcome);
    }

    /// Appends an accepted response to the script.
    pub fn push_response(&self, body: SyncResponseBody) {
        self.push_outcome(MockOutcome::Respond(body));
    }

    /// Appends a network failure to the script.
    pub fn push_network_error(&self, message: impl Into<String>) {
        self.push_outcome(MockOutcome::NetworkError(message.into()));
    }

    /// Delays every exchange by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Returns all requests seen so far.
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of exchanges attempted.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the highest number of exchanges that overlapped.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl SyncTransport for MockTransport {
    async fn exchange(&self, request: &SyncRequest) -> SyncResult<ExchangeResponse> {
        self.requests.lock().push(request.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let outcome = self.script.lock().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            None => Ok(ExchangeResponse::ok(SyncResponseBody::empty())),
            Some(MockOutcome::Respond(body)) => Ok(ExchangeResponse::ok(body)),
            Some(MockOutcome::Reject(status)) => Ok(ExchangeResponse::rejected(status)),
            Some(MockOutcome::NetworkError(message)) => {
                Err(SyncError::transport_retryable(message))
            }
            Some(MockOutcome::Malformed) => Ok(ExchangeResponse {
                ok: true,
                status: Some(200),
                json: None,
            }),
        }
    }
}
