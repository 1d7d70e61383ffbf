//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so the engine does not
//! pick an HTTP library for its users.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use hamlog_sync_protocol::{
    decode_response_body, encode_request, ExchangeResponse, HttpReply, LoopbackServer, SyncRequest,
};
use parking_lot::RwLock;
use std::future::Future;

/// Path of the sync endpoint, relative to the base URL.
pub const SYNC_PATH: &str = "/sync";

/// HTTP client abstraction.
///
/// `Err` means no reply arrived at all.
pub trait HttpClient: Send + Sync {
    /// Sends a JSON POST request.
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<HttpReply, String>> + Send;
}

/// HTTP-based sync transport.
///
/// Uses JSON encoding for request/response bodies.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the sync service (e.g., "https://sync.example.com").
    base_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the URL requests are posted to.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, SYNC_PATH)
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    async fn exchange(&self, request: &SyncRequest) -> SyncResult<ExchangeResponse> {
        let body = encode_request(request)?;
        let url = self.endpoint();

        let reply = self.client.post(&url, body).await.map_err(|e| {
            self.set_error(&e);
            SyncError::transport_retryable(e)
        })?;

        if !reply.is_success() {
            let message = format!("status {}", reply.status);
            self.set_error(&message);
            tracing::debug!(status = reply.status, "sync service rejected request");
            return Ok(ExchangeResponse::rejected(reply.status));
        }

        let json = decode_response_body(&reply.body).map_err(|e| {
            let message = e.to_string();
            self.set_error(&message);
            SyncError::Protocol(message)
        })?;

        self.clear_error();
        Ok(ExchangeResponse {
            ok: true,
            status: Some(reply.status),
            json: Some(json),
        })
    }
}

/// A loopback HTTP client that routes requests directly to a service.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given service.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the service.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
        // Strip scheme and host.
        let path = url
            .find("://")
            .and_then(|i| url[i + 3..].find('/').map(|j| &url[i + 3 + j..]))
            .unwrap_or(url);

        Ok(self.server.handle_post(path, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hamlog_sync_protocol::{
        encode_response_body, Consent, RemoteRecord, RequestMeta, SyncCursor, SyncResponseBody,
        SyncWindow, SyncableRecord,
    };

    struct TestClient {
        reply: RwLock<Result<HttpReply, String>>,
        seen_url: RwLock<Option<String>>,
    }

    impl TestClient {
        fn new(reply: Result<HttpReply, String>) -> Self {
            Self {
                reply: RwLock::new(reply),
                seen_url: RwLock::new(None),
            }
        }
    }

    impl HttpClient for TestClient {
        async fn post(&self, url: &str, _body: Vec<u8>) -> Result<HttpReply, String> {
            *self.seen_url.write() = Some(url.to_string());
            self.reply.read().clone()
        }
    }

    fn request() -> SyncRequest {
        let cursor = SyncCursor::new();
        SyncRequest::new(RequestMeta {
            consent: Consent::new(true, false),
            sync: SyncWindow {
                operations: cursor.operations_window(50),
                qsos: cursor.qsos_window(10),
            },
            client: None,
        })
    }

    #[tokio::test]
    async fn posts_to_sync_endpoint() {
        let body = SyncResponseBody::new(
            vec![],
            vec![RemoteRecord::from_local(
                &SyncableRecord::new("q", 5).with_parent("op"),
            )],
        );
        let client = TestClient::new(Ok(HttpReply::new(
            200,
            encode_response_body(&body).unwrap(),
        )));
        let transport = HttpTransport::new("https://sync.example.com/", client);
        assert_eq!(transport.base_url(), "https://sync.example.com");

        let response = transport.exchange(&request()).await.unwrap();
        assert!(response.ok);
        assert_eq!(response.json, Some(body));
        assert_eq!(
            transport.client.seen_url.read().as_deref(),
            Some("https://sync.example.com/sync")
        );
        assert!(transport.last_error().is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_not_ok() {
        let client = TestClient::new(Ok(HttpReply::new(503, b"busy".to_vec())));
        let transport = HttpTransport::new("https://sync.example.com", client);

        let response = transport.exchange(&request()).await.unwrap();
        assert!(!response.ok);
        assert_eq!(response.status, Some(503));
        assert!(response.json.is_none());
        assert!(transport.last_error().is_some());
    }

    #[tokio::test]
    async fn network_failure_is_retryable() {
        let client = TestClient::new(Err("connection refused".into()));
        let transport = HttpTransport::new("https://sync.example.com", client);

        let err = transport.exchange(&request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn unreadable_body_is_protocol_error() {
        let client = TestClient::new(Ok(HttpReply::new(200, b"<html>".to_vec())));
        let transport = HttpTransport::new("https://sync.example.com", client);

        let err = transport.exchange(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
    }

    struct Echo;

    impl LoopbackServer for Echo {
        fn handle_post(&self, path: &str, _body: &[u8]) -> HttpReply {
            HttpReply::new(200, path.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn loopback_strips_host() {
        let client = LoopbackClient::new(Echo);
        let reply = client
            .post("http://localhost:8080/sync", Vec::new())
            .await
            .unwrap();
        assert_eq!(reply.body, b"/sync");
    }

    #[tokio::test]
    async fn shared_service_serves_loopback_transport() {
        use hamlog_sync_server::{ServerConfig, SyncService};
        use std::sync::Arc;

        let service = Arc::new(SyncService::new(ServerConfig::default()));
        let transport = HttpTransport::new(
            "http://in-process",
            LoopbackClient::new(Arc::clone(&service)),
        );
        let mut req = request();
        req.operations
            .push(RemoteRecord::from_local(&SyncableRecord::new("op", 3)));

        let response = transport.exchange(&req).await.unwrap();
        assert!(response.ok);
        assert_eq!(service.record_count(), 1);
        assert_eq!(transport.client.server().request_count(), 1);
    }
}
