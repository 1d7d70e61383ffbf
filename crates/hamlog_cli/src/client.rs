//! `reqwest`-backed HTTP client.

use crate::error::CliResult;
use hamlog_sync_engine::{HttpClient, HttpReply};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Default timeout for one exchange.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Posts sync requests with `reqwest`.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client with the default timeout.
    pub fn new() -> CliResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, String> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| err.to_string())?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| err.to_string())?;
        tracing::trace!(status, len = body.len(), "sync response received");
        Ok(HttpReply::new(status, body.to_vec()))
    }
}
