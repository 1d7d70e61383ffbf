//! Raw HTTP replies and the in-process server seam.

use std::sync::Arc;

/// A raw HTTP answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Creates a reply.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A service that answers POST requests in-process, without sockets.
pub trait LoopbackServer {
    /// Handles a POST to `path` with an encoded body.
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpReply;
}

impl<T: LoopbackServer + ?Sized> LoopbackServer for Arc<T> {
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpReply {
        (**self).handle_post(path, body)
    }
}
