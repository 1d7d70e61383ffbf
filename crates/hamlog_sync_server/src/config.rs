//! Service configuration.

/// Configuration for the sync service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on records returned per kind, whatever the client asks for.
    pub max_window: u32,
    /// Maximum records (both kinds together) accepted in one request.
    pub max_request_records: usize,
}

impl ServerConfig {
    /// Creates a new service configuration.
    pub fn new() -> Self {
        Self {
            max_window: 500,
            max_request_records: 1000,
        }
    }

    /// Sets the maximum window size.
    #[must_use]
    pub fn with_max_window(mut self, max: u32) -> Self {
        self.max_window = max;
        self
    }

    /// Sets the maximum records per request.
    #[must_use]
    pub fn with_max_request_records(mut self, max: usize) -> Self {
        self.max_request_records = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
