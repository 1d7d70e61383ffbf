//! Messages of the remote exchange.
//!
//! One exchange is a single request carrying the outbound batch plus a
//! description of the inbound window, answered by one response.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::RemoteRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data-sharing consent flags sent with every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consent {
    /// Consent to store data with the application service.
    pub app: bool,
    /// Consent to make data publicly visible.
    pub public: bool,
}

impl Consent {
    /// Creates consent flags.
    pub fn new(app: bool, public: bool) -> Self {
        Self { app, public }
    }
}

/// Which records of one kind the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRequest {
    /// Only records updated at or after this instant.
    pub since_millis: i64,
    /// Maximum records to return.
    pub limit: u32,
    /// Include records produced by this very client.
    pub any_client: bool,
}

/// Inbound windows for both record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    /// Operation window.
    pub operations: WindowRequest,
    /// QSO window.
    pub qsos: WindowRequest,
}

/// Identity of the requesting device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Stable device id.
    pub id: String,
}

/// Request metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Consent flags.
    pub consent: Consent,
    /// Requested inbound windows.
    pub sync: SyncWindow,
    /// Requesting device, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientInfo>,
}

/// One sync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Outbound Operations.
    #[serde(default)]
    pub operations: Vec<RemoteRecord>,
    /// Outbound QSOs.
    #[serde(default)]
    pub qsos: Vec<RemoteRecord>,
    /// Settings blob, attached until the service has confirmed it once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Metadata.
    pub meta: RequestMeta,
}

impl SyncRequest {
    /// Creates an empty request with the given metadata.
    pub fn new(meta: RequestMeta) -> Self {
        Self {
            operations: Vec::new(),
            qsos: Vec::new(),
            settings: None,
            meta,
        }
    }

    /// Returns the id of the requesting client, if present.
    pub fn client_id(&self) -> Option<&str> {
        self.meta.client.as_ref().map(|c| c.id.as_str())
    }

    /// Returns true if no records or settings travel with this request.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.qsos.is_empty() && self.settings.is_none()
    }
}

/// Per-kind summary the service may attach to a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReply {
    /// Records returned in this response.
    pub returned: u32,
    /// Records still waiting behind the window.
    pub remaining: u32,
}

/// Response metadata. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Operation window summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<WindowReply>,
    /// QSO window summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qsos: Option<WindowReply>,
}

/// The body of a sync response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponseBody {
    /// Inbound Operations.
    #[serde(default)]
    pub operations: Vec<RemoteRecord>,
    /// Inbound QSOs.
    #[serde(default)]
    pub qsos: Vec<RemoteRecord>,
    /// Metadata.
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl SyncResponseBody {
    /// Creates a response body.
    pub fn new(operations: Vec<RemoteRecord>, qsos: Vec<RemoteRecord>) -> Self {
        Self {
            operations,
            qsos,
            meta: ResponseMeta::default(),
        }
    }

    /// Creates a response with nothing to merge.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Result of one exchange as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeResponse {
    /// Whether the service accepted the request.
    pub ok: bool,
    /// HTTP-like status code, when the transport has one.
    pub status: Option<u16>,
    /// Parsed body, when one came back.
    pub json: Option<SyncResponseBody>,
}

impl ExchangeResponse {
    /// Creates an accepted response.
    pub fn ok(json: SyncResponseBody) -> Self {
        Self {
            ok: true,
            status: Some(200),
            json: Some(json),
        }
    }

    /// Creates a rejected response.
    pub fn rejected(status: u16) -> Self {
        Self {
            ok: false,
            status: Some(status),
            json: None,
        }
    }
}

/// Encodes a request as JSON.
pub fn encode_request(request: &SyncRequest) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(request).map_err(|source| ProtocolError::Encode {
        what: "sync request",
        source,
    })
}

/// Decodes a request from JSON.
pub fn decode_request(bytes: &[u8]) -> ProtocolResult<SyncRequest> {
    serde_json::from_slice(bytes).map_err(|source| ProtocolError::Decode {
        what: "sync request",
        source,
    })
}

/// Encodes a response body as JSON.
pub fn encode_response_body(body: &SyncResponseBody) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(body).map_err(|source| ProtocolError::Encode {
        what: "sync response",
        source,
    })
}

/// Decodes a response body from JSON.
pub fn decode_response_body(bytes: &[u8]) -> ProtocolResult<SyncResponseBody> {
    serde_json::from_slice(bytes).map_err(|source| ProtocolError::Decode {
        what: "sync response",
        source,
    })
}
