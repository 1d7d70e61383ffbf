//! # hamlog Sync Protocol
//!
//! Types exchanged between a hamlog device and the remote sync service.
//!
//! This crate provides:
//! - [`SyncableRecord`] and [`RemoteRecord`], the local and wire forms of
//!   Operations and QSOs
//! - [`SyncRequest`] / [`ExchangeResponse`], the one request/response pair
//!   of the exchange
//! - [`SyncCursor`], the persisted high-water mark of received records
//! - JSON encoding/decoding
//! - [`LoopbackServer`], the seam for answering requests in-process
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod error;
mod loopback;
mod messages;
mod record;

pub use cursor::SyncCursor;
pub use error::{ProtocolError, ProtocolResult};
pub use loopback::{HttpReply, LoopbackServer};
pub use messages::{
    decode_request, decode_response_body, encode_request, encode_response_body, ClientInfo,
    Consent, ExchangeResponse, RequestMeta, ResponseMeta, SyncRequest, SyncResponseBody,
    SyncWindow, WindowReply, WindowRequest,
};
pub use record::{
    RecordKind, RecordVersion, RemoteRecord, SyncableRecord, HISTORICAL_OPERATION_ID,
};
