//! # hamlog Sync Server
//!
//! Reference sync service for hamlog.
//!
//! This crate provides:
//! - The remote side of the single-exchange sync contract
//! - Newest-wins record storage per record kind
//! - Per-client settings storage
//! - Failure injection for retry tests
//! - A [`hamlog_sync_protocol::LoopbackServer`] implementation, so engines
//!   can post to the service in-process
//!
//! # Protocol
//!
//! Every request is handled in two steps:
//! 1. Store the incoming Operations, QSOs and settings, remembering which
//!    client wrote each record
//! 2. Answer with the records updated at or after the requested
//!    `sinceMillis`, oldest first, up to the requested limit
//!
//! While `anyClient` is false, records last written by the requesting
//! client are left out; a client never gets its own writes echoed back
//! once its first full sync has completed.
//!
//! ```
//! use hamlog_sync_server::{ServerConfig, SyncService};
//!
//! let service = SyncService::new(ServerConfig::default());
//! assert_eq!(service.record_count(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod records;
mod service;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use records::{RecordLog, StoredRecord, Window};
pub use service::{SyncService, SYNC_ENDPOINT};
