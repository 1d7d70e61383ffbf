//! # hamlog Sync Engine
//!
//! Offline-first synchronization of Operations and QSOs with a remote
//! logging service.
//!
//! This crate provides:
//! - Dirty-record selection and batch composition
//! - A single-exchange transport contract with HTTP and mock transports
//! - Newest-wins merge of inbound records
//! - Debounced, single-flight scheduling with backoff and a watchdog
//!
//! ## Architecture
//!
//! Every cycle is one request/response exchange:
//! 1. Select dirty QSOs (or, when none, dirty Operations)
//! 2. Attach their dirty parent Operations and the unconfirmed settings
//! 3. Send them together with the inbound window derived from the cursor
//! 4. Merge the inbound records
//! 5. Mark the sent snapshot synced and advance the cursor in one
//!    store transaction
//!
//! [`SyncEngine::sync_once`] runs one cycle. [`SyncLoop`] runs cycles in
//! the background: it debounces triggers, continues while backlog remains,
//! backs off after failures and forces a cycle when sync has been quiet
//! for too long.
//!
//! ## Key Invariants
//!
//! - At most one cycle is in flight at any instant
//! - A record is marked synced only after the cycle carrying it was
//!   accepted, and only if it did not change meanwhile
//! - The cursor never moves backward
//! - Merging the same response twice changes nothing
//!
//! ## Example
//!
//! ```rust,no_run
//! use hamlog_store::MemoryStore;
//! use hamlog_sync_engine::{MockTransport, SyncConfig, SyncEngine, SyncLoop, SyncMode};
//! use std::sync::Arc;
//!
//! # async fn demo() -> hamlog_sync_engine::SyncResult<()> {
//! let engine = SyncEngine::new(SyncConfig::default(), MockTransport::new(), MemoryStore::new())?;
//! let handle = SyncLoop::spawn(Arc::new(engine));
//! handle.trigger(SyncMode::Small);
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod completion;
mod composer;
mod config;
mod controller;
mod driver;
mod engine;
mod error;
mod http;
mod merge;
mod retry;
mod selector;
mod transport;
mod watchdog;

pub use completion::{Completion, ExchangeCounts};
pub use composer::{compose, ComposedBatch, SentSnapshot};
pub use config::{RetryConfig, SyncConfig, SyncMode};
pub use controller::{CycleOutcome, LoopController, Phase};
pub use driver::{LoopStatus, SyncHandle, SyncLoop};
pub use engine::{CycleReport, SyncEngine, SyncStats};
pub use error::{ErrorClass, SyncError, SyncResult};
pub use hamlog_sync_protocol::{HttpReply, LoopbackServer};
pub use http::{HttpClient, HttpTransport, LoopbackClient, SYNC_PATH};
pub use merge::{apply_response, MergeReport};
pub use retry::{RetryDecision, RetryPolicy};
pub use selector::{select_dirty, Selection, SelectionLimits};
pub use transport::{MockOutcome, MockTransport, SyncTransport};
pub use watchdog::Watchdog;
