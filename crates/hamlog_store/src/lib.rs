//! # hamlog Store
//!
//! The local storage contract consumed by the sync engine.
//!
//! The store holds Operations and QSOs, each with a `synced` flag, plus the
//! settings blob and the persisted [`SyncCursor`](hamlog_sync_protocol::SyncCursor).
//!
//! ## Design Principles
//!
//! - Point queries and point updates only; no query language
//! - Calls never suspend, so a cycle's reads and writes are not
//!   interleaved with another cycle's
//! - [`SyncStore::commit_cycle`] is the single atomic transaction that
//!   marks a transmitted snapshot synced and advances the cursor
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For tests and embedding
//! - [`FileStore`] - A JSON document on disk, replaced atomically on
//!   every write
//!
//! ## Example
//!
//! ```rust
//! use hamlog_store::{MemoryStore, SyncStore};
//! use hamlog_sync_protocol::{RecordKind, SyncableRecord};
//!
//! let store = MemoryStore::new();
//! store
//!     .upsert_local(RecordKind::Qso, SyncableRecord::new("q-1", 10).with_parent("op-1"))
//!     .unwrap();
//! assert_eq!(store.count_dirty(RecordKind::Qso).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod state;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use state::StoreState;
pub use store::{CommitSummary, CycleCommit, SyncStore};
