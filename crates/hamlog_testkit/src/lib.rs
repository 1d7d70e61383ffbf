//! # hamlog Testkit
//!
//! Test utilities for the hamlog sync engine.
//!
//! This crate provides:
//! - Record fixtures and seeded stores
//! - Property-based test generators using proptest
//! - A multi-device harness wired to an in-process sync service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hamlog_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn two_devices() {
//!     let mut harness = SyncHarness::new(SyncConfig::new());
//!     let a = harness.add_device("a");
//!     let now = harness.now();
//!     harness.device(a).write(RecordKind::Operation, operation("op", now));
//!     harness.sync_all(20).await;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use hamlog_store::{MemoryStore, SyncStore};
    pub use hamlog_sync_engine::{SyncConfig, SyncMode};
    pub use hamlog_sync_protocol::{RecordKind, SyncableRecord};
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
