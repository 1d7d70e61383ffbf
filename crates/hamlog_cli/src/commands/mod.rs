//! CLI command implementations.

pub mod demo;
pub mod resync;
pub mod status;
pub mod sync;
pub mod watch;

use crate::client::ReqwestClient;
use crate::error::CliResult;
use crate::knobs::SyncKnobs;
use hamlog_store::FileStore;
use hamlog_sync_engine::{HttpTransport, SyncEngine};
use std::path::Path;
use std::sync::Arc;

/// Engine running against a file store and a remote service.
pub type RemoteEngine = SyncEngine<HttpTransport<ReqwestClient>, Arc<FileStore>>;

/// Opens the store and wires an engine to `url`.
pub fn open_engine(path: &Path, url: &str, knobs: &SyncKnobs) -> CliResult<RemoteEngine> {
    let store = Arc::new(FileStore::open(path)?);
    let client_id = knobs.resolve_client_id(path)?;
    let config = knobs.to_config(&client_id);
    let transport = HttpTransport::new(url, ReqwestClient::new()?);
    tracing::debug!(url = %transport.endpoint(), client_id = %client_id, "engine configured");
    Ok(SyncEngine::new(config, transport, store)?)
}
