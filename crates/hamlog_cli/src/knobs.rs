//! Sync knobs shared by the commands that run the engine.

use crate::error::CliResult;
use clap::{ArgAction, Args};
use hamlog_sync_engine::SyncConfig;
use hamlog_sync_protocol::Consent;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine settings, each with an environment fallback.
#[derive(Debug, Clone, Args)]
pub struct SyncKnobs {
    /// Enable syncing
    #[arg(long, env = "HAMLOG_SYNC_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub enabled: bool,

    /// QSOs per cycle in large mode
    #[arg(long, env = "HAMLOG_SYNC_BATCH_SIZE", default_value_t = 50)]
    pub batch_size: u32,

    /// Pause between continuation cycles, in milliseconds
    #[arg(long, env = "HAMLOG_SYNC_LOOP_DELAY_MS", default_value_t = 0)]
    pub loop_delay_ms: u64,

    /// Quiet period after which the watchdog forces a cycle, in milliseconds
    #[arg(long, env = "HAMLOG_SYNC_CHECK_PERIOD_MS", default_value_t = 60_000)]
    pub check_period_ms: u64,

    /// Device identifier sent to the service (default: stored next to the logbook)
    #[arg(long, env = "HAMLOG_SYNC_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Consent to in-app use of the uploaded data
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub consent_app: bool,

    /// Consent to public listing of the uploaded data
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub consent_public: bool,
}

impl SyncKnobs {
    /// Builds the engine configuration.
    pub fn to_config(&self, client_id: &str) -> SyncConfig {
        let defaults = SyncConfig::new();
        let small = defaults.small_batch_size.min(self.batch_size);
        SyncConfig::new()
            .with_sync_enabled(self.enabled)
            .with_batch_sizes(small, self.batch_size)
            .with_loop_delay(Duration::from_millis(self.loop_delay_ms))
            .with_check_period(Duration::from_millis(self.check_period_ms))
            .with_consent(Consent::new(self.consent_app, self.consent_public))
            .with_client_id(client_id)
    }

    /// Returns the explicit client id, or the one kept beside the store.
    ///
    /// A new id is generated and saved the first time a store is synced so
    /// that the service can recognise this device's own writes.
    pub fn resolve_client_id(&self, store: &Path) -> CliResult<String> {
        if let Some(id) = &self.client_id {
            return Ok(id.clone());
        }

        let path = client_id_path(store);
        if path.exists() {
            let id = fs::read_to_string(&path)?.trim().to_string();
            if !id.is_empty() {
                return Ok(id);
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        fs::write(&path, &id)?;
        tracing::info!(client_id = %id, path = %path.display(), "generated client id");
        Ok(id)
    }
}

fn client_id_path(store: &Path) -> PathBuf {
    let mut name = store.as_os_str().to_owned();
    name.push(".client-id");
    PathBuf::from(name)
}
