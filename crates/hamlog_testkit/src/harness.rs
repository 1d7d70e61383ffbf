//! Multi-device harness.
//!
//! Every device owns a [`MemoryStore`] and a [`SyncEngine`] whose
//! transport posts JSON into one shared in-process [`SyncService`], so
//! the full wire path is exercised without sockets.

use crate::fixtures::{operation, qso};
use crate::generators::{DeviceEdit, LocalEdit};
use hamlog_store::{MemoryStore, SyncStore};
use hamlog_sync_engine::{
    CycleReport, HttpTransport, LoopbackClient, SyncConfig, SyncEngine, SyncMode,
};
use hamlog_sync_protocol::{RecordKind, RemoteRecord, SyncableRecord};
use hamlog_sync_server::{ServerConfig, SyncService};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Transport used by harness devices.
pub type ServiceTransport = HttpTransport<LoopbackClient<Arc<SyncService>>>;

/// Engine used by harness devices.
pub type DeviceEngine = SyncEngine<ServiceTransport, Arc<MemoryStore>>;

/// Base URL harness transports post to.
pub const HARNESS_URL: &str = "http://hamlog.test";

/// Builds a transport talking to `service`.
pub fn service_transport(service: &Arc<SyncService>) -> ServiceTransport {
    HttpTransport::new(HARNESS_URL, LoopbackClient::new(Arc::clone(service)))
}

/// One simulated device.
pub struct Device {
    id: String,
    store: Arc<MemoryStore>,
    engine: Arc<DeviceEngine>,
}

impl Device {
    /// Creates a device with an empty store.
    pub fn new(id: &str, config: SyncConfig, service: &Arc<SyncService>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::new(
            config.with_client_id(id),
            service_transport(service),
            Arc::clone(&store),
        )
        .expect("Invalid sync config");
        Self {
            id: id.to_string(),
            store,
            engine: Arc::new(engine),
        }
    }

    /// Returns the client id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<DeviceEngine> {
        &self.engine
    }

    /// Writes a record locally.
    pub fn write(&self, kind: RecordKind, record: SyncableRecord) {
        self.store
            .upsert_local(kind, record)
            .expect("Failed to write record");
    }

    /// Soft-deletes a record; returns false if the device lacks it.
    pub fn delete(&self, kind: RecordKind, id: &str, now_millis: i64) -> bool {
        self.store.delete_local(kind, id, now_millis).is_ok()
    }

    /// Returns a local record.
    pub fn record(&self, kind: RecordKind, id: &str) -> Option<SyncableRecord> {
        self.store
            .get_record(kind, id)
            .expect("Failed to read record")
    }

    /// Returns the number of dirty records of both kinds.
    pub fn dirty(&self) -> usize {
        let qsos = self.store.count_dirty(RecordKind::Qso).expect("count");
        let operations = self.store.count_dirty(RecordKind::Operation).expect("count");
        qsos + operations
    }

    /// Runs one cycle.
    pub async fn sync(&self, mode: SyncMode) -> CycleReport {
        self.engine
            .sync_once(mode)
            .await
            .unwrap_or_else(|err| panic!("sync on {} failed: {err}", self.id))
    }

    /// Runs Large cycles until a cycle completes with nothing dirty.
    ///
    /// Returns the number of cycles. Panics after `max_cycles`.
    pub async fn sync_until_quiet(&self, max_cycles: usize) -> usize {
        for cycle in 1..=max_cycles {
            let report = self.sync(SyncMode::Large).await;
            if report.is_complete() && self.dirty() == 0 {
                return cycle;
            }
        }
        panic!("{} still busy after {max_cycles} cycles", self.id);
    }
}

/// Several devices sharing one service and one clock.
pub struct SyncHarness {
    service: Arc<SyncService>,
    config: SyncConfig,
    devices: Vec<Device>,
    clock: i64,
    latest: BTreeMap<(RecordKind, String), SyncableRecord>,
}

impl SyncHarness {
    /// Creates a harness with a default service.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_server_config(ServerConfig::default(), config)
    }

    /// Creates a harness with a custom service configuration.
    pub fn with_server_config(server: ServerConfig, config: SyncConfig) -> Self {
        Self {
            service: Arc::new(SyncService::new(server)),
            config,
            devices: Vec::new(),
            clock: 1_000,
            latest: BTreeMap::new(),
        }
    }

    /// Returns the shared service.
    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    /// Adds a device and returns its index.
    pub fn add_device(&mut self, id: &str) -> usize {
        self.devices
            .push(Device::new(id, self.config.clone(), &self.service));
        self.devices.len() - 1
    }

    /// Returns a device.
    pub fn device(&self, index: usize) -> &Device {
        &self.devices[index]
    }

    /// Returns all devices.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Advances the shared clock and returns the new time.
    pub fn now(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    /// Applies one scripted step.
    pub async fn apply(&mut self, step: &DeviceEdit) {
        let now = self.now();
        let device = &self.devices[step.device];
        let written = match &step.edit {
            LocalEdit::WriteOperation { id, data } => {
                let record = SyncableRecord::new(id.as_str(), now)
                    .with_started_at(now)
                    .with_data(data.clone());
                device.write(RecordKind::Operation, record);
                Some((RecordKind::Operation, id))
            }
            LocalEdit::WriteQso { id, parent, data } => {
                let record = SyncableRecord::new(id.as_str(), now)
                    .with_parent(parent.as_str())
                    .with_started_at(now)
                    .with_data(data.clone());
                device.write(RecordKind::Qso, record);
                Some((RecordKind::Qso, id))
            }
            LocalEdit::Delete { kind, id } => device.delete(*kind, id, now).then_some((*kind, id)),
            LocalEdit::Sync(mode) => {
                device.sync(*mode).await;
                None
            }
        };

        if let Some((kind, id)) = written {
            if let Some(record) = device.record(kind, id) {
                self.latest.insert((kind, id.clone()), record);
            }
        }
    }

    /// Writes a dirty logbook to one device, one clock tick per record.
    ///
    /// Ids follow [`crate::fixtures::scenarios::logbook`].
    pub fn seed_logbook(&mut self, index: usize, operations: usize, qsos_per_operation: usize) {
        for op in 0..operations {
            let now = self.now();
            self.write(index, RecordKind::Operation, operation(&format!("op-{op:02}"), now));
        }
        for op in 0..operations {
            for n in 0..qsos_per_operation {
                let now = self.now();
                let record = qso(&format!("qso-{op:02}-{n:03}"), &format!("op-{op:02}"), now);
                self.write(index, RecordKind::Qso, record);
            }
        }
    }

    /// Writes a record on one device and tracks the stored row as the
    /// newest version.
    pub fn write(&mut self, index: usize, kind: RecordKind, record: SyncableRecord) {
        let device = &self.devices[index];
        let id = record.id.clone();
        device.write(kind, record);
        if let Some(stored) = device.record(kind, &id) {
            self.latest.insert((kind, id), stored);
        }
    }

    /// Applies a whole script.
    pub async fn run_script(&mut self, script: &[DeviceEdit]) {
        for step in script {
            self.apply(step).await;
        }
    }

    /// Drains every device, twice round, so pulls see every push.
    pub async fn sync_all(&self, max_cycles: usize) {
        for _ in 0..2 {
            for device in &self.devices {
                device.sync_until_quiet(max_cycles).await;
            }
        }
    }

    /// Asserts the service holds the newest local write of every record.
    pub fn assert_service_has_latest(&self) {
        for ((kind, id), expected) in &self.latest {
            let stored = self
                .service
                .get(*kind, id)
                .unwrap_or_else(|| panic!("{kind} {id} never reached the service"));
            assert_eq!(
                stored.record,
                RemoteRecord::from_local(expected),
                "{kind} {id} differs on the service"
            );
        }
    }

    /// Asserts a device holds the service's version of every record.
    pub fn assert_device_matches_service(&self, index: usize) {
        let device = &self.devices[index];
        for ((kind, id), _) in &self.latest {
            let Some(stored) = self.service.get(*kind, id) else {
                continue;
            };
            let local = device
                .record(*kind, id)
                .unwrap_or_else(|| panic!("{kind} {id} missing on {}", device.id()));
            assert_eq!(
                RemoteRecord::from_local(&local),
                stored.record,
                "{kind} {id} differs on {}",
                device.id()
            );
            assert!(local.synced, "{kind} {id} still dirty on {}", device.id());
        }
    }
}
