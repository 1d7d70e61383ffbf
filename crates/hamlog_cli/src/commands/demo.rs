//! Demo command implementation.
//!
//! Logs QSOs on one in-memory device, syncs it to an in-process service,
//! then cold-starts a second device from that service.

use crate::error::CliResult;
use crate::knobs::SyncKnobs;
use hamlog_store::{MemoryStore, SyncStore};
use hamlog_sync_engine::{HttpTransport, LoopbackClient, SyncEngine, SyncMode};
use hamlog_sync_protocol::{RecordKind, SyncableRecord};
use hamlog_sync_server::{ServerConfig, SyncService};
use serde_json::json;
use std::sync::Arc;

const CALLS: [&str; 6] = ["K1ABC", "DL2XYZ", "JA1QRP", "VK3DX", "G4ABC", "W6AM"];
const BANDS: [&str; 4] = ["40m", "20m", "15m", "10m"];
const QSOS_PER_OPERATION: usize = 40;

type DemoEngine = SyncEngine<HttpTransport<LoopbackClient<Arc<SyncService>>>, Arc<MemoryStore>>;

fn device(service: &Arc<SyncService>, id: &str, knobs: &SyncKnobs) -> CliResult<DemoEngine> {
    let transport =
        HttpTransport::new("http://in-process", LoopbackClient::new(Arc::clone(service)));
    Ok(SyncEngine::new(
        knobs.to_config(id),
        transport,
        Arc::new(MemoryStore::new()),
    )?)
}

fn log_qsos(store: &MemoryStore, count: usize) -> CliResult<()> {
    let mut clock = 1_700_000_000_000i64;
    for n in 0..count.div_ceil(QSOS_PER_OPERATION) {
        clock += 1;
        store.upsert_local(
            RecordKind::Operation,
            SyncableRecord::new(format!("op-{n}"), clock)
                .with_started_at(clock)
                .with_data(json!({ "title": format!("Activation {n}") })),
        )?;
    }
    for n in 0..count {
        clock += 1_000;
        store.upsert_local(
            RecordKind::Qso,
            SyncableRecord::new(format!("qso-{n:04}"), clock)
                .with_parent(format!("op-{}", n / QSOS_PER_OPERATION))
                .with_started_at(clock)
                .with_data(json!({
                    "call": CALLS[n % CALLS.len()],
                    "band": BANDS[n % BANDS.len()],
                })),
        )?;
    }
    Ok(())
}

async fn drain(name: &str, engine: &DemoEngine) -> CliResult<()> {
    let mut cycles = 0;
    loop {
        let report = engine.sync_once(SyncMode::Large).await?;
        cycles += 1;
        if report.is_complete() {
            break;
        }
    }
    println!(
        "  {name}: {cycles} cycle(s), {} qsos stored locally",
        engine.store().snapshot().qsos.len()
    );
    Ok(())
}

/// Runs the demo.
pub async fn run(qsos: usize, knobs: &SyncKnobs) -> CliResult<()> {
    let service = Arc::new(SyncService::new(ServerConfig::default()));
    let first = device(&service, "demo-first", knobs)?;
    let second = device(&service, "demo-second", knobs)?;

    log_qsos(first.store(), qsos)?;
    println!("Logged {qsos} QSOs on the first device");

    drain("first", &first).await?;
    println!(
        "  service: {} qsos, {} operations",
        service.count(RecordKind::Qso),
        service.count(RecordKind::Operation)
    );
    drain("second", &second).await?;

    let pending = second.store().count_dirty(RecordKind::Qso)?;
    println!("Second device has {pending} pending QSOs");
    Ok(())
}
