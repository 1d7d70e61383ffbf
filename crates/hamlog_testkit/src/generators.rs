//! Property-based test generators using proptest.
//!
//! Ids are drawn from small pools so that scripts revisit the same
//! records; timestamps come from the harness clock, not the strategy.

use hamlog_sync_engine::SyncMode;
use hamlog_sync_protocol::RecordKind;
use proptest::prelude::*;
use serde_json::{json, Value};

/// Number of distinct Operation ids the generators use.
pub const OPERATION_POOL: u8 = 4;

/// Number of distinct QSO ids the generators use.
pub const QSO_POOL: u8 = 12;

/// One step of a generated device script.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEdit {
    /// Create or overwrite an Operation.
    WriteOperation {
        /// Operation id
        id: String,
        /// Payload
        data: Value,
    },
    /// Create or overwrite a QSO.
    WriteQso {
        /// QSO id
        id: String,
        /// Parent Operation id
        parent: String,
        /// Payload
        data: Value,
    },
    /// Soft-delete a record if the device has it.
    Delete {
        /// Record kind
        kind: RecordKind,
        /// Record id
        id: String,
    },
    /// Run one sync cycle.
    Sync(SyncMode),
}

/// An edit bound to a device index.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEdit {
    /// Index into the harness devices.
    pub device: usize,
    /// The edit.
    pub edit: LocalEdit,
}

/// Strategy for Operation ids from the pool.
pub fn operation_id_strategy() -> impl Strategy<Value = String> {
    (0..OPERATION_POOL).prop_map(|n| format!("op-{n}"))
}

/// Strategy for QSO ids from the pool.
pub fn qso_id_strategy() -> impl Strategy<Value = String> {
    (0..QSO_POOL).prop_map(|n| format!("qso-{n:02}"))
}

/// Strategy for a QSO payload.
pub fn qso_data_strategy() -> impl Strategy<Value = Value> {
    (
        prop::string::string_regex("[A-Z]{1,2}[0-9][A-Z]{1,3}").expect("Invalid regex"),
        prop::sample::select(vec!["160m", "80m", "40m", "20m", "15m", "10m", "2m"]),
        prop::sample::select(vec!["SSB", "CW", "FT8", "FM"]),
    )
        .prop_map(|(call, band, mode)| json!({ "call": call, "band": band, "mode": mode }))
}

/// Strategy for sync modes.
pub fn sync_mode_strategy() -> impl Strategy<Value = SyncMode> {
    prop_oneof![Just(SyncMode::Small), Just(SyncMode::Large)]
}

/// Strategy for one local edit.
pub fn local_edit_strategy() -> impl Strategy<Value = LocalEdit> {
    prop_oneof![
        2 => (operation_id_strategy(), "[a-z ]{0,16}")
            .prop_map(|(id, title)| LocalEdit::WriteOperation { id, data: json!({ "title": title }) }),
        6 => (qso_id_strategy(), operation_id_strategy(), qso_data_strategy())
            .prop_map(|(id, parent, data)| LocalEdit::WriteQso { id, parent, data }),
        1 => (prop_oneof![Just(RecordKind::Operation), Just(RecordKind::Qso)], qso_id_strategy(), operation_id_strategy())
            .prop_map(|(kind, qso, op)| {
                let id = if kind == RecordKind::Qso { qso } else { op };
                LocalEdit::Delete { kind, id }
            }),
        2 => sync_mode_strategy().prop_map(LocalEdit::Sync),
    ]
}

/// Strategy for a script spread over `devices` devices.
pub fn device_script_strategy(
    devices: usize,
    min_steps: usize,
    max_steps: usize,
) -> impl Strategy<Value = Vec<DeviceEdit>> {
    prop::collection::vec(
        (0..devices, local_edit_strategy()).prop_map(|(device, edit)| DeviceEdit { device, edit }),
        min_steps..max_steps,
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 128,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 24,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn qso_edits_always_have_a_parent(edit in local_edit_strategy()) {
            if let LocalEdit::WriteQso { parent, .. } = edit {
                prop_assert!(parent.starts_with("op-"));
            }
        }

        #[test]
        fn script_targets_known_devices(script in device_script_strategy(3, 1, 20)) {
            prop_assert!(!script.is_empty());
            prop_assert!(script.iter().all(|step| step.device < 3));
        }
    }
}
