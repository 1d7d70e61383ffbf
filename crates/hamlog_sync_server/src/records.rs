//! Service-side record storage.

use hamlog_sync_protocol::{RecordKind, RemoteRecord};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A record as the service keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// The record.
    pub record: RemoteRecord,
    /// Client that wrote the current version, if it identified itself.
    pub author: Option<String>,
}

/// All records of one kind, newest version per id.
pub struct RecordLog {
    kind: RecordKind,
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

/// One window of records handed to a client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    /// Records, oldest first.
    pub records: Vec<RemoteRecord>,
    /// Matching records left out of this window.
    pub remaining: usize,
}

impl RecordLog {
    /// Creates an empty log.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the record kind.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Returns the number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a record by id.
    pub fn get(&self, id: &str) -> Option<StoredRecord> {
        self.records.read().get(id).cloned()
    }

    /// Stores a record if it is newer than the stored version.
    ///
    /// Returns true if the record was stored. Equal versions keep the
    /// stored one, so a resent batch changes nothing.
    pub fn upsert(&self, record: RemoteRecord, author: Option<&str>) -> bool {
        let mut records = self.records.write();
        if let Some(existing) = records.get(&record.id) {
            if existing.record.updated_at_millis >= record.updated_at_millis {
                return false;
            }
        }
        records.insert(
            record.id.clone(),
            StoredRecord {
                record,
                author: author.map(str::to_string),
            },
        );
        true
    }

    /// Returns records updated at or after `since_millis`, oldest first.
    ///
    /// Records written by `exclude_author` are left out. The window may
    /// exceed `limit` so that records sharing the last timestamp are never
    /// split across windows: the client's cursor moves past that timestamp.
    pub fn window(&self, since_millis: i64, limit: usize, exclude_author: Option<&str>) -> Window {
        let records = self.records.read();
        let mut matching: Vec<&StoredRecord> = records
            .values()
            .filter(|s| s.record.updated_at_millis >= since_millis)
            .filter(|s| match (exclude_author, s.author.as_deref()) {
                (Some(excluded), Some(author)) => excluded != author,
                _ => true,
            })
            .collect();
        matching.sort_by(|a, b| {
            a.record
                .updated_at_millis
                .cmp(&b.record.updated_at_millis)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });

        let mut take = limit.min(matching.len());
        if take > 0 {
            let boundary = matching[take - 1].record.updated_at_millis;
            while take < matching.len() && matching[take].record.updated_at_millis == boundary {
                take += 1;
            }
        }

        Window {
            records: matching[..take].iter().map(|s| s.record.clone()).collect(),
            remaining: matching.len() - take,
        }
    }
}
