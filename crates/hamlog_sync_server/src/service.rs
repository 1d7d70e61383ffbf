//! The sync service.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::records::{RecordLog, StoredRecord, Window};
use hamlog_sync_protocol::{
    decode_request, encode_response_body, Consent, HttpReply, LoopbackServer, RecordKind,
    RemoteRecord, ResponseMeta, SyncRequest, SyncResponseBody, WindowReply, WindowRequest,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Path the service answers on.
pub const SYNC_ENDPOINT: &str = "/sync";

/// Key for settings and consent of clients that did not identify themselves.
const ANONYMOUS: &str = "";

/// The sync service.
///
/// Holds every Operation and QSO it was sent, newest version per id,
/// and answers each request with the records the client asked for.
///
/// # Example
///
/// ```
/// use hamlog_sync_server::{ServerConfig, SyncService};
///
/// let service = SyncService::new(ServerConfig::default());
/// service.fail_next(2);
/// assert_eq!(service.record_count(), 0);
/// ```
pub struct SyncService {
    config: ServerConfig,
    operations: RecordLog,
    qsos: RecordLog,
    settings: RwLock<HashMap<String, Value>>,
    consents: RwLock<HashMap<String, Consent>>,
    failures_pending: AtomicU32,
    requests: AtomicU64,
}

impl SyncService {
    /// Creates an empty service.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            operations: RecordLog::new(RecordKind::Operation),
            qsos: RecordLog::new(RecordKind::Qso),
            settings: RwLock::new(HashMap::new()),
            consents: RwLock::new(HashMap::new()),
            failures_pending: AtomicU32::new(0),
            requests: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn log(&self, kind: RecordKind) -> &RecordLog {
        match kind {
            RecordKind::Operation => &self.operations,
            RecordKind::Qso => &self.qsos,
        }
    }

    /// Makes the next `count` requests fail with [`ServerError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Returns the number of requests received, failed ones included.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Returns the number of stored records of both kinds.
    pub fn record_count(&self) -> usize {
        self.operations.len() + self.qsos.len()
    }

    /// Returns the number of stored records of one kind.
    pub fn count(&self, kind: RecordKind) -> usize {
        self.log(kind).len()
    }

    /// Returns a stored record.
    pub fn get(&self, kind: RecordKind, id: &str) -> Option<StoredRecord> {
        self.log(kind).get(id)
    }

    /// Stores a record as if `author` had sent it.
    ///
    /// Used to stage changes made on other devices.
    pub fn insert(&self, kind: RecordKind, record: RemoteRecord, author: Option<&str>) -> bool {
        self.log(kind).upsert(record, author)
    }

    /// Returns the settings blob a client sent last.
    pub fn settings_for(&self, client_id: Option<&str>) -> Option<Value> {
        self.settings
            .read()
            .get(client_id.unwrap_or(ANONYMOUS))
            .cloned()
    }

    /// Returns the consent flags a client sent last.
    pub fn consent_for(&self, client_id: Option<&str>) -> Option<Consent> {
        self.consents
            .read()
            .get(client_id.unwrap_or(ANONYMOUS))
            .copied()
    }

    fn take_injected_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Handles one sync request.
    pub fn handle(&self, request: &SyncRequest) -> ServerResult<SyncResponseBody> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.take_injected_failure() {
            tracing::debug!("injected failure");
            return Err(ServerError::Unavailable);
        }

        let incoming = request.operations.len() + request.qsos.len();
        if incoming > self.config.max_request_records {
            return Err(ServerError::TooLarge {
                records: incoming,
                max: self.config.max_request_records,
            });
        }
        for record in &request.operations {
            record
                .validate(RecordKind::Operation)
                .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        }
        for record in &request.qsos {
            record
                .validate(RecordKind::Qso)
                .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        }

        let client = request.client_id();
        let key = client.unwrap_or(ANONYMOUS).to_string();
        self.consents
            .write()
            .insert(key.clone(), request.meta.consent);
        if let Some(settings) = &request.settings {
            self.settings.write().insert(key, settings.clone());
        }

        // Parents first.
        let mut stored = 0;
        for record in &request.operations {
            stored += usize::from(self.operations.upsert(record.clone(), client));
        }
        for record in &request.qsos {
            stored += usize::from(self.qsos.upsert(record.clone(), client));
        }

        let operations = self.window(&self.operations, &request.meta.sync.operations, client);
        let qsos = self.window(&self.qsos, &request.meta.sync.qsos, client);

        tracing::debug!(
            client = client.unwrap_or("-"),
            received = incoming,
            stored,
            operations_out = operations.records.len(),
            qsos_out = qsos.records.len(),
            "handled sync request"
        );

        Ok(SyncResponseBody {
            meta: ResponseMeta {
                operations: Some(reply(&operations)),
                qsos: Some(reply(&qsos)),
            },
            operations: operations.records,
            qsos: qsos.records,
        })
    }

    fn window(&self, log: &RecordLog, request: &WindowRequest, client: Option<&str>) -> Window {
        let limit = request.limit.min(self.config.max_window) as usize;
        let exclude = if request.any_client { None } else { client };
        log.window(request.since_millis, limit, exclude)
    }

    fn handle_encoded(&self, path: &str, body: &[u8]) -> ServerResult<Vec<u8>> {
        if path != SYNC_ENDPOINT {
            return Err(ServerError::NotFound(path.to_string()));
        }
        let request = decode_request(body)?;
        let response = self.handle(&request)?;
        encode_response_body(&response).map_err(|e| ServerError::Internal(e.to_string()))
    }
}

impl LoopbackServer for SyncService {
    /// Answers an encoded POST; refusals carry a JSON `error` body.
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpReply {
        match self.handle_encoded(path, body) {
            Ok(bytes) => HttpReply::new(200, bytes),
            Err(err) => {
                if err.is_server_error() {
                    tracing::warn!(error = %err, "sync request failed");
                } else {
                    tracing::debug!(error = %err, "sync request refused");
                }
                let body = serde_json::json!({ "error": err.to_string() });
                HttpReply::new(err.status(), body.to_string().into_bytes())
            }
        }
    }
}

fn reply(window: &Window) -> WindowReply {
    WindowReply {
        returned: u32::try_from(window.records.len()).unwrap_or(u32::MAX),
        remaining: u32::try_from(window.remaining).unwrap_or(u32::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hamlog_sync_protocol::{
        decode_response_body, encode_request, ClientInfo, RequestMeta, SyncCursor, SyncWindow,
        SyncableRecord,
    };
    use serde_json::json;

    fn request(client: Option<&str>, cursor: SyncCursor) -> SyncRequest {
        SyncRequest::new(RequestMeta {
            consent: Consent::new(true, false),
            sync: SyncWindow {
                operations: cursor.operations_window(50),
                qsos: cursor.qsos_window(10),
            },
            client: client.map(|id| ClientInfo { id: id.into() }),
        })
    }

    fn op(id: &str, updated: i64) -> RemoteRecord {
        RemoteRecord::from_local(&SyncableRecord::new(id, updated))
    }

    fn qso(id: &str, parent: &str, updated: i64) -> RemoteRecord {
        RemoteRecord::from_local(&SyncableRecord::new(id, updated).with_parent(parent))
    }

    #[test]
    fn stores_and_echoes_during_bootstrap() {
        let service = SyncService::new(ServerConfig::default());
        let mut req = request(Some("a"), SyncCursor::new());
        req.operations.push(op("op", 1));
        req.qsos.push(qso("q", "op", 2));

        let body = service.handle(&req).unwrap();
        assert_eq!(service.record_count(), 2);
        // anyClient=true before the first full sync.
        assert_eq!(body.operations.len(), 1);
        assert_eq!(body.qsos.len(), 1);
        assert_eq!(
            body.meta.qsos,
            Some(WindowReply {
                returned: 1,
                remaining: 0
            })
        );
    }

    #[test]
    fn own_writes_not_echoed_after_full_sync() {
        let service = SyncService::new(ServerConfig::default());
        service.insert(RecordKind::Qso, qso("theirs", "op", 5), Some("b"));

        let mut req = request(Some("a"), SyncCursor::new().completed());
        req.qsos.push(qso("mine", "op", 6));

        let body = service.handle(&req).unwrap();
        let ids: Vec<_> = body.qsos.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["theirs"]);
    }

    #[test]
    fn window_respects_cursor() {
        let service = SyncService::new(ServerConfig::default());
        for i in 1..=5 {
            service.insert(RecordKind::Operation, op(&format!("op{i}"), i * 10), None);
        }

        let cursor = SyncCursor::new().advanced(Some(30), None).completed();
        let body = service.handle(&request(Some("a"), cursor)).unwrap();
        let ids: Vec<_> = body.operations.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["op4", "op5"]);
    }

    #[test]
    fn max_window_caps_client_limit() {
        let service = SyncService::new(ServerConfig::new().with_max_window(2));
        for i in 1..=5 {
            service.insert(RecordKind::Operation, op(&format!("op{i}"), i), None);
        }
        let body = service.handle(&request(None, SyncCursor::new())).unwrap();
        assert_eq!(body.operations.len(), 2);
        assert_eq!(body.meta.operations.unwrap().remaining, 3);
    }

    #[test]
    fn older_version_does_not_overwrite() {
        let service = SyncService::new(ServerConfig::default());
        service.insert(RecordKind::Operation, op("op", 10), Some("b"));

        let mut req = request(Some("a"), SyncCursor::new());
        req.operations.push(op("op", 5));
        service.handle(&req).unwrap();

        let stored = service.get(RecordKind::Operation, "op").unwrap();
        assert_eq!(stored.record.updated_at_millis, 10);
        assert_eq!(stored.author.as_deref(), Some("b"));
    }

    #[test]
    fn settings_and_consent_kept_per_client() {
        let service = SyncService::new(ServerConfig::default());
        let mut req = request(Some("a"), SyncCursor::new());
        req.settings = Some(json!({"grid": "FN31"}));
        service.handle(&req).unwrap();

        assert_eq!(service.settings_for(Some("a")), Some(json!({"grid": "FN31"})));
        assert_eq!(service.settings_for(Some("b")), None);
        assert_eq!(service.consent_for(Some("a")), Some(Consent::new(true, false)));
    }

    #[test]
    fn injected_failures_are_consumed() {
        let service = SyncService::new(ServerConfig::default());
        service.fail_next(2);
        let req = request(None, SyncCursor::new());

        assert!(matches!(service.handle(&req), Err(ServerError::Unavailable)));
        assert!(matches!(service.handle(&req), Err(ServerError::Unavailable)));
        assert!(service.handle(&req).is_ok());
        assert_eq!(service.request_count(), 3);
    }

    #[test]
    fn rejects_oversized_and_invalid_requests() {
        let service = SyncService::new(ServerConfig::new().with_max_request_records(1));
        let mut req = request(None, SyncCursor::new());
        req.operations.push(op("a", 1));
        req.operations.push(op("b", 1));
        assert!(matches!(
            service.handle(&req),
            Err(ServerError::TooLarge { records: 2, max: 1 })
        ));

        let mut req = request(None, SyncCursor::new());
        req.qsos.push(RemoteRecord::from_local(&SyncableRecord::new("orphan", 1)));
        let err = service.handle(&req).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(service.record_count(), 0);
    }

    #[test]
    fn post_round_trip() {
        let service = SyncService::new(ServerConfig::default());
        let mut req = request(Some("a"), SyncCursor::new());
        req.operations.push(op("op", 1));

        let reply = service.handle_post("/sync", &encode_request(&req).unwrap());
        assert_eq!(reply.status, 200);
        let body = decode_response_body(&reply.body).unwrap();
        assert_eq!(body.operations.len(), 1);

        assert_eq!(service.handle_post("/sync", b"not json").status, 400);
        assert_eq!(service.handle_post("/other", b"{}").status, 404);

        service.fail_next(1);
        let reply = service.handle_post("/sync", &encode_request(&req).unwrap());
        assert_eq!(reply.status, 503);
        assert!(String::from_utf8(reply.body).unwrap().contains("unavailable"));
    }
}
