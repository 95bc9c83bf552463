//! In-memory stand-in for the document store, used for dry runs.
//!
//! It applies bulk payloads with the store's per-item semantics (conflicts on create,
//! missing documents on update) and answers like the store's bulk endpoint would.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::models::bulk::Operation;
use crate::models::bulk_response::{BulkItem, BulkItemError, BulkItemStatus, BulkResponse};
use crate::models::Row;
use crate::sink::BulkTransport;
use crate::source::DocumentCursor;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resource: String,
    exists: bool,
    docs: Vec<(String, Row)>,
    positions: HashMap<String, usize>,
    versions: HashMap<String, i64>,
    auto_id: u64,
}

impl MemoryStore {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    pub fn create_index(&mut self) {
        self.exists = true;
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Row> {
        self.positions.get(id).map(|pos| &self.docs[*pos].1)
    }

    /// Applies an NDJSON bulk payload. A malformed line fails the whole request;
    /// rejected items are reported in the response.
    pub fn apply_bulk(&mut self, payload: &[u8]) -> Result<BulkResponse> {
        self.exists = true;
        let mut lines = payload
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace));
        let mut items = Vec::new();

        while let Some(action_line) = lines.next() {
            let action: Row = serde_json::from_slice(action_line)?;
            let (name, metadata) = action.into_iter().next().ok_or_else(|| {
                BridgeError::Decode(String::from("empty bulk action line"))
            })?;
            let body: Row = match lines.next() {
                Some(line) => serde_json::from_slice(line)?,
                None => return Err(BridgeError::Decode(format!("bulk action [{name}] has no body"))),
            };
            let id = metadata
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string);
            let item = match name.parse::<Operation>() {
                Ok(Operation::Index) => BulkItem::Index(self.index(id, body)),
                Ok(Operation::Create) => BulkItem::Create(self.create(id, body)),
                Ok(Operation::Update) => BulkItem::Update(self.update(id, body)),
                Err(_) => BulkItem::Index(failure(
                    id,
                    400,
                    "illegal_argument_exception",
                    format!("Malformed action/metadata line, expected one of [create, index, update] but found [{name}]"),
                )),
            };
            items.push(item);
        }

        let errors = items.iter().any(|item| !item.get_status().is_success());
        debug!("Applied {} bulk items to [{}], errors={}", items.len(), self.resource, errors);
        Ok(BulkResponse {
            took: 0,
            errors,
            items,
        })
    }

    fn index(&mut self, id: Option<String>, body: Row) -> BulkItemStatus {
        let id = id.unwrap_or_else(|| self.next_id());
        let created = !self.positions.contains_key(&id);
        let version = self.put(id.clone(), body);
        self.success(id, version, created)
    }

    fn create(&mut self, id: Option<String>, body: Row) -> BulkItemStatus {
        let id = id.unwrap_or_else(|| self.next_id());
        if let Some(version) = self.versions.get(&id) {
            let reason = format!(
                "[{id}]: version conflict, document already exists (current version [{version}])"
            );
            return failure(Some(id), 409, "version_conflict_engine_exception", reason);
        }
        let version = self.put(id.clone(), body);
        self.success(id, version, true)
    }

    fn update(&mut self, id: Option<String>, mut body: Row) -> BulkItemStatus {
        let Some(id) = id else {
            return failure(
                None,
                400,
                "action_request_validation_exception",
                String::from("Validation Failed: 1: id is missing;"),
            );
        };
        let doc = match body.remove("doc") {
            Some(Value::Object(doc)) => doc,
            _ => {
                return failure(
                    Some(id),
                    400,
                    "action_request_validation_exception",
                    String::from("Validation Failed: 1: script or doc is missing;"),
                )
            }
        };
        let upsert = body
            .get("doc_as_upsert")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match self.positions.get(&id).copied() {
            Some(pos) => {
                let existing = &mut self.docs[pos].1;
                for (key, value) in doc {
                    existing.insert(key, value);
                }
                let version = self.bump(&id);
                self.success(id, version, false)
            }
            None if upsert => {
                let version = self.put(id.clone(), doc);
                self.success(id, version, true)
            }
            None => {
                let reason = format!("[{id}]: document missing");
                failure(Some(id), 404, "document_missing_exception", reason)
            }
        }
    }

    fn put(&mut self, id: String, body: Row) -> i64 {
        match self.positions.get(&id).copied() {
            Some(pos) => self.docs[pos].1 = body,
            None => {
                self.positions.insert(id.clone(), self.docs.len());
                self.docs.push((id.clone(), body));
            }
        }
        self.bump(&id)
    }

    fn bump(&mut self, id: &str) -> i64 {
        let version = self.versions.entry(id.to_string()).or_insert(0);
        *version += 1;
        *version
    }

    fn next_id(&mut self) -> String {
        self.auto_id += 1;
        format!("auto-{}", self.auto_id)
    }

    fn success(&self, id: String, version: i64, created: bool) -> BulkItemStatus {
        BulkItemStatus {
            index: Some(self.resource.clone()),
            id: Some(id),
            version: Some(version),
            result: Some(if created { "created" } else { "updated" }.to_string()),
            status: if created { 201 } else { 200 },
            error: None,
        }
    }

    /// Cursor over the current documents, keeping only `fields` (dotted paths) when given.
    pub fn scan(&self, fields: &[String]) -> MemoryCursor {
        if !self.exists {
            return MemoryCursor {
                docs: VecDeque::new(),
                missing: Some(self.resource.clone()),
            };
        }
        let docs = self
            .docs
            .iter()
            .map(|(_, doc)| filter_source(doc, fields))
            .collect();
        MemoryCursor {
            docs,
            missing: None,
        }
    }
}

impl BulkTransport for MemoryStore {
    fn send(&mut self, payload: &[u8]) -> Result<Option<BulkResponse>> {
        self.apply_bulk(payload).map(Some)
    }
}

fn failure(id: Option<String>, status: u16, error_type: &str, reason: String) -> BulkItemStatus {
    BulkItemStatus {
        id,
        status,
        error: Some(BulkItemError {
            error_type: error_type.to_string(),
            reason,
        }),
        ..BulkItemStatus::default()
    }
}

/// Applies a source filter of dotted paths. An empty filter keeps the whole document.
pub fn filter_source(doc: &Row, fields: &[String]) -> Row {
    if fields.is_empty() {
        return doc.clone();
    }
    let mut out = Row::new();
    for field in fields {
        let segments: Vec<&str> = field.split('.').collect();
        copy_path(doc, &mut out, &segments);
    }
    out
}

fn copy_path(src: &Row, dst: &mut Row, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = src.get(*first) else {
        return;
    };
    if rest.is_empty() {
        dst.insert(first.to_string(), value.clone());
        return;
    }
    if let Value::Object(inner) = value {
        let slot = dst
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(Row::new()));
        if let Value::Object(target) = slot {
            copy_path(inner, target, rest);
        }
    }
}

#[derive(Debug)]
pub struct MemoryCursor {
    docs: VecDeque<Row>,
    missing: Option<String>,
}

impl DocumentCursor for MemoryCursor {
    fn next_document(&mut self) -> Result<Option<Row>> {
        if let Some(resource) = self.missing.take() {
            return Err(BridgeError::TargetNotFound(resource));
        }
        Ok(self.docs.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(lines: &[Value]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in lines {
            out.extend_from_slice(line.to_string().as_bytes());
            out.push(b'\n');
        }
        out
    }

    #[test]
    fn create_conflicts_on_existing_id() {
        let mut store = MemoryStore::new("json/createwithid");
        let body = payload(&[json!({"create": {"_id": "1"}}), json!({"n": 1})]);
        assert!(!store.apply_bulk(&body).unwrap().errors);
        let second = store.apply_bulk(&body).unwrap();
        assert!(second.errors);
        let status = second.items[0].get_status();
        assert_eq!(status.status, 409);
        assert!(second.into_result().is_err());
    }

    #[test]
    fn index_overwrites_and_generates_ids() {
        let mut store = MemoryStore::new("idx");
        store
            .apply_bulk(&payload(&[
                json!({"index": {"_id": "1"}}),
                json!({"n": 1}),
                json!({"index": {"_id": "1"}}),
                json!({"n": 2}),
                json!({"index": {}}),
                json!({"n": 3}),
            ]))
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("1"), Some(&json!({"n": 2}).as_object().cloned().unwrap()));
        assert!(store.get("auto-1").is_some());
    }

    #[test]
    fn update_merges_or_reports_missing() {
        let mut store = MemoryStore::new("idx");
        let missing = store
            .apply_bulk(&payload(&[
                json!({"update": {"_id": "9"}}),
                json!({"doc": {"a": 1}, "doc_as_upsert": false}),
            ]))
            .unwrap();
        assert_eq!(missing.items[0].get_status().status, 404);

        store
            .apply_bulk(&payload(&[
                json!({"update": {"_id": "9"}}),
                json!({"doc": {"a": 1, "b": 1}, "doc_as_upsert": true}),
                json!({"update": {"_id": "9"}}),
                json!({"doc": {"b": 2}, "doc_as_upsert": false}),
            ]))
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(
            store.get("9"),
            Some(&json!({"a": 1, "b": 2}).as_object().cloned().unwrap())
        );
    }

    #[test]
    fn malformed_payload_fails_request() {
        let mut store = MemoryStore::new("idx");
        assert!(store.apply_bulk(b"{\"index\":{}}\nnot json\n").is_err());
        assert!(store.apply_bulk(b"{\"index\":{}}\n").is_err());
    }

    #[test]
    fn scan_applies_dotted_filter() {
        let mut store = MemoryStore::new("idx");
        store
            .apply_bulk(&payload(&[
                json!({"index": {"_id": "1"}}),
                json!({"a": {"b": 1, "c": 2}, "d": 3, "e": 4}),
            ]))
            .unwrap();
        let mut cursor = store.scan(&["a.b".to_string(), "d".to_string()]);
        let doc = cursor.next_document().unwrap().unwrap();
        assert_eq!(Value::Object(doc), json!({"a": {"b": 1}, "d": 3}));
        assert!(cursor.next_document().unwrap().is_none());
    }

    #[test]
    fn scan_of_unknown_target_is_not_found() {
        let store = MemoryStore::new("foobar/missing");
        let mut cursor = store.scan(&[]);
        assert!(matches!(
            cursor.next_document(),
            Err(BridgeError::TargetNotFound(_))
        ));
        assert!(cursor.next_document().unwrap().is_none());
    }
}
