//! In-process implementation of [DocumentStore].
//!
//! In the original deployment this was a managed document database; here the
//! documents live in a process-wide map. Batches are applied under a single
//! write lock in two phases (validate, then apply), which gives the
//! all-or-nothing guarantee the trait demands.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{
    Direction, DocPath, Document, DocumentStore, FieldValue, Precondition, Query, StoreError,
    WriteBatch, WriteOp,
};

/// An in-memory document store
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Document>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs.get(&path.to_string()).cloned())
    }

    async fn query(&self, query: Query) -> Result<Vec<(String, Document)>, StoreError> {
        let docs = self.docs.read().await;

        let prefix = format!("{}/", query.collection);
        let mut results: Vec<(String, Document)> = docs
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            // Direct children only, not documents of nested subcollections
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .filter(|(_, doc)| {
                query
                    .filters
                    .iter()
                    .all(|(field, value)| doc.get(field) == Some(value))
            })
            .map(|(key, doc)| (key[prefix.len()..].to_string(), doc.clone()))
            .collect();

        if let Some((field, direction)) = &query.order_by {
            results.sort_by(|(_, a), (_, b)| {
                let ordering = cmp_field(a.get(field), b.get(field));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;

        // Validate every operation before touching anything
        for op in batch.ops() {
            if let WriteOp::Update { path, guard, .. } = op {
                let doc = docs
                    .get(&path.to_string())
                    .ok_or_else(|| StoreError::NotFound(path.clone()))?;

                match guard {
                    Some(Precondition::FieldEquals(field, expected)) => {
                        if doc.get(field) != Some(expected) {
                            return Err(StoreError::PreconditionFailed(path.clone()));
                        }
                    }
                    Some(Precondition::FieldAbsent(field)) => {
                        if lookup_field(doc, field).is_some() {
                            return Err(StoreError::PreconditionFailed(path.clone()));
                        }
                    }
                    None => {}
                }
            }
        }

        // One timestamp for the whole batch
        let now = Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));

        for op in batch.ops() {
            match op {
                WriteOp::Set { path, fields } => {
                    let mut doc = Document::new();
                    for (key, value) in &fields.0 {
                        merge_field(&mut doc, key, value, &now);
                    }
                    docs.insert(path.to_string(), doc);
                }
                WriteOp::Update { path, fields, .. } => {
                    // Presence was validated above
                    let doc = docs.entry(path.to_string()).or_default();
                    for (key, value) in &fields.0 {
                        merge_field(doc, key, value, &now);
                    }
                }
                WriteOp::Delete { path } => {
                    docs.remove(&path.to_string());
                }
            }
        }

        Ok(())
    }

    fn allocate_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Resolve a [FieldValue] against the current value at its destination
fn resolve(value: &FieldValue, current: Option<&Value>, now: &Value) -> Value {
    match value {
        FieldValue::Json(v) => v.clone(),
        FieldValue::ServerTimestamp => now.clone(),
        FieldValue::Increment(n) => {
            let base = current.and_then(Value::as_i64).unwrap_or(0);
            Value::from(base + n)
        }
    }
}

/// Write a possibly dotted field path (`members.u1`) into a document,
/// creating intermediate objects as needed
fn merge_field(doc: &mut Document, key: &str, value: &FieldValue, now: &Value) {
    let mut target = doc;
    let mut segments = key.split('.').peekable();

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            let current = target.get(segment);
            let resolved = resolve(value, current, now);
            target.insert(segment.to_string(), resolved);
            return;
        }

        let entry = target
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Document::new()));
        if !entry.is_object() {
            *entry = Value::Object(Document::new());
        }
        // Both arms above guarantee an object
        target = entry.as_object_mut().unwrap();
    }
}

/// Resolve a possibly dotted field path (`members.u1`) in a document
fn lookup_field<'a>(doc: &'a Document, key: &str) -> Option<&'a Value> {
    let mut segments = key.split('.');
    let mut value = doc.get(segments.next()?)?;
    for segment in segments {
        value = value.as_object()?.get(segment)?;
    }
    Some(value)
}

/// Compare two optional field values; missing fields sort first
fn cmp_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x, y) {
            (Value::Number(m), Value::Number(n)) => m
                .as_f64()
                .partial_cmp(&n.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(s), Value::String(t)) => s.cmp(t),
            (Value::Bool(p), Value::Bool(q)) => p.cmp(q),
            _ => Ordering::Equal,
        },
    }
}
