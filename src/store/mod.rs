//! The document store client.
//!
//! All durable state lives in a key-path-addressed document database. This
//! module defines the narrow capability surface the rest of the server is
//! written against: point reads, equality-filtered collection queries and
//! atomic all-or-nothing write batches. Anything that has to change more
//! than one document together must go through a single [WriteBatch] — the
//! store offers no cross-request locking and no read-then-write
//! transactions.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use crate::store::memory::MemoryStore;

pub mod memory;
#[cfg(test)]
pub mod testing;

/// A stored document: a flat-to-nested JSON object without a wrapper type.
pub type Document = serde_json::Map<String, Value>;

/// The path of a single document.
///
/// Paths alternate collection and document segments, so subcollections are
/// expressed naturally: `users/{uid}/friends/{other}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// A document in a root-level collection
    pub fn doc(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segments: vec![collection.into(), id.into()],
        }
    }

    /// A document in a subcollection of this document
    pub fn sub(mut self, collection: impl Into<String>, id: impl Into<String>) -> Self {
        self.segments.push(collection.into());
        self.segments.push(id.into());
        self
    }

    /// The document id, i.e. the last path segment
    pub fn id(&self) -> &str {
        // Constructors guarantee an even, non-zero number of segments
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// The collection this document lives in
    pub fn collection(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// The path of a collection (odd number of segments).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// A root-level collection
    pub fn root(collection: impl Into<String>) -> Self {
        Self {
            segments: vec![collection.into()],
        }
    }

    /// A subcollection of the given document
    pub fn of(doc: &DocPath, collection: impl Into<String>) -> Self {
        let mut segments = doc.segments.clone();
        segments.push(collection.into());
        Self { segments }
    }

    /// The path of the document with the given id in this collection
    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        DocPath { segments }
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A value written to a document field.
///
/// Besides plain values the store provides two server-side primitives:
/// timestamps assigned at commit time and atomic increments. Counters must
/// use [FieldValue::Increment], never a read-increment-write cycle, as the
/// latter races under concurrent commits.
#[derive(Clone, Debug)]
pub enum FieldValue {
    /// A plain JSON value
    Json(Value),
    /// Resolved to the commit time by the store
    ServerTimestamp,
    /// Atomically adds to the current numeric value (missing counts as 0)
    Increment(i64),
}

/// An ordered set of field writes, keyed by field path.
///
/// Keys may be dotted (`members.u1`) to address nested map entries in an
/// [WriteOp::Update].
#[derive(Clone, Debug, Default)]
pub struct Fields(pub BTreeMap<String, FieldValue>);

impl Fields {
    /// An empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a field set from any serializable struct.
    ///
    /// The value must serialize to a JSON object.
    pub fn serialize<T: Serialize>(value: &T) -> Result<Self, StoreError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::Json(v)))
                    .collect(),
            )),
            other => Err(StoreError::InvalidDocument(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Set (or override) a single field
    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }
}

/// A write-time guard attached to an update.
#[derive(Clone, Debug)]
pub enum Precondition {
    /// Apply only if the named top-level field currently equals the value.
    ///
    /// This is how "update only if status is still pending" is enforced at
    /// write time rather than at read time.
    FieldEquals(String, Value),
    /// Apply only if the (possibly dotted) field path resolves to nothing.
    ///
    /// This is how "admit only if no member entry exists yet" is enforced
    /// against a concurrent admission between read and commit.
    FieldAbsent(String),
}

/// A single mutation inside a batch.
#[derive(Clone, Debug)]
pub enum WriteOp {
    /// Replace the document wholesale, creating it if absent
    Set { path: DocPath, fields: Fields },
    /// Merge fields into an existing document; fails if the document is
    /// missing or the guard does not hold
    Update {
        path: DocPath,
        fields: Fields,
        guard: Option<Precondition>,
    },
    /// Delete the document; deleting a missing document is not an error
    Delete { path: DocPath },
}

/// An atomic group of document mutations.
///
/// Either every operation is applied or none is; partial visibility is never
/// possible.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// An empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a wholesale replace
    pub fn set(mut self, path: DocPath, fields: Fields) -> Self {
        self.ops.push(WriteOp::Set { path, fields });
        self
    }

    /// Queue a field merge into an existing document
    pub fn update(mut self, path: DocPath, fields: Fields) -> Self {
        self.ops.push(WriteOp::Update {
            path,
            fields,
            guard: None,
        });
        self
    }

    /// Queue a guarded field merge
    pub fn update_if(mut self, path: DocPath, fields: Fields, guard: Precondition) -> Self {
        self.ops.push(WriteOp::Update {
            path,
            fields,
            guard: Some(guard),
        });
        self
    }

    /// Queue a delete
    pub fn delete(mut self, path: DocPath) -> Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    /// The queued operations, in order
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// Sort direction of a query
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Smallest value first
    Ascending,
    /// Largest value first
    Descending,
}

/// A collection query: equality filters, single-field ordering, result limit.
#[derive(Clone, Debug)]
pub struct Query {
    pub(crate) collection: CollectionPath,
    pub(crate) filters: Vec<(String, Value)>,
    pub(crate) order_by: Option<(String, Direction)>,
    pub(crate) limit: Option<usize>,
}

impl Query {
    /// Query all documents of a collection
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Keep only documents whose field equals the value
    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    /// Order results by a single field
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Cap the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The errors a store call can fail with
#[derive(Debug)]
pub enum StoreError {
    /// An update addressed a document that does not exist
    NotFound(DocPath),
    /// A [Precondition] did not hold at commit time
    PreconditionFailed(DocPath),
    /// A document could not be (de)serialized
    InvalidDocument(String),
    /// The backend call itself failed
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(path) => write!(f, "Document {path} does not exist"),
            StoreError::PreconditionFailed(path) => {
                write!(f, "Precondition failed for {path}")
            }
            StoreError::InvalidDocument(err) => write!(f, "Invalid document: {err}"),
            StoreError::Backend(err) => write!(f, "Store backend error: {err}"),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidDocument(value.to_string())
    }
}

/// Deserialize a document into a typed model
pub fn decode<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// The capability surface of the document database.
///
/// Implementations must apply a committed [WriteBatch] atomically: after a
/// failed commit no operation of the batch may be visible.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single document
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Run a collection query, returning `(document id, document)` pairs
    async fn query(&self, query: Query) -> Result<Vec<(String, Document)>, StoreError>;

    /// Apply a batch atomically
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Allocate a fresh server-side document id
    fn allocate_id(&self) -> String;

    /// Single-document replace
    async fn set(&self, path: DocPath, fields: Fields) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().set(path, fields)).await
    }

    /// Single-document field merge
    async fn update(&self, path: DocPath, fields: Fields) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().update(path, fields)).await
    }

    /// Single-document delete
    async fn delete(&self, path: DocPath) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().delete(path)).await
    }
}
