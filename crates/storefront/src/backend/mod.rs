//! Remote access shims.
//!
//! The backend-as-a-service platform is opaque to the rest of the app. This
//! module defines the three contracts the repositories talk to:
//!
//! - [`DocumentStore`] - document CRUD, atomic batches and live listeners
//! - [`AuthProvider`] - sign-in/up/out and the process-wide current user
//! - [`SettingsStore`] - the on-device theme flag
//!
//! # Implementations
//!
//! - [`memory`] - in-process store used by tests, demos and `--memory` mode
//! - [`postgres`] - JSONB documents with `LISTEN/NOTIFY` change feeds
//! - [`pg_auth`] - password and federated accounts with argon2 hashes
//! - [`file_settings`] - JSON settings file

pub mod auth;
pub mod file_settings;
pub mod memory;
pub mod pg_auth;
pub mod postgres;
pub mod settings;

use std::cmp::Ordering;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use opticart_core::StoreError;

pub use auth::{AuthError, AuthProvider, AuthSession, FederatedCredential, SignInProvider};
pub use settings::{Settings, SettingsStore};

/// Backend document collections.
///
/// The names are configuration constants of the backend project, not a
/// format this app controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Products,
    Categories,
    Carts,
    Addresses,
    Orders,
    Reviews,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Self; 7] = [
        Self::Users,
        Self::Products,
        Self::Categories,
        Self::Carts,
        Self::Addresses,
        Self::Orders,
        Self::Reviews,
    ];

    /// Collection name on the backend.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Carts => "carts",
            Self::Addresses => "addresses",
            Self::Orders => "orders",
            Self::Reviews => "reviews",
        }
    }

    /// Look up a collection by its backend name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw document: its ID plus a JSON object body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Serialize `value` into a document body.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if `value` cannot be serialized.
    pub fn encode<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self, StoreError> {
        Ok(Self {
            id: id.into(),
            data: serde_json::to_value(value)?,
        })
    }

    /// Deserialize the body, injecting the document ID as `id` when the body
    /// does not carry one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.entry("id")
                .or_insert_with(|| Value::String(self.id.clone()));
        }
        serde_json::from_value(data)
            .map_err(|e| StoreError::DataCorruption(format!("document {}: {e}", self.id)))
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A collection query: top-level field equality filters, one sort key and
/// an optional limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    /// Every document in the collection.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep documents whose `field` equals `value`.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Sort by a top-level field.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Return at most `limit` documents.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document body passes every filter.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| data.get(field) == Some(value))
    }

    /// Filter, sort and truncate documents in memory.
    #[must_use]
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut docs: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();
        if let Some((field, direction)) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.data.get(field), b.data.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }

    /// The filters as one JSON object, for containment matching.
    #[must_use]
    pub fn filter_object(&self) -> Value {
        Value::Object(self.filters.iter().cloned().collect())
    }
}

/// Order JSON values: missing first, then numbers, strings and booleans by
/// their natural order. Mixed types compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace a document.
    Set {
        collection: Collection,
        id: String,
        data: Value,
    },
    /// Shallow-merge fields into a document, creating it if missing.
    Merge {
        collection: Collection,
        id: String,
        fields: Value,
    },
    /// Delete a document; deleting a missing document is not an error.
    Delete { collection: Collection, id: String },
}

impl WriteOp {
    #[must_use]
    pub const fn collection(&self) -> Collection {
        match self {
            Self::Set { collection, .. }
            | Self::Merge { collection, .. }
            | Self::Delete { collection, .. } => *collection,
        }
    }
}

/// Writes committed atomically: all persist or none do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a create-or-replace of a typed value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if `value` cannot be serialized.
    pub fn set<T: Serialize>(
        &mut self,
        collection: Collection,
        id: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self, StoreError> {
        self.ops.push(WriteOp::Set {
            collection,
            id: id.into(),
            data: serde_json::to_value(value)?,
        });
        Ok(self)
    }

    /// Queue a field merge.
    pub fn merge(&mut self, collection: Collection, id: impl Into<String>, fields: Value) -> &mut Self {
        self.ops.push(WriteOp::Merge {
            collection,
            id: id.into(),
            fields,
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, collection: Collection, id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection,
            id: id.into(),
        });
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Stream of live document snapshots.
pub type DocumentStream = BoxStream<'static, Result<Option<Document>, StoreError>>;

/// Stream of live query results.
pub type QueryStream = BoxStream<'static, Result<Vec<Document>, StoreError>>;

/// Document storage with live listeners.
///
/// Listener streams emit the current snapshot first and then one snapshot
/// per change. A failure is emitted once and ends the stream.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Read every document matching `query`.
    async fn query(&self, collection: Collection, query: &Query)
    -> Result<Vec<Document>, StoreError>;

    /// Create or replace a document.
    async fn set(&self, collection: Collection, id: &str, data: Value) -> Result<(), StoreError>;

    /// Shallow-merge fields into a document, creating it if missing.
    async fn merge(&self, collection: Collection, id: &str, fields: Value)
    -> Result<(), StoreError>;

    /// Delete a document.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Commit a batch atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Listen to one document.
    fn watch_document(&self, collection: Collection, id: &str) -> DocumentStream;

    /// Listen to a query.
    fn watch_query(&self, collection: Collection, query: Query) -> QueryStream;
}

/// Merge `fields` into `target` one top-level key at a time.
pub(crate) fn merge_fields(target: &mut Value, fields: Value) {
    match (target, fields) {
        (Value::Object(target), Value::Object(fields)) => {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        (target, fields) => *target = fields,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(id: &str, data: Value) -> Document {
        Document {
            id: id.to_string(),
            data,
        }
    }

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
        assert_eq!(Collection::from_name("sessions"), None);
    }

    #[test]
    fn test_query_filters_sorts_and_limits() {
        let docs = vec![
            doc("a", json!({"userId": "u1", "n": 3})),
            doc("b", json!({"userId": "u2", "n": 1})),
            doc("c", json!({"userId": "u1", "n": 2})),
            doc("d", json!({"userId": "u1"})),
        ];
        let query = Query::all()
            .where_eq("userId", "u1")
            .order_by("n", Direction::Descending)
            .limit(2);
        let ids: Vec<_> = query.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_missing_sort_key_sorts_first() {
        let docs = vec![doc("a", json!({"n": 1})), doc("b", json!({}))];
        let ids: Vec<_> = Query::all()
            .order_by("n", Direction::Ascending)
            .apply(docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_decode_injects_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }
        let named: Named = doc("x1", json!({"name": "frames"})).decode().unwrap();
        assert_eq!(named.id, "x1");
        assert_eq!(named.name, "frames");
    }

    #[test]
    fn test_decode_failure_is_data_corruption() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Strict {
            count: u32,
        }
        let err = doc("x1", json!({"count": "many"}))
            .decode::<Strict>()
            .unwrap_err();
        assert!(matches!(err, StoreError::DataCorruption(_)));
    }

    #[test]
    fn test_merge_fields_is_shallow() {
        let mut target = json!({"a": 1, "nested": {"x": 1}});
        merge_fields(&mut target, json!({"b": 2, "nested": {"y": 2}}));
        assert_eq!(target, json!({"a": 1, "b": 2, "nested": {"y": 2}}));
    }

    #[test]
    fn test_filter_object() {
        let query = Query::all().where_eq("userId", "u1").where_eq("isDefault", true);
        assert_eq!(
            query.filter_object(),
            json!({"userId": "u1", "isDefault": true})
        );
    }
}
