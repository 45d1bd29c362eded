//! `PostgreSQL` document store.
//!
//! # Schema
//!
//! - `opticart.document` - one row per document, body in `data JSONB`
//!
//! A row trigger publishes `collection:id` on the `opticart_document`
//! channel. Each store keeps one `LISTEN` connection and fans the
//! notifications out to its live reads, which re-read when their collection
//! or document changes.

use std::sync::{Arc, Weak};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use opticart_core::StoreError;

use super::{
    Collection, Direction, Document, DocumentStore, DocumentStream, Query, QueryStream,
    WriteBatch, WriteOp,
};

/// Notification channel written by the `document_changed` trigger.
pub const CHANGE_CHANNEL: &str = "opticart_document";

/// Notifications buffered per live read before it is told it lagged.
const FEED_CAPACITY: usize = 256;

/// Translate a driver error into the store taxonomy.
#[must_use]
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Network(err.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
            StoreError::DataCorruption(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

/// A change announcement parsed from a notification payload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Change<'a> {
    collection: &'a str,
    id: &'a str,
}

fn parse_change(payload: &str) -> Option<Change<'_>> {
    payload
        .split_once(':')
        .map(|(collection, id)| Change { collection, id })
}

/// What a live read hears from the shared listener.
#[derive(Debug, Clone)]
enum Signal {
    Changed(Arc<str>),
    Failed(StoreError),
}

/// The store's single `LISTEN` connection and its subscribers.
struct ChangeFeed {
    signals: broadcast::Sender<Signal>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Document store backed by a `PostgreSQL` pool.
///
/// Clones share the pool and the change listener.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    feed: Arc<ChangeFeed>,
}

impl PgDocumentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (signals, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            pool,
            feed: Arc::new(ChangeFeed {
                signals,
                listener: Mutex::new(None),
            }),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Subscribe to change notifications, starting the listener on first use
    /// or after it failed.
    async fn changes(&self) -> Result<broadcast::Receiver<Signal>, StoreError> {
        let mut listener = self.feed.listener.lock().await;
        if listener.as_ref().is_none_or(JoinHandle::is_finished) {
            let connection = listen(&self.pool).await?;
            *listener = Some(tokio::spawn(forward(connection, Arc::downgrade(&self.feed))));
            debug!(channel = CHANGE_CHANNEL, "Change listener started");
        }
        Ok(self.feed.signals.subscribe())
    }
}

/// Relay notifications until the listener fails or the store is dropped.
async fn forward(mut listener: PgListener, feed: Weak<ChangeFeed>) {
    loop {
        let received = listener.recv().await;
        let Some(feed) = feed.upgrade() else {
            break;
        };
        match received {
            Ok(notification) => {
                // No live reads right now is fine.
                let _ = feed.signals.send(Signal::Changed(notification.payload().into()));
            }
            Err(err) => {
                warn!(error = %err, "change listener failed");
                let _ = feed.signals.send(Signal::Failed(map_sqlx_error(err)));
                break;
            }
        }
    }
}

/// Wait for a change `relevant` accepts. A lagged subscriber may have missed
/// one, so it refreshes too.
async fn next_change(
    signals: &mut broadcast::Receiver<Signal>,
    relevant: impl Fn(&Change<'_>) -> bool,
) -> Result<(), StoreError> {
    loop {
        match signals.recv().await {
            Ok(Signal::Changed(payload)) => {
                if parse_change(&payload).is_some_and(|change| relevant(&change)) {
                    return Ok(());
                }
            }
            Ok(Signal::Failed(err)) => return Err(err),
            Err(RecvError::Lagged(_)) => return Ok(()),
            Err(RecvError::Closed) => {
                return Err(StoreError::Backend("change feed closed".to_string()));
            }
        }
    }
}

async fn fetch_document(
    pool: &PgPool,
    collection: Collection,
    id: &str,
) -> Result<Option<Document>, StoreError> {
    let data: Option<Json<Value>> = sqlx::query_scalar(
        "SELECT data FROM opticart.document WHERE collection = $1 AND id = $2",
    )
    .bind(collection.name())
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx_error)?;

    Ok(data.map(|Json(data)| Document {
        id: id.to_string(),
        data,
    }))
}

fn query_sql(query: &Query) -> String {
    let mut sql =
        String::from("SELECT id, data FROM opticart.document WHERE collection = $1 AND data @> $2");
    match &query.order_by {
        Some((_, Direction::Ascending)) => sql.push_str(" ORDER BY data -> $3 ASC NULLS FIRST, id"),
        Some((_, Direction::Descending)) => {
            sql.push_str(" ORDER BY data -> $3 DESC NULLS LAST, id");
        }
        None => sql.push_str(" ORDER BY id"),
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

async fn fetch_query(
    pool: &PgPool,
    collection: Collection,
    query: &Query,
) -> Result<Vec<Document>, StoreError> {
    let sql = query_sql(query);
    let mut statement = sqlx::query_as::<_, (String, Json<Value>)>(&sql)
        .bind(collection.name())
        .bind(Json(query.filter_object()));
    if let Some((field, _)) = &query.order_by {
        statement = statement.bind(field.clone());
    }

    let rows = statement.fetch_all(pool).await.map_err(map_sqlx_error)?;
    Ok(rows
        .into_iter()
        .map(|(id, Json(data))| Document { id, data })
        .collect())
}

async fn apply_op(conn: &mut PgConnection, op: WriteOp) -> Result<(), sqlx::Error> {
    match op {
        WriteOp::Set {
            collection,
            id,
            data,
        } => {
            sqlx::query(
                r"
                INSERT INTO opticart.document (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id)
                DO UPDATE SET data = EXCLUDED.data, updated_at = now()
                ",
            )
            .bind(collection.name())
            .bind(id)
            .bind(Json(data))
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::Merge {
            collection,
            id,
            fields,
        } => {
            sqlx::query(
                r"
                INSERT INTO opticart.document (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id)
                DO UPDATE SET data = opticart.document.data || EXCLUDED.data, updated_at = now()
                ",
            )
            .bind(collection.name())
            .bind(id)
            .bind(Json(fields))
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::Delete { collection, id } => {
            sqlx::query("DELETE FROM opticart.document WHERE collection = $1 AND id = $2")
                .bind(collection.name())
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

async fn listen(pool: &PgPool) -> Result<PgListener, StoreError> {
    let mut listener = PgListener::connect_with(pool)
        .await
        .map_err(map_sqlx_error)?;
    listener
        .listen(CHANGE_CHANNEL)
        .await
        .map_err(map_sqlx_error)?;
    Ok(listener)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        fetch_document(&self.pool, collection, id).await
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        fetch_query(&self.pool, collection, query).await
    }

    async fn set(&self, collection: Collection, id: &str, data: Value) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        apply_op(
            &mut conn,
            WriteOp::Set {
                collection,
                id: id.to_string(),
                data,
            },
        )
        .await
        .map_err(map_sqlx_error)
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        apply_op(
            &mut conn,
            WriteOp::Merge {
                collection,
                id: id.to_string(),
                fields,
            },
        )
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        apply_op(
            &mut conn,
            WriteOp::Delete {
                collection,
                id: id.to_string(),
            },
        )
        .await
        .map_err(map_sqlx_error)
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for op in batch.ops {
            // Dropping `tx` on error rolls back.
            apply_op(&mut tx, op).await.map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }

    fn watch_document(&self, collection: Collection, id: &str) -> DocumentStream {
        let store = self.clone();
        let id = id.to_string();
        stream! {
            let mut signals = match store.changes().await {
                Ok(signals) => signals,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            let mut last: Option<Option<Document>> = None;
            loop {
                match fetch_document(&store.pool, collection, &id).await {
                    Ok(doc) => {
                        if last.as_ref() != Some(&doc) {
                            last = Some(doc.clone());
                            yield Ok(doc);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
                let changed = next_change(&mut signals, |c| {
                    c.collection == collection.name() && c.id == id
                })
                .await;
                if let Err(err) = changed {
                    yield Err(err);
                    break;
                }
            }
        }
        .boxed()
    }

    fn watch_query(&self, collection: Collection, query: Query) -> QueryStream {
        let store = self.clone();
        stream! {
            let mut signals = match store.changes().await {
                Ok(signals) => signals,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            let mut last: Option<Vec<Document>> = None;
            loop {
                match fetch_query(&store.pool, collection, &query).await {
                    Ok(docs) => {
                        if last.as_ref() != Some(&docs) {
                            last = Some(docs.clone());
                            yield Ok(docs);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
                let changed = next_change(&mut signals, |c| c.collection == collection.name()).await;
                if let Err(err) = changed {
                    yield Err(err);
                    break;
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn changed(payload: &str) -> Signal {
        Signal::Changed(payload.into())
    }

    #[tokio::test]
    async fn test_next_change_skips_other_documents() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(changed("carts:u2")).unwrap();
        tx.send(changed("orders:o1")).unwrap();
        tx.send(changed("carts:u1")).unwrap();
        next_change(&mut rx, |c| c.collection == "carts" && c.id == "u1")
            .await
            .unwrap();
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_next_change_reports_listener_failure() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(changed("garbage")).unwrap();
        tx.send(Signal::Failed(StoreError::Network("reset".into())))
            .unwrap();
        let err = next_change(&mut rx, |_| true).await.unwrap_err();
        assert_eq!(err, StoreError::Network("reset".into()));
    }

    #[tokio::test]
    async fn test_lagged_subscriber_refreshes() {
        let (tx, mut rx) = broadcast::channel(2);
        for id in ["u1", "u2", "u3"] {
            tx.send(changed(&format!("orders:{id}"))).unwrap();
        }
        // Nothing matches, but a missed notification might have.
        next_change(&mut rx, |c| c.collection == "carts").await.unwrap();
    }

    #[test]
    fn test_parse_change() {
        assert_eq!(
            parse_change("carts:u1"),
            Some(Change {
                collection: "carts",
                id: "u1"
            })
        );
        assert_eq!(parse_change("garbage"), None);
    }

    #[test]
    fn test_query_sql() {
        assert_eq!(
            query_sql(&Query::all()),
            "SELECT id, data FROM opticart.document WHERE collection = $1 AND data @> $2 ORDER BY id"
        );
        let sql = query_sql(
            &Query::all()
                .order_by("createdAt", Direction::Descending)
                .limit(5),
        );
        assert!(sql.ends_with("ORDER BY data -> $3 DESC NULLS LAST, id LIMIT 5"));
    }

    #[test]
    fn test_pool_errors_are_network() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StoreError::Network(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }
}
