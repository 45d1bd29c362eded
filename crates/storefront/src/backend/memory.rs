//! In-process backend.
//!
//! Behaves like the hosted platform from a caller's point of view: listeners
//! re-emit on every change, batches are all-or-nothing and failures can be
//! injected to exercise error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tracing::{debug, instrument};

use opticart_core::{Email, StoreError, UserId};

use super::auth::validate_new_password;
use super::settings::SettingsEdit;
use super::{
    AuthError, AuthProvider, AuthSession, Collection, Document, DocumentStream, DocumentStore,
    FederatedCredential, Query, QueryStream, Settings, SettingsStore, SignInProvider, WriteBatch,
    WriteOp, merge_fields,
};

type Table = BTreeMap<String, Value>;

#[derive(Default)]
struct Failures {
    /// Fails every operation until cleared.
    all: Option<StoreError>,
    /// Fails the next commit only.
    next_commit: Option<StoreError>,
}

struct Inner {
    tables: RwLock<HashMap<Collection, Table>>,
    changes: broadcast::Sender<Collection>,
    failures: Mutex<Failures>,
}

/// Document store held in memory. Cheap to clone; clones share data.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(HashMap::new()),
                changes,
                failures: Mutex::new(Failures::default()),
            }),
        }
    }

    /// Fail every subsequent operation with `error` until
    /// [`clear_failure`](Self::clear_failure). Open listeners observe the
    /// failure immediately.
    pub async fn fail_with(&self, error: StoreError) {
        self.inner.failures.lock().await.all = Some(error);
        for collection in Collection::ALL {
            self.notify(collection);
        }
    }

    /// Stop injecting failures.
    pub async fn clear_failure(&self) {
        let mut failures = self.inner.failures.lock().await;
        failures.all = None;
        failures.next_commit = None;
    }

    /// Fail only the next [`commit`](DocumentStore::commit).
    pub async fn fail_next_commit(&self, error: StoreError) {
        self.inner.failures.lock().await.next_commit = Some(error);
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: Collection) -> usize {
        self.inner
            .tables
            .read()
            .await
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    async fn check(&self) -> Result<(), StoreError> {
        match &self.inner.failures.lock().await.all {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn notify(&self, collection: Collection) {
        // No receivers is fine.
        let _ = self.inner.changes.send(collection);
    }

    async fn read_document(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.check().await?;
        let tables = self.inner.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|table| table.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn read_query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        self.check().await?;
        let tables = self.inner.tables.read().await;
        let docs = tables
            .get(&collection)
            .into_iter()
            .flat_map(|table| table.iter())
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            });
        Ok(query.apply(docs))
    }

    /// Wait until `collection` changes. Returns false once the store is gone.
    async fn changed(rx: &mut broadcast::Receiver<Collection>, collection: Collection) -> bool {
        loop {
            match rx.recv().await {
                Ok(changed) if changed == collection => return true,
                Ok(_) => {}
                // Missed notifications may include ours.
                Err(broadcast::error::RecvError::Lagged(_)) => return true,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}

fn apply_op(tables: &mut HashMap<Collection, Table>, op: WriteOp) {
    match op {
        WriteOp::Set {
            collection,
            id,
            data,
        } => {
            tables.entry(collection).or_default().insert(id, data);
        }
        WriteOp::Merge {
            collection,
            id,
            fields,
        } => {
            let doc = tables
                .entry(collection)
                .or_default()
                .entry(id)
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            merge_fields(doc, fields);
        }
        WriteOp::Delete { collection, id } => {
            if let Some(table) = tables.get_mut(&collection) {
                table.remove(&id);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.read_document(collection, id).await
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        self.read_query(collection, query).await
    }

    async fn set(&self, collection: Collection, id: &str, data: Value) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.ops.push(WriteOp::Set {
            collection,
            id: id.to_string(),
            data,
        });
        self.commit(batch).await
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.merge(collection, id, fields);
        self.commit(batch).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(collection, id);
        self.commit(batch).await
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.check().await?;
        if let Some(err) = self.inner.failures.lock().await.next_commit.take() {
            debug!(error = %err, "injected commit failure");
            return Err(err);
        }

        let mut touched: Vec<Collection> = batch.ops.iter().map(WriteOp::collection).collect();
        touched.sort();
        touched.dedup();

        {
            let mut tables = self.inner.tables.write().await;
            for op in batch.ops {
                apply_op(&mut tables, op);
            }
        }

        for collection in touched {
            self.notify(collection);
        }
        Ok(())
    }

    fn watch_document(&self, collection: Collection, id: &str) -> DocumentStream {
        let store = self.clone();
        let id = id.to_string();
        let mut rx = self.inner.changes.subscribe();
        stream! {
            let mut last: Option<Option<Document>> = None;
            loop {
                match store.read_document(collection, &id).await {
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
                if !Self::changed(&mut rx, collection).await {
                    break;
                }
            }
        }
        .boxed()
    }

    fn watch_query(&self, collection: Collection, query: Query) -> QueryStream {
        let store = self.clone();
        let mut rx = self.inner.changes.subscribe();
        stream! {
            let mut last: Option<Vec<Document>> = None;
            loop {
                match store.read_query(collection, &query).await {
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
                if !Self::changed(&mut rx, collection).await {
                    break;
                }
            }
        }
        .boxed()
    }
}

struct Account {
    uid: UserId,
    email: Email,
    password: Option<SecretString>,
    federated_subject: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl Account {
    fn session(&self, provider: SignInProvider, is_new_user: bool) -> AuthSession {
        AuthSession {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            provider,
            is_new_user,
        }
    }
}

/// Auth provider holding accounts in memory.
///
/// Passwords are kept as secrets rather than hashed; this provider never
/// persists anything.
pub struct MemoryAuthProvider {
    accounts: Mutex<Vec<Account>>,
    current: watch::Sender<Option<AuthSession>>,
    reset_requests: Mutex<Vec<Email>>,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthProvider {
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(Vec::new()),
            current,
            reset_requests: Mutex::new(Vec::new()),
        }
    }

    /// Emails that requested a password reset, oldest first.
    pub async fn reset_requests(&self) -> Vec<Email> {
        self.reset_requests.lock().await.clone()
    }

    fn publish(&self, session: Option<AuthSession>) {
        self.current.send_replace(session);
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    fn current_user(&self) -> watch::Receiver<Option<AuthSession>> {
        self.current.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let session = {
            let accounts = self.accounts.lock().await;
            let account = accounts
                .iter()
                .find(|a| &a.email == email)
                .ok_or(AuthError::InvalidCredentials)?;
            let matches = account
                .password
                .as_ref()
                .is_some_and(|stored| stored.expose_secret() == password.expose_secret());
            if !matches {
                return Err(AuthError::InvalidCredentials);
            }
            account.session(SignInProvider::Password, false)
        };
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up_with_password(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: &str,
    ) -> Result<AuthSession, AuthError> {
        validate_new_password(password)?;
        let session = {
            let mut accounts = self.accounts.lock().await;
            if accounts.iter().any(|a| &a.email == email) {
                return Err(AuthError::UserAlreadyExists);
            }
            let account = Account {
                uid: UserId::generate(),
                email: email.clone(),
                password: Some(password.clone()),
                federated_subject: None,
                display_name: Some(display_name.to_string()),
                photo_url: None,
            };
            let session = account.session(SignInProvider::Password, true);
            accounts.push(account);
            session
        };
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<AuthSession, AuthError> {
        if credential.provider != SignInProvider::Google {
            return Err(AuthError::UnsupportedProvider(credential.provider.label()));
        }
        let session = {
            let mut accounts = self.accounts.lock().await;
            let existing = accounts.iter_mut().find(|a| {
                a.federated_subject.as_deref() == Some(credential.subject.as_str())
                    || a.email == credential.email
            });
            if let Some(account) = existing {
                account.federated_subject = Some(credential.subject.clone());
                account.session(SignInProvider::Google, false)
            } else {
                let account = Account {
                    uid: UserId::generate(),
                    email: credential.email.clone(),
                    password: None,
                    federated_subject: Some(credential.subject.clone()),
                    display_name: credential.display_name.clone(),
                    photo_url: credential.photo_url.clone(),
                };
                let session = account.session(SignInProvider::Google, true);
                accounts.push(account);
                session
            }
        };
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthError> {
        self.reset_requests.lock().await.push(email.clone());
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.publish(None);
        Ok(())
    }
}

/// Settings held in memory.
pub struct MemorySettingsStore {
    current: watch::Sender<Settings>,
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new(initial: Settings) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    fn settings(&self) -> watch::Receiver<Settings> {
        self.current.subscribe()
    }

    async fn update(&self, edit: SettingsEdit) -> Result<Settings, StoreError> {
        let mut next = *self.current.borrow();
        edit(&mut next);
        self.current.send_replace(next);
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::backend::Direction;

    #[tokio::test]
    async fn test_set_get_merge_delete() {
        let store = MemoryDocumentStore::new();
        store
            .set(Collection::Users, "u1", json!({"name": "Jane", "a": 1}))
            .await
            .unwrap();
        store
            .merge(Collection::Users, "u1", json!({"a": 2}))
            .await
            .unwrap();
        let doc = store.get(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"name": "Jane", "a": 2}));

        store.delete(Collection::Users, "u1").await.unwrap();
        assert!(store.get(Collection::Users, "u1").await.unwrap().is_none());
        // Deleting again is fine.
        store.delete(Collection::Users, "u1").await.unwrap();
    }

    #[tokio::test]
    async fn test_query() {
        let store = MemoryDocumentStore::new();
        for (id, user, n) in [("a", "u1", 2), ("b", "u2", 1), ("c", "u1", 1)] {
            store
                .set(Collection::Orders, id, json!({"userId": user, "n": n}))
                .await
                .unwrap();
        }
        let docs = store
            .query(
                Collection::Orders,
                &Query::all()
                    .where_eq("userId", "u1")
                    .order_by("n", Direction::Ascending),
            )
            .await
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let store = MemoryDocumentStore::new();
        store.fail_next_commit(StoreError::Network("down".into())).await;

        let mut batch = WriteBatch::new();
        batch.merge(Collection::Orders, "o1", json!({"total": 1}));
        batch.delete(Collection::Carts, "u1");
        assert!(store.commit(batch.clone()).await.is_err());
        assert_eq!(store.count(Collection::Orders).await, 0);

        store.commit(batch).await.unwrap();
        assert_eq!(store.count(Collection::Orders).await, 1);
    }

    #[tokio::test]
    async fn test_watch_query_emits_on_change() {
        let store = MemoryDocumentStore::new();
        let mut stream = store.watch_query(Collection::Products, Query::all());
        assert!(stream.next().await.unwrap().unwrap().is_empty());

        store
            .set(Collection::Products, "p1", json!({"name": "Aviator"}))
            .await
            .unwrap();
        let docs = stream.next().await.unwrap().unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_watch_document_ignores_other_collections() {
        let store = MemoryDocumentStore::new();
        let mut stream = store.watch_document(Collection::Carts, "u1");
        assert_eq!(stream.next().await.unwrap().unwrap(), None);

        store
            .set(Collection::Products, "p1", json!({}))
            .await
            .unwrap();
        store
            .set(Collection::Carts, "u1", json!({"items": []}))
            .await
            .unwrap();
        let doc = stream.next().await.unwrap().unwrap().unwrap();
        assert_eq!(doc.id, "u1");
    }

    #[tokio::test]
    async fn test_watch_ends_after_failure() {
        let store = MemoryDocumentStore::new();
        let mut stream = store.watch_query(Collection::Products, Query::all());
        stream.next().await.unwrap().unwrap();

        store.fail_with(StoreError::Network("offline".into())).await;
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(StoreError::Network(_))
        ));
        assert!(stream.next().await.is_none());
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_auth_sign_up_in_out() {
        let auth = MemoryAuthProvider::new();
        let mut current = auth.current_user();
        assert!(current.borrow_and_update().is_none());

        let password = SecretString::from("correct horse");
        let session = auth
            .sign_up_with_password(&email("jane@example.com"), &password, "Jane")
            .await
            .unwrap();
        assert!(session.is_new_user);
        assert_eq!(current.borrow_and_update().as_ref(), Some(&session));

        auth.sign_out().await.unwrap();
        assert!(current.borrow_and_update().is_none());

        let again = auth
            .sign_in_with_password(&email("jane@example.com"), &password)
            .await
            .unwrap();
        assert_eq!(again.uid, session.uid);
        assert!(!again.is_new_user);

        let err = auth
            .sign_in_with_password(&email("jane@example.com"), &SecretString::from("wrong pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_rejected() {
        let auth = MemoryAuthProvider::new();
        let password = SecretString::from("correct horse");
        auth.sign_up_with_password(&email("a@example.com"), &password, "A")
            .await
            .unwrap();
        let err = auth
            .sign_up_with_password(&email("a@example.com"), &password, "A")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_federated_sign_in_links_existing_email() {
        let auth = MemoryAuthProvider::new();
        let first = auth
            .sign_up_with_password(&email("a@example.com"), &SecretString::from("password1"), "A")
            .await
            .unwrap();
        let credential = FederatedCredential {
            provider: SignInProvider::Google,
            subject: "google-1".into(),
            email: email("a@example.com"),
            display_name: Some("A".into()),
            photo_url: None,
            id_token: SecretString::from("token"),
        };
        let session = auth.sign_in_with_federated(&credential).await.unwrap();
        assert_eq!(session.uid, first.uid);
        assert!(!session.is_new_user);
        assert_eq!(session.provider, SignInProvider::Google);
    }

    #[tokio::test]
    async fn test_settings_update_publishes() {
        let settings = MemorySettingsStore::default();
        let mut rx = settings.settings();
        assert!(!rx.borrow_and_update().dark_theme);
        let next = settings
            .update(Box::new(|s| s.dark_theme = true))
            .await
            .unwrap();
        assert!(next.dark_theme);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().dark_theme);
    }
}
