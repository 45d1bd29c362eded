//! User profiles and wishlists (`users/{uid}`).

use std::sync::Arc;

use async_stream::stream;
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use tracing::{info, instrument};

use opticart_core::{Product, ProductId, ProfileUpdate, Resource, StoreError, User, UserId};

use super::{LiveStream, live};
use crate::backend::{AuthSession, Collection, Document, DocumentStore};

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The user's profile. A missing profile is a `NotFound` error.
    #[must_use]
    pub fn profile(&self, user_id: &UserId) -> LiveStream<User> {
        let user_id = user_id.clone();
        let upstream = self.store.watch_document(Collection::Users, user_id.as_str());
        live(upstream, move |doc| {
            doc.ok_or_else(|| StoreError::not_found(Collection::Users.name(), user_id.as_str()))?
                .decode()
        })
    }

    /// Create the profile for a freshly signed-in account if it has none.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    #[instrument(skip(self, session), fields(user = %session.uid))]
    pub async fn ensure_profile(&self, session: &AuthSession) -> Result<User, StoreError> {
        if let Some(doc) = self
            .store
            .get(Collection::Users, session.uid.as_str())
            .await?
        {
            return doc.decode();
        }

        let display_name = session
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| session.email.local_part().to_string(), str::to_string);
        let user = User {
            id: session.uid.clone(),
            display_name,
            email: session.email.clone(),
            phone: None,
            photo_url: session.photo_url.clone(),
            wishlist: Vec::new(),
            created_at: Utc::now(),
        };
        let doc = Document::encode(user.id.as_str(), &user)?;
        self.store.set(Collection::Users, &doc.id, doc.data).await?;
        info!("Profile created");
        Ok(user)
    }

    /// Apply a profile edit.
    ///
    /// # Errors
    ///
    /// `NotFound` without a profile, `Validation` for a blank name.
    #[instrument(skip(self, update), fields(user = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        update: ProfileUpdate,
    ) -> Result<User, StoreError> {
        let mut user = self.load(user_id).await?;
        user.apply(update)?;
        self.store
            .merge(
                Collection::Users,
                user_id.as_str(),
                json!({
                    "displayName": user.display_name,
                    "phone": user.phone,
                    "photoUrl": user.photo_url,
                }),
            )
            .await?;
        Ok(user)
    }

    /// Add or remove a product from the wishlist. Returns whether the
    /// product is wishlisted afterwards.
    ///
    /// # Errors
    ///
    /// `NotFound` without a profile, or the backend failure.
    #[instrument(skip(self), fields(user = %user_id, product = %product_id))]
    pub async fn toggle_wishlist(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<bool, StoreError> {
        let mut user = self.load(user_id).await?;
        let wishlisted = user.toggle_wishlist(product_id);
        self.store
            .merge(
                Collection::Users,
                user_id.as_str(),
                json!({ "wishlist": user.wishlist }),
            )
            .await?;
        Ok(wishlisted)
    }

    /// Wishlisted products, resolved against the catalog.
    ///
    /// Re-resolves whenever the profile changes. Products that no longer
    /// exist are skipped.
    #[must_use]
    pub fn wishlist(&self, user_id: &UserId) -> LiveStream<Vec<Product>> {
        let store = Arc::clone(&self.store);
        let mut profile = self.profile(user_id);
        stream! {
            while let Some(resource) = profile.next().await {
                match resource {
                    Resource::Loading => yield Resource::Loading,
                    Resource::Success(user) => match resolve(store.as_ref(), &user.wishlist).await {
                        Ok(products) => yield Resource::Success(products),
                        Err(err) => {
                            yield Resource::Error(err);
                            break;
                        }
                    },
                    Resource::Error(err) => {
                        yield Resource::Error(err);
                        break;
                    }
                }
            }
        }
        .boxed()
    }

    async fn load(&self, user_id: &UserId) -> Result<User, StoreError> {
        self.store
            .get(Collection::Users, user_id.as_str())
            .await?
            .ok_or_else(|| StoreError::not_found(Collection::Users.name(), user_id.as_str()))?
            .decode()
    }
}

async fn resolve(store: &dyn DocumentStore, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
    let mut products = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(doc) = store.get(Collection::Products, id.as_str()).await? {
            products.push(doc.decode()?);
        }
    }
    Ok(products)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use opticart_core::Email;

    use super::*;
    use crate::backend::SignInProvider;
    use crate::backend::memory::MemoryDocumentStore;
    use crate::repository::fixtures::{insert_product, product};

    fn session(uid: &str, display_name: Option<&str>) -> AuthSession {
        AuthSession {
            uid: UserId::new(uid),
            email: Email::parse("jane.doe@example.com").unwrap(),
            display_name: display_name.map(str::to_string),
            photo_url: None,
            provider: SignInProvider::Password,
            is_new_user: true,
        }
    }

    #[tokio::test]
    async fn test_ensure_profile_is_idempotent() {
        let repo = UserRepository::new(Arc::new(MemoryDocumentStore::new()));
        let created = repo.ensure_profile(&session("u1", Some("Jane"))).await.unwrap();
        assert_eq!(created.display_name, "Jane");

        let again = repo.ensure_profile(&session("u1", Some("Other"))).await.unwrap();
        assert_eq!(again.display_name, "Jane");
    }

    #[tokio::test]
    async fn test_profile_name_falls_back_to_email() {
        let repo = UserRepository::new(Arc::new(MemoryDocumentStore::new()));
        let user = repo.ensure_profile(&session("u1", None)).await.unwrap();
        assert_eq!(user.display_name, "jane.doe");
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let repo = UserRepository::new(Arc::new(MemoryDocumentStore::new()));
        let mut stream = repo.profile(&UserId::new("ghost"));
        stream.next().await.unwrap();
        assert!(stream.next().await.unwrap().error().unwrap().is_not_found());

        let err = repo
            .update_profile(&UserId::new("ghost"), ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let repo = UserRepository::new(Arc::new(MemoryDocumentStore::new()));
        repo.ensure_profile(&session("u1", Some("Jane"))).await.unwrap();
        let updated = repo
            .update_profile(
                &UserId::new("u1"),
                ProfileUpdate {
                    display_name: Some("Jane Q".into()),
                    phone: Some("555-0101".into()),
                    photo_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Jane Q");
        assert_eq!(repo.load(&UserId::new("u1")).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_wishlist_toggle_and_resolution() {
        let store = MemoryDocumentStore::new();
        insert_product(&store, &product("p1", 10, 1)).await;
        let repo = UserRepository::new(Arc::new(store));
        let user = UserId::new("u1");
        repo.ensure_profile(&session("u1", Some("Jane"))).await.unwrap();

        assert!(repo.toggle_wishlist(&user, &ProductId::new("p1")).await.unwrap());
        // Unknown products are kept on the profile but skipped when resolved.
        assert!(repo.toggle_wishlist(&user, &ProductId::new("gone")).await.unwrap());

        let mut stream = repo.wishlist(&user);
        assert!(stream.next().await.unwrap().is_loading());
        let products = stream.next().await.unwrap().into_data().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products.first().unwrap().id, ProductId::new("p1"));

        assert!(!repo.toggle_wishlist(&user, &ProductId::new("p1")).await.unwrap());
        let products = stream.next().await.unwrap().into_data().unwrap();
        assert!(products.is_empty());
    }
}
