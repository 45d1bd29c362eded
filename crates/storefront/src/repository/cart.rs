//! Per-user cart stored as one document (`carts/{uid}`).
//!
//! Mutations are read-modify-write without conflict detection; the last
//! writer wins.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use opticart_core::{
    Cart, CartItemId, LensOptions, Prescription, Product, ProductId, StoreError, UserId,
};

use super::{LiveStream, live};
use crate::backend::{Collection, Document, DocumentStore};

#[derive(Clone)]
pub struct CartRepository {
    store: Arc<dyn DocumentStore>,
}

impl CartRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The user's cart. A user without a cart document has an empty cart.
    #[must_use]
    pub fn cart(&self, user_id: &UserId) -> LiveStream<Cart> {
        let user_id = user_id.clone();
        let upstream = self.store.watch_document(Collection::Carts, user_id.as_str());
        live(upstream, move |doc| decode_cart(&user_id, doc))
    }

    /// Add units of a product, merging into an identical line.
    ///
    /// The product is re-read so the line carries the current price.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown product, `Validation` for out-of-stock or
    /// out-of-range input, or the backend failure.
    #[instrument(skip(self, prescription, lens_options), fields(user = %user_id, product = %product_id))]
    pub async fn add_to_cart(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
        prescription: Option<Prescription>,
        lens_options: Option<LensOptions>,
    ) -> Result<CartItemId, StoreError> {
        let product: Product = self
            .store
            .get(Collection::Products, product_id.as_str())
            .await?
            .ok_or_else(|| StoreError::not_found(Collection::Products.name(), product_id.as_str()))?
            .decode()?;

        let mut cart = self.load(user_id).await?;
        let line = cart.add(&product, quantity, prescription, lens_options)?;
        self.save(cart).await?;
        Ok(line)
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown line, `Validation` above the line limit.
    #[instrument(skip(self), fields(user = %user_id, item = %item_id))]
    pub async fn update_quantity(
        &self,
        user_id: &UserId,
        item_id: &CartItemId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let mut cart = self.load(user_id).await?;
        cart.set_quantity(item_id, quantity)?;
        self.save(cart).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown line.
    #[instrument(skip(self), fields(user = %user_id, item = %item_id))]
    pub async fn remove_from_cart(
        &self,
        user_id: &UserId,
        item_id: &CartItemId,
    ) -> Result<(), StoreError> {
        let mut cart = self.load(user_id).await?;
        cart.remove(item_id)?;
        self.save(cart).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    #[instrument(skip(self), fields(user = %user_id))]
    pub async fn clear_cart(&self, user_id: &UserId) -> Result<(), StoreError> {
        let mut cart = self.load(user_id).await?;
        cart.clear();
        self.save(cart).await
    }

    async fn load(&self, user_id: &UserId) -> Result<Cart, StoreError> {
        let doc = self.store.get(Collection::Carts, user_id.as_str()).await?;
        decode_cart(user_id, doc)
    }

    async fn save(&self, mut cart: Cart) -> Result<(), StoreError> {
        cart.updated_at = Some(Utc::now());
        let doc = Document::encode(cart.user_id.as_str(), &cart)?;
        self.store
            .set(Collection::Carts, &doc.id, doc.data)
            .await
    }
}

fn decode_cart(user_id: &UserId, doc: Option<Document>) -> Result<Cart, StoreError> {
    doc.map_or_else(|| Ok(Cart::empty(user_id.clone())), |doc| doc.decode())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::StreamExt;
    use rust_decimal::Decimal;

    use super::*;
    use crate::backend::memory::MemoryDocumentStore;
    use crate::repository::fixtures::{insert_product, product};

    fn repo() -> (MemoryDocumentStore, CartRepository) {
        let store = MemoryDocumentStore::new();
        (store.clone(), CartRepository::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_missing_cart_reads_as_empty() {
        let (_, repo) = repo();
        let mut stream = repo.cart(&UserId::new("u1"));
        assert!(stream.next().await.unwrap().is_loading());
        let cart = stream.next().await.unwrap().into_data().unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.user_id, UserId::new("u1"));
    }

    #[tokio::test]
    async fn test_add_merges_and_updates_live_cart() {
        let (store, repo) = repo();
        insert_product(&store, &product("p1", 100, 5)).await;
        let user = UserId::new("u1");

        let mut stream = repo.cart(&user);
        stream.next().await.unwrap();
        stream.next().await.unwrap();

        let first = repo
            .add_to_cart(&user, &ProductId::new("p1"), 1, None, None)
            .await
            .unwrap();
        let second = repo
            .add_to_cart(&user, &ProductId::new("p1"), 2, None, None)
            .await
            .unwrap();
        assert_eq!(first, second);

        let mut cart = stream.next().await.unwrap().into_data().unwrap();
        while cart.item_count() < 3 {
            cart = stream.next().await.unwrap().into_data().unwrap();
        }
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total().amount, Decimal::from(300));
        assert!(cart.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let (_, repo) = repo();
        let err = repo
            .add_to_cart(&UserId::new("u1"), &ProductId::new("ghost"), 1, None, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_out_of_stock_rejected() {
        let (store, repo) = repo();
        insert_product(&store, &product("p1", 100, 0)).await;
        let err = repo
            .add_to_cart(&UserId::new("u1"), &ProductId::new("p1"), 1, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_quantity_zero_removes_and_clear_empties() {
        let (store, repo) = repo();
        insert_product(&store, &product("p1", 10, 5)).await;
        insert_product(&store, &product("p2", 20, 5)).await;
        let user = UserId::new("u1");

        let line = repo
            .add_to_cart(&user, &ProductId::new("p1"), 2, None, None)
            .await
            .unwrap();
        repo.add_to_cart(&user, &ProductId::new("p2"), 1, None, None)
            .await
            .unwrap();

        repo.update_quantity(&user, &line, 0).await.unwrap();
        let cart = repo.load(&user).await.unwrap();
        assert_eq!(cart.items.len(), 1);

        let err = repo.remove_from_cart(&user, &line).await.unwrap_err();
        assert!(err.is_not_found());

        repo.clear_cart(&user).await.unwrap();
        assert!(repo.load(&user).await.unwrap().is_empty());
    }
}
