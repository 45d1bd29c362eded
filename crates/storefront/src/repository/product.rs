//! Catalog reads. The app never writes products or categories.

use std::sync::Arc;

use opticart_core::{Category, CategoryId, Product, ProductId, StoreError};

use super::{LiveStream, decode_all, live};
use crate::backend::{Collection, Direction, DocumentStore, Query};

#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProductRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The whole catalog, ordered by name.
    #[must_use]
    pub fn products(&self) -> LiveStream<Vec<Product>> {
        self.watch_products(Query::all().order_by("name", Direction::Ascending), |_| true)
    }

    /// Products flagged as featured, filtered client-side from the catalog.
    #[must_use]
    pub fn featured(&self) -> LiveStream<Vec<Product>> {
        self.watch_products(Query::all().order_by("name", Direction::Ascending), |product| {
            product.featured
        })
    }

    /// Products in one category.
    #[must_use]
    pub fn products_by_category(&self, category_id: &CategoryId) -> LiveStream<Vec<Product>> {
        self.watch_products(
            Query::all()
                .where_eq("categoryId", category_id.as_str())
                .order_by("name", Direction::Ascending),
            |_| true,
        )
    }

    /// Case-insensitive substring search over name and brand.
    ///
    /// Filtering happens client-side over the full catalog; a blank query
    /// matches everything.
    #[must_use]
    pub fn search(&self, query: &str) -> LiveStream<Vec<Product>> {
        let needle = query.trim().to_lowercase();
        self.watch_products(
            Query::all().order_by("name", Direction::Ascending),
            move |product| product.matches_query(&needle),
        )
    }

    /// One product. A missing product is a `NotFound` error.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> LiveStream<Product> {
        let id = id.clone();
        let upstream = self.store.watch_document(Collection::Products, id.as_str());
        live(upstream, move |doc| {
            doc.ok_or_else(|| StoreError::not_found(Collection::Products.name(), id.as_str()))?
                .decode()
        })
    }

    /// Categories in display order.
    #[must_use]
    pub fn categories(&self) -> LiveStream<Vec<Category>> {
        let upstream = self.store.watch_query(
            Collection::Categories,
            Query::all().order_by("displayOrder", Direction::Ascending),
        );
        live(upstream, |docs| {
            let mut categories: Vec<Category> = decode_all(docs)?;
            categories.sort_by_key(|c| c.display_order);
            Ok(categories)
        })
    }

    /// One-shot read used by writes that need current product data.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub async fn get(&self, id: &ProductId) -> Result<Product, StoreError> {
        self.store
            .get(Collection::Products, id.as_str())
            .await?
            .ok_or_else(|| StoreError::not_found(Collection::Products.name(), id.as_str()))?
            .decode()
    }

    fn watch_products<F>(&self, query: Query, keep: F) -> LiveStream<Vec<Product>>
    where
        F: Fn(&Product) -> bool + Send + 'static,
    {
        let upstream = self.store.watch_query(Collection::Products, query);
        live(upstream, move |docs| {
            let products: Vec<Product> = decode_all(docs)?;
            Ok(products.into_iter().filter(|p| keep(p)).collect())
        })
    }
}
