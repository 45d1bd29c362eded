//! Product reviews (`reviews/{id}`).

use std::sync::Arc;

use tracing::{info, instrument};

use opticart_core::{ProductId, Review, ReviewId, StoreError};

use super::{LiveStream, decode_all, live};
use crate::backend::{Collection, Direction, Document, DocumentStore, Query};

#[derive(Clone)]
pub struct ReviewRepository {
    store: Arc<dyn DocumentStore>,
}

impl ReviewRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Reviews for a product, newest first.
    #[must_use]
    pub fn reviews(&self, product_id: &ProductId) -> LiveStream<Vec<Review>> {
        let upstream = self.store.watch_query(
            Collection::Reviews,
            Query::all()
                .where_eq("productId", product_id.as_str())
                .order_by("createdAt", Direction::Descending),
        );
        live(upstream, |docs| {
            let mut reviews: Vec<Review> = decode_all(docs)?;
            reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(reviews)
        })
    }

    /// Store a review. The product document is left untouched; ratings are
    /// summarized from the reviews when read.
    ///
    /// # Errors
    ///
    /// `Validation` for an out-of-range rating or overlong comment,
    /// `NotFound` if the product does not exist, or the backend failure.
    #[instrument(skip(self, review), fields(product = %review.product_id, rating = review.rating))]
    pub async fn add_review(&self, review: &Review) -> Result<ReviewId, StoreError> {
        review.validate()?;
        if self
            .store
            .get(Collection::Products, review.product_id.as_str())
            .await?
            .is_none()
        {
            return Err(StoreError::not_found(
                Collection::Products.name(),
                review.product_id.as_str(),
            ));
        }

        let doc = Document::encode(review.id.as_str(), review)?;
        self.store.set(Collection::Reviews, &doc.id, doc.data).await?;
        info!("Review added");
        Ok(review.id.clone())
    }
}
