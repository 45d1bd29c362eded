//! Catalog and review actions.

use opticart_core::{Category, CategoryId, Product, ProductId, Review, ReviewId, StoreError};

use super::use_case;
use crate::repository::{LiveStream, ProductRepository, ReviewRepository};

use_case!(
    /// Stream the whole catalog.
    GetProducts => ProductRepository
);

impl GetProducts {
    #[must_use]
    pub fn execute(&self) -> LiveStream<Vec<Product>> {
        self.repo.products()
    }
}

use_case!(GetFeaturedProducts => ProductRepository);

impl GetFeaturedProducts {
    #[must_use]
    pub fn execute(&self) -> LiveStream<Vec<Product>> {
        self.repo.featured()
    }
}

use_case!(GetProductsByCategory => ProductRepository);

impl GetProductsByCategory {
    #[must_use]
    pub fn execute(&self, category_id: &CategoryId) -> LiveStream<Vec<Product>> {
        self.repo.products_by_category(category_id)
    }
}

use_case!(
    /// Filter the catalog by name or brand.
    SearchProducts => ProductRepository
);

impl SearchProducts {
    #[must_use]
    pub fn execute(&self, query: &str) -> LiveStream<Vec<Product>> {
        self.repo.search(query)
    }
}

use_case!(GetProduct => ProductRepository);

impl GetProduct {
    #[must_use]
    pub fn execute(&self, id: &ProductId) -> LiveStream<Product> {
        self.repo.product(id)
    }
}

use_case!(GetCategories => ProductRepository);

impl GetCategories {
    #[must_use]
    pub fn execute(&self) -> LiveStream<Vec<Category>> {
        self.repo.categories()
    }
}

use_case!(GetReviews => ReviewRepository);

impl GetReviews {
    #[must_use]
    pub fn execute(&self, product_id: &ProductId) -> LiveStream<Vec<Review>> {
        self.repo.reviews(product_id)
    }
}

use_case!(AddReview => ReviewRepository);

impl AddReview {
    /// # Errors
    ///
    /// See [`ReviewRepository::add_review`].
    pub async fn execute(&self, review: &Review) -> Result<ReviewId, StoreError> {
        self.repo.add_review(review).await
    }
}
