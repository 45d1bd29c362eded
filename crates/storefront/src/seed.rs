//! Built-in demo catalog and the routine that loads it.
//!
//! Seeding is operator tooling (`opticart seed`); the app never writes the
//! catalog itself.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{info, instrument};

use opticart_core::{
    Category, CategoryId, CurrencyCode, FrameAttributes, Price, Product, ProductId, RatingSummary,
    StoreError,
};

use crate::backend::{Collection, DocumentStore, WriteBatch};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("duplicate {collection} id in catalog: {id}")]
    DuplicateId { collection: &'static str, id: String },

    #[error("product {product} references unknown category {category}")]
    UnknownCategory { product: String, category: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Categories and products to load.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
}

/// What a seeding run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories_written: usize,
    pub products_written: usize,
    /// Documents left alone because they already existed.
    pub skipped: usize,
}

fn category(id: &str, name: &str, display_order: u32) -> Category {
    Category {
        id: CategoryId::new(id),
        name: name.to_string(),
        image_url: Some(format!("https://cdn.opticart.dev/categories/{id}.jpg")),
        display_order,
    }
}

struct Frame<'a> {
    id: &'a str,
    name: &'a str,
    brand: &'a str,
    description: &'a str,
    cents: i64,
    discount_cents: Option<i64>,
    category: &'a str,
    shape: &'a str,
    material: &'a str,
    color: &'a str,
    stock: u32,
    featured: bool,
}

impl Frame<'_> {
    fn into_product(self, currency: CurrencyCode) -> Product {
        Product {
            id: ProductId::new(self.id),
            name: self.name.to_string(),
            brand: self.brand.to_string(),
            description: self.description.to_string(),
            price: Price::from_cents(self.cents, currency),
            discount_price: self.discount_cents.map(|c| Price::from_cents(c, currency)),
            category_id: CategoryId::new(self.category),
            attributes: FrameAttributes {
                shape: Some(self.shape.to_string()),
                material: Some(self.material.to_string()),
                color: Some(self.color.to_string()),
                gender: Some("Unisex".to_string()),
                size: Some("Medium".to_string()),
            },
            images: vec![format!("https://cdn.opticart.dev/products/{}.jpg", self.id)],
            stock: self.stock,
            rating: RatingSummary::default(),
            featured: self.featured,
        }
    }
}

/// The demo catalog, priced in `currency`.
#[must_use]
pub fn catalog(currency: CurrencyCode) -> Catalog {
    let frames = [
        Frame {
            id: "classic-round",
            name: "Classic Round",
            brand: "Lumen",
            description: "Thin metal round frames with adjustable nose pads.",
            cents: 12_900,
            discount_cents: None,
            category: "eyeglasses",
            shape: "Round",
            material: "Metal",
            color: "Gold",
            stock: 25,
            featured: true,
        },
        Frame {
            id: "metro-rectangle",
            name: "Metro Rectangle",
            brand: "Lumen",
            description: "Everyday acetate rectangle frames.",
            cents: 9_900,
            discount_cents: Some(7_900),
            category: "eyeglasses",
            shape: "Rectangle",
            material: "Acetate",
            color: "Black",
            stock: 40,
            featured: false,
        },
        Frame {
            id: "pilot-aviator",
            name: "Pilot Aviator",
            brand: "Skyline",
            description: "Teardrop aviators with polarized lenses.",
            cents: 15_900,
            discount_cents: None,
            category: "sunglasses",
            shape: "Aviator",
            material: "Metal",
            color: "Silver",
            stock: 18,
            featured: true,
        },
        Frame {
            id: "coast-wayfarer",
            name: "Coast Wayfarer",
            brand: "Skyline",
            description: "Bold acetate sunglasses with UV400 protection.",
            cents: 11_900,
            discount_cents: Some(9_900),
            category: "sunglasses",
            shape: "Square",
            material: "Acetate",
            color: "Tortoise",
            stock: 30,
            featured: false,
        },
        Frame {
            id: "sport-wrap",
            name: "Sport Wrap",
            brand: "Velo",
            description: "Lightweight wraparound frames for cycling and running.",
            cents: 13_500,
            discount_cents: None,
            category: "sunglasses",
            shape: "Wrap",
            material: "TR90",
            color: "Matte Black",
            stock: 0,
            featured: false,
        },
        Frame {
            id: "screen-guard",
            name: "Screen Guard",
            brand: "Clarity",
            description: "Blue-light filtering lenses in a feather-light frame.",
            cents: 6_900,
            discount_cents: None,
            category: "blue-light",
            shape: "Square",
            material: "TR90",
            color: "Clear",
            stock: 60,
            featured: true,
        },
        Frame {
            id: "junior-flex",
            name: "Junior Flex",
            brand: "Sprout",
            description: "Bendable frames sized for kids.",
            cents: 5_900,
            discount_cents: None,
            category: "kids",
            shape: "Oval",
            material: "Silicone",
            color: "Blue",
            stock: 35,
            featured: false,
        },
    ];

    Catalog {
        categories: vec![
            category("eyeglasses", "Eyeglasses", 1),
            category("sunglasses", "Sunglasses", 2),
            category("blue-light", "Blue Light", 3),
            category("kids", "Kids", 4),
        ],
        products: frames
            .into_iter()
            .map(|f| f.into_product(currency))
            .collect(),
    }
}

/// Check IDs are unique and every product names a known category.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate(catalog: &Catalog) -> Result<(), SeedError> {
    let mut categories = HashSet::new();
    for c in &catalog.categories {
        if !categories.insert(c.id.as_str()) {
            return Err(SeedError::DuplicateId {
                collection: Collection::Categories.name(),
                id: c.id.to_string(),
            });
        }
    }
    let mut products = HashSet::new();
    for p in &catalog.products {
        if !products.insert(p.id.as_str()) {
            return Err(SeedError::DuplicateId {
                collection: Collection::Products.name(),
                id: p.id.to_string(),
            });
        }
        if !categories.contains(p.category_id.as_str()) {
            return Err(SeedError::UnknownCategory {
                product: p.id.to_string(),
                category: p.category_id.to_string(),
            });
        }
    }
    Ok(())
}

/// Write the catalog in one batch.
///
/// Existing documents are kept unless `overwrite` is set, so running the
/// seed twice is harmless.
///
/// # Errors
///
/// Returns a validation failure before anything is written, or the backend
/// failure.
#[instrument(skip(store, catalog), fields(
    categories = catalog.categories.len(),
    products = catalog.products.len(),
))]
pub async fn seed_catalog(
    store: &dyn DocumentStore,
    catalog: &Catalog,
    overwrite: bool,
) -> Result<SeedReport, SeedError> {
    validate(catalog)?;

    let mut report = SeedReport::default();
    let mut batch = WriteBatch::new();

    for c in &catalog.categories {
        if !overwrite && store.get(Collection::Categories, c.id.as_str()).await?.is_some() {
            report.skipped += 1;
            continue;
        }
        batch.set(Collection::Categories, c.id.as_str(), c)?;
        report.categories_written += 1;
    }
    for p in &catalog.products {
        if !overwrite && store.get(Collection::Products, p.id.as_str()).await?.is_some() {
            report.skipped += 1;
            continue;
        }
        batch.set(Collection::Products, p.id.as_str(), p)?;
        report.products_written += 1;
    }

    if !batch.is_empty() {
        store.commit(batch).await?;
    }
    info!(
        categories = report.categories_written,
        products = report.products_written,
        skipped = report.skipped,
        "Catalog seeded"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryDocumentStore;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = catalog(CurrencyCode::USD);
        validate(&catalog).unwrap();
        assert!(catalog.products.iter().any(|p| p.featured));
        assert!(catalog.products.iter().any(|p| p.matches_query("aviator")));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut catalog = catalog(CurrencyCode::USD);
        catalog.categories.retain(|c| c.id.as_str() != "kids");
        assert!(matches!(
            validate(&catalog).unwrap_err(),
            SeedError::UnknownCategory { .. }
        ));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryDocumentStore::new();
        let catalog = catalog(CurrencyCode::EUR);

        let first = seed_catalog(&store, &catalog, false).await.unwrap();
        assert_eq!(first.categories_written, catalog.categories.len());
        assert_eq!(first.products_written, catalog.products.len());

        let second = seed_catalog(&store, &catalog, false).await.unwrap();
        assert_eq!(second.products_written, 0);
        assert_eq!(
            second.skipped,
            catalog.categories.len() + catalog.products.len()
        );
        assert_eq!(store.count(Collection::Products).await, catalog.products.len());

        let forced = seed_catalog(&store, &catalog, true).await.unwrap();
        assert_eq!(forced.products_written, catalog.products.len());
    }
}
