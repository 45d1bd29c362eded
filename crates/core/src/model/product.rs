//! Catalog entities: products and categories.

use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Price, ProductId};

/// A catalog entry.
///
/// Created by the seeding routine; the app only reads products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    /// Sale price, honoured only when lower than `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<Price>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub attributes: FrameAttributes,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    /// Aggregate kept by catalog tooling. The product screen derives a live
    /// one from the reviews instead.
    #[serde(default)]
    pub rating: RatingSummary,
    #[serde(default)]
    pub featured: bool,
}

impl Product {
    /// The price a customer pays right now.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        match self.discount_price {
            Some(discount) if discount.amount < self.price.amount => discount,
            _ => self.price,
        }
    }

    /// Whole-percent discount, if the product is on sale.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u32> {
        use rust_decimal::prelude::ToPrimitive;

        let discount = self.discount_price?;
        if self.price.amount.is_zero() || discount.amount >= self.price.amount {
            return None;
        }
        let off = (self.price.amount - discount.amount) / self.price.amount
            * rust_decimal::Decimal::ONE_HUNDRED;
        off.round().to_u32()
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// First image, used for thumbnails and cart lines.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Case-insensitive substring match against name or brand.
    ///
    /// A blank query matches everything.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle) || self.brand.to_lowercase().contains(&needle)
    }
}

/// Physical frame attributes shown on the detail screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl FrameAttributes {
    /// Label/value pairs for every attribute that is set.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Shape", self.shape.as_deref()),
            ("Material", self.material.as_deref()),
            ("Color", self.color.as_deref()),
            ("Gender", self.gender.as_deref()),
            ("Size", self.size.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.map(|v| (label, v)))
        .collect()
    }
}

/// Aggregate of a product's reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average: f32,
    pub count: u32,
}

impl RatingSummary {
    /// Compute the aggregate from individual star ratings.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0_u32, 0_u32), |(sum, count), r| {
                (sum + u32::from(r), count + 1)
            });
        if count == 0 {
            return Self::default();
        }
        #[allow(clippy::cast_precision_loss)] // review counts stay far below f32 precision
        let average = sum as f32 / count as f32;
        Self { average, count }
    }
}

/// A catalog grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub display_order: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::CurrencyCode;

    pub(crate) fn product(id: &str, name: &str, brand: &str, dollars: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            brand: brand.to_string(),
            description: String::new(),
            price: Price::new(Decimal::from(dollars), CurrencyCode::USD),
            discount_price: None,
            category_id: CategoryId::new("sunglasses"),
            attributes: FrameAttributes::default(),
            images: vec![format!("https://cdn.example.com/{id}.jpg")],
            stock: 10,
            rating: RatingSummary::default(),
            featured: false,
        }
    }

    #[test]
    fn test_matches_query_name_and_brand_case_insensitive() {
        let p = product("p1", "Aviator Classic", "Ray-Ban", 150);
        assert!(p.matches_query("aviator"));
        assert!(p.matches_query("RAY-"));
        assert!(p.matches_query("  ban "));
        assert!(!p.matches_query("oakley"));
    }

    #[test]
    fn test_blank_query_matches_all() {
        let p = product("p1", "Wayfarer", "Ray-Ban", 120);
        assert!(p.matches_query(""));
        assert!(p.matches_query("   "));
    }

    #[test]
    fn test_effective_price_uses_lower_discount() {
        let mut p = product("p1", "Round Metal", "Ray-Ban", 100);
        p.discount_price = Some(Price::new(Decimal::from(80), CurrencyCode::USD));
        assert_eq!(p.effective_price().amount, Decimal::from(80));
        assert_eq!(p.discount_percent(), Some(20));

        p.discount_price = Some(Price::new(Decimal::from(120), CurrencyCode::USD));
        assert_eq!(p.effective_price().amount, Decimal::from(100));
        assert_eq!(p.discount_percent(), None);
    }

    #[test]
    fn test_rating_summary() {
        let summary = RatingSummary::from_ratings([5, 4, 3]);
        assert_eq!(summary.count, 3);
        assert!((summary.average - 4.0).abs() < f32::EPSILON);
        assert_eq!(RatingSummary::from_ratings([]), RatingSummary::default());
    }

    #[test]
    fn test_attribute_entries_skip_unset() {
        let attrs = FrameAttributes {
            shape: Some("Round".into()),
            color: Some("Gold".into()),
            ..FrameAttributes::default()
        };
        assert_eq!(attrs.entries(), vec![("Shape", "Round"), ("Color", "Gold")]);
    }

    #[test]
    fn test_product_document_shape() {
        let json = serde_json::json!({
            "id": "p9",
            "name": "Clubmaster",
            "brand": "Ray-Ban",
            "price": { "amount": "161.00", "currencyCode": "USD" },
            "categoryId": "eyeglasses",
            "stock": 4
        });
        let p: Product = serde_json::from_value(json).unwrap();
        assert_eq!(p.category_id.as_str(), "eyeglasses");
        assert!(p.images.is_empty());
        assert!(!p.featured);
    }
}
