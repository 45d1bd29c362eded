//! Shopping cart and optical line options.
//!
//! A cart is one document per user. The pure mutations here are applied by
//! the cart repository in a read-modify-write against that document.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::Product;
use crate::types::{CartItemId, CurrencyCode, Price, ProductId, UserId};

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// A user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: UserId,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// A cart with no items. Missing cart documents read as this.
    #[must_use]
    pub const fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            updated_at: None,
        }
    }

    /// Sum of `unit_price × quantity` over all lines. Never stored.
    #[must_use]
    pub fn total(&self) -> Price {
        let currency = self
            .items
            .first()
            .map_or(CurrencyCode::default(), |item| item.unit_price.currency_code);
        Price::sum(self.items.iter().map(CartItem::line_total), currency)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by ID.
    #[must_use]
    pub fn item(&self, item_id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    /// Add `quantity` units of `product`.
    ///
    /// A line with the same product, prescription and lens options is bumped;
    /// otherwise a new line is appended. Returns the affected line's ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the quantity is zero, the product
    /// is out of stock, the line would exceed [`MAX_LINE_QUANTITY`], or the
    /// prescription is out of range.
    pub fn add(
        &mut self,
        product: &Product,
        quantity: u32,
        prescription: Option<Prescription>,
        lens_options: Option<LensOptions>,
    ) -> Result<CartItemId, StoreError> {
        if quantity == 0 {
            return Err(StoreError::validation("Quantity must be at least 1"));
        }
        if !product.in_stock() {
            return Err(StoreError::validation(format!(
                "{} is out of stock",
                product.name
            )));
        }
        if let Some(rx) = &prescription {
            rx.validate()?;
        }

        if let Some(line) = self.items.iter_mut().find(|item| {
            item.product_id == product.id
                && item.prescription == prescription
                && item.lens_options == lens_options
        }) {
            let quantity = line.quantity.saturating_add(quantity);
            check_quantity(quantity)?;
            line.quantity = quantity;
            return Ok(line.id.clone());
        }

        check_quantity(quantity)?;
        let line = CartItem {
            id: CartItemId::generate(),
            product_id: product.id.clone(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            image_url: product.thumbnail().map(str::to_owned),
            unit_price: product.effective_price(),
            quantity,
            prescription,
            lens_options,
        };
        let id = line.id.clone();
        self.items.push(line);
        Ok(id)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown line and
    /// `StoreError::Validation` above [`MAX_LINE_QUANTITY`].
    pub fn set_quantity(&mut self, item_id: &CartItemId, quantity: u32) -> Result<(), StoreError> {
        if quantity == 0 {
            return self.remove(item_id);
        }
        check_quantity(quantity)?;
        let line = self
            .items
            .iter_mut()
            .find(|item| &item.id == item_id)
            .ok_or_else(|| StoreError::not_found("cartItems", item_id.as_str()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown line.
    pub fn remove(&mut self, item_id: &CartItemId) -> Result<(), StoreError> {
        let before = self.items.len();
        self.items.retain(|item| &item.id != item_id);
        if self.items.len() == before {
            return Err(StoreError::not_found("cartItems", item_id.as_str()));
        }
        Ok(())
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

fn check_quantity(quantity: u32) -> Result<(), StoreError> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(StoreError::validation(format!(
            "Quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// One line in a cart, snapshotting the product at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub unit_price: Price,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription: Option<Prescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens_options: Option<LensOptions>,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Corrective values for one eye.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyePrescription {
    /// Spherical power in diopters.
    pub sphere: Decimal,
    /// Cylindrical power in diopters.
    #[serde(default)]
    pub cylinder: Decimal,
    /// Cylinder axis in degrees.
    #[serde(default)]
    pub axis: u16,
}

/// Prescription attached to a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// Right eye (OD).
    pub right: EyePrescription,
    /// Left eye (OS).
    pub left: EyePrescription,
    /// Pupillary distance in millimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pupillary_distance: Option<Decimal>,
}

impl Prescription {
    /// Range-check every value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` naming the first value out of range.
    pub fn validate(&self) -> Result<(), StoreError> {
        for (eye, values) in [("right", &self.right), ("left", &self.left)] {
            if values.sphere.abs() > Decimal::from(20) {
                return Err(StoreError::validation(format!(
                    "{eye} sphere must be between -20.00 and +20.00"
                )));
            }
            if values.cylinder.abs() > Decimal::from(10) {
                return Err(StoreError::validation(format!(
                    "{eye} cylinder must be between -10.00 and +10.00"
                )));
            }
            if values.axis > 180 {
                return Err(StoreError::validation(format!(
                    "{eye} axis must be between 0 and 180"
                )));
            }
        }
        if let Some(pd) = self.pupillary_distance
            && (pd < Decimal::from(40) || pd > Decimal::from(80))
        {
            return Err(StoreError::validation(
                "Pupillary distance must be between 40 and 80 mm",
            ));
        }
        Ok(())
    }
}

/// Lens type for prescription frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LensType {
    #[default]
    NonPrescription,
    SingleVision,
    Bifocal,
    Progressive,
}

/// Optional lens coatings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LensCoating {
    AntiReflective,
    BlueLight,
    Photochromic,
    ScratchResistant,
}

/// Lens choices attached to a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensOptions {
    pub lens_type: LensType,
    #[serde(default)]
    pub coatings: Vec<LensCoating>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::product::tests::product;

    fn cart_with(lines: &[(&str, i64, u32)]) -> Cart {
        let mut cart = Cart::empty(UserId::new("u1"));
        for (id, dollars, qty) in lines {
            let p = product(id, id, "Brand", *dollars);
            cart.add(&p, *qty, None, None).unwrap();
        }
        cart
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let cart = Cart::empty(UserId::new("u1"));
        assert!(cart.total().is_zero());
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_total_two_lines_then_remove() {
        let mut cart = cart_with(&[("a", 100, 2), ("b", 50, 1)]);
        assert_eq!(cart.total().amount, Decimal::from(250));

        let second = cart.items[1].id.clone();
        cart.remove(&second).unwrap();
        assert_eq!(cart.total().amount, Decimal::from(200));
    }

    #[test]
    fn test_total_matches_sum_of_lines() {
        let cart = cart_with(&[("a", 19, 3), ("b", 7, 5), ("c", 250, 1)]);
        let expected: Decimal = cart
            .items
            .iter()
            .map(|i| i.unit_price.amount * Decimal::from(i.quantity))
            .sum();
        assert_eq!(cart.total().amount, expected);
        assert_eq!(cart.item_count(), 9);
    }

    #[test]
    fn test_same_product_same_options_merges() {
        let p = product("a", "Aviator", "Ray-Ban", 150);
        let mut cart = Cart::empty(UserId::new("u1"));
        let first = cart.add(&p, 1, None, None).unwrap();
        let second = cart.add(&p, 2, None, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[test]
    fn test_different_prescription_gets_own_line() {
        let p = product("a", "Aviator", "Ray-Ban", 150);
        let mut cart = Cart::empty(UserId::new("u1"));
        cart.add(&p, 1, None, None).unwrap();
        let rx = Prescription {
            right: EyePrescription {
                sphere: Decimal::new(-125, 2),
                ..EyePrescription::default()
            },
            ..Prescription::default()
        };
        cart.add(&p, 1, Some(rx), None).unwrap();
        assert_eq!(cart.items.len(), 2);
    }

    #[test]
    fn test_add_rejects_zero_and_out_of_stock() {
        let mut p = product("a", "Aviator", "Ray-Ban", 150);
        let mut cart = Cart::empty(UserId::new("u1"));
        assert!(matches!(
            cart.add(&p, 0, None, None),
            Err(StoreError::Validation(_))
        ));
        p.stock = 0;
        assert!(matches!(
            cart.add(&p, 1, None, None),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = cart_with(&[("a", 10, 2)]);
        let id = cart.items[0].id.clone();
        cart.set_quantity(&id, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_line() {
        let mut cart = cart_with(&[("a", 10, 2)]);
        let err = cart
            .set_quantity(&CartItemId::new("missing"), 3)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_quantity_cap() {
        let mut cart = cart_with(&[("a", 10, 2)]);
        let id = cart.items[0].id.clone();
        assert!(cart.set_quantity(&id, MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_prescription_validation() {
        let mut rx = Prescription::default();
        assert!(rx.validate().is_ok());
        rx.left.axis = 200;
        assert!(rx.validate().is_err());
        rx.left.axis = 90;
        rx.pupillary_distance = Some(Decimal::from(30));
        assert!(rx.validate().is_err());
    }
}
