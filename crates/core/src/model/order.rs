//! Orders placed at checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Address, Cart, CartItem};
use crate::types::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price, UserId};

/// An order: a frozen copy of a cart plus where and how to deliver it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub total: Price,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub order_status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Build an order from a cart snapshot.
    ///
    /// The items and total are copied out of `cart` so later cart changes
    /// never reach the order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the cart is empty or the address
    /// belongs to another user.
    pub fn from_cart(
        id: OrderId,
        cart: &Cart,
        shipping_address: &Address,
        payment_method: PaymentMethod,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        if cart.is_empty() {
            return Err(StoreError::validation("Your cart is empty"));
        }
        if shipping_address.user_id != cart.user_id {
            return Err(StoreError::validation(
                "Shipping address does not belong to this account",
            ));
        }

        Ok(Self {
            id,
            user_id: cart.user_id.clone(),
            items: cart.items.clone(),
            total: cart.total(),
            shipping_address: shipping_address.clone(),
            payment_method,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Pending,
            tracking_number: None,
            created_at,
        })
    }

    /// Total number of units ordered.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Short reference shown to customers.
    #[must_use]
    pub fn short_ref(&self) -> String {
        let id = self.id.as_str();
        let tail: String = id
            .chars()
            .rev()
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("#{}", tail.to_uppercase())
    }
}
