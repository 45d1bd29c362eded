//! Order actions.

use opticart_core::{Address, Cart, Order, OrderId, PaymentMethod, StoreError, UserId};

use super::use_case;
use crate::repository::{LiveStream, OrderRepository};

use_case!(
    /// Turn a cart snapshot into an order and empty the cart atomically.
    PlaceOrder => OrderRepository
);

impl PlaceOrder {
    /// # Errors
    ///
    /// See [`OrderRepository::place_order`].
    pub async fn execute(
        &self,
        user_id: &UserId,
        cart: &Cart,
        shipping_address: &Address,
        payment_method: PaymentMethod,
    ) -> Result<OrderId, StoreError> {
        self.repo
            .place_order(user_id, cart, shipping_address, payment_method)
            .await
    }
}

use_case!(GetOrders => OrderRepository);

impl GetOrders {
    #[must_use]
    pub fn execute(&self, user_id: &UserId) -> LiveStream<Vec<Order>> {
        self.repo.orders(user_id)
    }
}

use_case!(GetOrder => OrderRepository);

impl GetOrder {
    #[must_use]
    pub fn execute(&self, id: &OrderId) -> LiveStream<Order> {
        self.repo.order(id)
    }
}
