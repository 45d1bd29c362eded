//! Cart actions.

use opticart_core::{
    Cart, CartItemId, LensOptions, Prescription, ProductId, StoreError, UserId,
};

use super::use_case;
use crate::repository::{CartRepository, LiveStream};

use_case!(GetCart => CartRepository);

impl GetCart {
    #[must_use]
    pub fn execute(&self, user_id: &UserId) -> LiveStream<Cart> {
        self.repo.cart(user_id)
    }
}

use_case!(AddToCart => CartRepository);

impl AddToCart {
    /// # Errors
    ///
    /// See [`CartRepository::add_to_cart`].
    pub async fn execute(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: u32,
        prescription: Option<Prescription>,
        lens_options: Option<LensOptions>,
    ) -> Result<CartItemId, StoreError> {
        self.repo
            .add_to_cart(user_id, product_id, quantity, prescription, lens_options)
            .await
    }
}

use_case!(UpdateCartQuantity => CartRepository);

impl UpdateCartQuantity {
    /// # Errors
    ///
    /// See [`CartRepository::update_quantity`].
    pub async fn execute(
        &self,
        user_id: &UserId,
        item_id: &CartItemId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.repo.update_quantity(user_id, item_id, quantity).await
    }
}

use_case!(RemoveFromCart => CartRepository);

impl RemoveFromCart {
    /// # Errors
    ///
    /// See [`CartRepository::remove_from_cart`].
    pub async fn execute(&self, user_id: &UserId, item_id: &CartItemId) -> Result<(), StoreError> {
        self.repo.remove_from_cart(user_id, item_id).await
    }
}

use_case!(ClearCart => CartRepository);

impl ClearCart {
    /// # Errors
    ///
    /// See [`CartRepository::clear_cart`].
    pub async fn execute(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.repo.clear_cart(user_id).await
    }
}
