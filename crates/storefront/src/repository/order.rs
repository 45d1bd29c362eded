//! Order placement and history.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use opticart_core::{Address, Cart, Order, OrderId, PaymentMethod, StoreError, UserId};

use super::{LiveStream, decode_all, live};
use crate::backend::{Collection, Direction, DocumentStore, Query, WriteBatch};

#[derive(Clone)]
pub struct OrderRepository {
    store: Arc<dyn DocumentStore>,
}

impl OrderRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Place an order for a cart snapshot and empty the user's cart.
    ///
    /// The order document and the emptied cart are committed in one batch,
    /// so either both land or neither does. Lines added to the cart after
    /// `cart` was captured are cleared too.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` if the snapshot belongs to another user,
    /// `Validation` for an empty cart or a foreign address, or the backend
    /// failure.
    #[instrument(skip(self, cart, shipping_address), fields(user = %user_id, lines = cart.items.len()))]
    pub async fn place_order(
        &self,
        user_id: &UserId,
        cart: &Cart,
        shipping_address: &Address,
        payment_method: PaymentMethod,
    ) -> Result<OrderId, StoreError> {
        if &cart.user_id != user_id {
            return Err(StoreError::PermissionDenied(
                "cart belongs to another user".to_string(),
            ));
        }

        let now = Utc::now();
        let order = Order::from_cart(
            OrderId::generate(),
            cart,
            shipping_address,
            payment_method,
            now,
        )?;

        let mut emptied = Cart::empty(user_id.clone());
        emptied.updated_at = Some(now);

        let mut batch = WriteBatch::new();
        batch.set(Collection::Orders, order.id.as_str(), &order)?;
        batch.set(Collection::Carts, user_id.as_str(), &emptied)?;
        self.store.commit(batch).await?;

        info!(order = %order.id, total = %order.total, "Order placed");
        Ok(order.id)
    }

    /// The user's orders, newest first.
    #[must_use]
    pub fn orders(&self, user_id: &UserId) -> LiveStream<Vec<Order>> {
        let upstream = self.store.watch_query(
            Collection::Orders,
            Query::all()
                .where_eq("userId", user_id.as_str())
                .order_by("createdAt", Direction::Descending),
        );
        live(upstream, |docs| {
            let mut orders: Vec<Order> = decode_all(docs)?;
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(orders)
        })
    }

    /// One order. A missing order is a `NotFound` error.
    #[must_use]
    pub fn order(&self, id: &OrderId) -> LiveStream<Order> {
        let id = id.clone();
        let upstream = self.store.watch_document(Collection::Orders, id.as_str());
        live(upstream, move |doc| {
            doc.ok_or_else(|| StoreError::not_found(Collection::Orders.name(), id.as_str()))?
                .decode()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::backend::memory::MemoryDocumentStore;
    use crate::repository::CartRepository;
    use crate::repository::fixtures::{address, insert_product, product};

    struct Fixture {
        store: MemoryDocumentStore,
        carts: CartRepository,
        orders: OrderRepository,
        user: UserId,
    }

    async fn fixture() -> Fixture {
        let store = MemoryDocumentStore::new();
        insert_product(&store, &product("p1", 40, 10)).await;
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        Fixture {
            store,
            carts: CartRepository::new(Arc::clone(&shared)),
            orders: OrderRepository::new(shared),
            user: UserId::new("u1"),
        }
    }

    async fn snapshot(f: &Fixture) -> Cart {
        let mut stream = f.carts.cart(&f.user);
        stream.next().await.unwrap();
        stream.next().await.unwrap().into_data().unwrap()
    }

    #[tokio::test]
    async fn test_place_order_creates_order_and_empties_cart() {
        let f = fixture().await;
        f.carts
            .add_to_cart(&f.user, &opticart_core::ProductId::new("p1"), 2, None, None)
            .await
            .unwrap();
        let cart = snapshot(&f).await;

        let id = f
            .orders
            .place_order(&f.user, &cart, &address("u1", "Home"), PaymentMethod::Card)
            .await
            .unwrap();

        assert!(snapshot(&f).await.is_empty());

        let mut stream = f.orders.order(&id);
        stream.next().await.unwrap();
        let order = stream.next().await.unwrap().into_data().unwrap();
        assert_eq!(order.items, cart.items);
        assert_eq!(order.total, cart.total());
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_cart_untouched() {
        let f = fixture().await;
        f.carts
            .add_to_cart(&f.user, &opticart_core::ProductId::new("p1"), 1, None, None)
            .await
            .unwrap();
        let cart = snapshot(&f).await;

        f.store
            .fail_next_commit(StoreError::Network("offline".into()))
            .await;
        let err = f
            .orders
            .place_order(&f.user, &cart, &address("u1", "Home"), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(f.store.count(Collection::Orders).await, 0);
        assert_eq!(snapshot(&f).await.item_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_cart_and_foreign_cart_rejected() {
        let f = fixture().await;
        let empty = Cart::empty(f.user.clone());
        let err = f
            .orders
            .place_order(&f.user, &empty, &address("u1", "Home"), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let foreign = Cart::empty(UserId::new("u2"));
        let err = f
            .orders
            .place_order(&f.user, &foreign, &address("u1", "Home"), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_orders_newest_first_and_scoped_to_user() {
        let f = fixture().await;
        let mut ids = Vec::new();
        for _ in 0..2 {
            f.carts
                .add_to_cart(&f.user, &opticart_core::ProductId::new("p1"), 1, None, None)
                .await
                .unwrap();
            let cart = snapshot(&f).await;
            ids.push(
                f.orders
                    .place_order(&f.user, &cart, &address("u1", "Home"), PaymentMethod::Wallet)
                    .await
                    .unwrap(),
            );
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let mut stream = f.orders.orders(&f.user);
        stream.next().await.unwrap();
        let orders = stream.next().await.unwrap().into_data().unwrap();
        let listed: Vec<_> = orders.iter().map(|o| o.id.clone()).collect();
        ids.reverse();
        assert_eq!(listed, ids);

        let mut other = f.orders.orders(&UserId::new("u2"));
        other.next().await.unwrap();
        assert!(other.next().await.unwrap().into_data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let f = fixture().await;
        let mut stream = f.orders.order(&OrderId::new("missing"));
        stream.next().await.unwrap();
        assert!(stream.next().await.unwrap().error().unwrap().is_not_found());
    }
}
