//! Order history screens.

use futures::StreamExt;

use opticart_core::{Order, OrderId, StoreError};

use super::{TaskGroup, ViewState, follow, loadable, on_user, reset_for_user, view_model};
use crate::navigation::{Route, UiEvent};
use crate::usecase::UseCases;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrdersState {
    /// Newest first.
    pub orders: Vec<Order>,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(OrdersState);

pub struct OrdersViewModel {
    view: ViewState<OrdersState>,
    _tasks: TaskGroup,
}

view_model!(OrdersViewModel => OrdersState);

impl OrdersViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(OrdersState::default());
        let get_orders = use_cases.get_orders.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                vec![follow(
                    view,
                    get_orders.execute(&session.uid),
                    "orders",
                    |s, orders| s.orders = orders,
                )]
            },
            reset_for_user,
        ));
        Self {
            view,
            _tasks: tasks,
        }
    }

    pub fn open_order(&self, id: &OrderId) {
        self.view
            .emit(UiEvent::Navigate(Route::OrderDetail(id.clone())));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderDetailState {
    pub order: Option<Order>,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(OrderDetailState);

pub struct OrderDetailViewModel {
    view: ViewState<OrderDetailState>,
    _tasks: TaskGroup,
}

view_model!(OrderDetailViewModel => OrderDetailState);

impl OrderDetailViewModel {
    /// Follow one order. Orders placed by another user are reported as
    /// `PermissionDenied`.
    #[must_use]
    pub fn new(use_cases: &UseCases, order_id: OrderId) -> Self {
        let view = ViewState::new(OrderDetailState::default());
        let get_order = use_cases.get_order.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                let uid = session.uid.clone();
                let order = get_order
                    .execute(&order_id)
                    .map(move |resource| {
                        resource.and_then(|order| {
                            if order.user_id == uid {
                                Ok(order)
                            } else {
                                Err(StoreError::PermissionDenied(format!(
                                    "order {} belongs to another user",
                                    order.id
                                )))
                            }
                        })
                    })
                    .boxed();
                vec![follow(view, order, "order", |s, order| s.order = Some(order))]
            },
            reset_for_user,
        ));
        Self {
            view,
            _tasks: tasks,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use opticart_core::PaymentMethod;

    use super::*;
    use crate::repository::fixtures::{address, insert_product, product};
    use crate::viewmodel::ViewModel;
    use crate::viewmodel::testing::{Harness, harness, next_event, wait_for};

    async fn place(h: &Harness, uid: &opticart_core::UserId) -> OrderId {
        let frames = product("p1", 80, 5);
        insert_product(&h.store, &frames).await;
        h.use_cases
            .add_to_cart
            .execute(uid, &frames.id, 1, None, None)
            .await
            .unwrap();
        let mut cart = h.use_cases.get_cart.execute(uid);
        cart.next().await.unwrap();
        let cart = cart.next().await.unwrap().into_data().unwrap();
        h.use_cases
            .place_order
            .execute(uid, &cart, &address(uid.as_str(), "Home"), PaymentMethod::CashOnDelivery)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_orders_list_and_open() {
        let h = harness();
        let session = h.sign_up("jane@example.com").await;
        let id = place(&h, &session.uid).await;

        let vm = OrdersViewModel::new(&h.use_cases);
        let mut state = vm.state();
        let loaded = wait_for(&mut state, |s| s.orders.len() == 1).await;
        assert_eq!(loaded.orders.first().unwrap().id, id);

        let mut events = vm.events();
        vm.open_order(&id);
        assert_eq!(
            next_event(&mut events).await,
            UiEvent::Navigate(Route::OrderDetail(id))
        );
    }

    #[tokio::test]
    async fn test_order_detail_is_owner_only() {
        let h = harness();
        let owner = h.sign_up("owner@example.com").await;
        let id = place(&h, &owner.uid).await;

        let vm = OrderDetailViewModel::new(&h.use_cases, id.clone());
        let mut state = vm.state();
        let loaded = wait_for(&mut state, |s| s.order.is_some()).await;
        assert_eq!(loaded.order.unwrap().total.to_string(), "$80.00");

        h.use_cases.sign_out.execute().await.unwrap();
        h.sign_up("other@example.com").await;
        let denied = wait_for(&mut state, |s| {
            s.error.as_deref() == Some("You don't have access to this.")
        })
        .await;
        assert!(denied.order.is_none());
    }
}
