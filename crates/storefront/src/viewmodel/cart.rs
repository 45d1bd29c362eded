//! Cart and checkout screens.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use opticart_core::{Address, AddressId, Cart, CartItemId, PaymentMethod, Price, StoreError};

use super::{
    TaskGroup, ViewState, follow, launch, loadable, on_user, reject, reset_for_user, signed_in,
    view_model,
};
use crate::backend::AuthSession;
use crate::navigation::{Route, UiEvent};
use crate::usecase::{PlaceOrder, RemoveFromCart, UpdateCartQuantity, UseCases};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub cart: Option<Cart>,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(CartState);

impl CartState {
    /// Cart total, `None` until the cart has loaded.
    #[must_use]
    pub fn total(&self) -> Option<Price> {
        self.cart.as_ref().map(Cart::total)
    }
}

pub struct CartViewModel {
    view: ViewState<CartState>,
    users: watch::Receiver<Option<AuthSession>>,
    update_quantity: UpdateCartQuantity,
    remove_from_cart: RemoveFromCart,
    _tasks: TaskGroup,
}

view_model!(CartViewModel => CartState);

impl CartViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(CartState::default());
        let get_cart = use_cases.get_cart.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                vec![follow(
                    view,
                    get_cart.execute(&session.uid),
                    "cart",
                    |s, cart| s.cart = Some(cart),
                )]
            },
            reset_for_user,
        ));
        Self {
            view,
            users: use_cases.observe_current_user.execute(),
            update_quantity: use_cases.update_cart_quantity.clone(),
            remove_from_cart: use_cases.remove_from_cart.clone(),
            _tasks: tasks,
        }
    }

    /// Change a line's quantity; zero removes the line.
    pub fn update_quantity(&self, item_id: &CartItemId, quantity: u32) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "update_quantity"),
        };
        let update = self.update_quantity.clone();
        let item_id = item_id.clone();
        launch(
            &self.view,
            "update_quantity",
            async move { update.execute(&session.uid, &item_id, quantity).await },
            |_, ()| {},
        )
    }

    pub fn remove(&self, item_id: &CartItemId) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "remove_from_cart"),
        };
        let remove = self.remove_from_cart.clone();
        let item_id = item_id.clone();
        launch(
            &self.view,
            "remove_from_cart",
            async move { remove.execute(&session.uid, &item_id).await },
            |view, ()| view.emit(UiEvent::ShowMessage("Removed from cart".to_string())),
        )
    }

    /// Go to checkout, unless the cart is empty.
    pub fn checkout(&self) {
        let empty = self.view.snapshot().cart.as_ref().is_none_or(Cart::is_empty);
        if empty {
            self.view
                .emit(UiEvent::ShowMessage("Your cart is empty".to_string()));
        } else {
            self.view.emit(UiEvent::Navigate(Route::Checkout));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutState {
    pub cart: Option<Cart>,
    pub addresses: Vec<Address>,
    pub selected_address: Option<AddressId>,
    pub payment_method: PaymentMethod,
    pub is_loading: bool,
    pub error: Option<String>,
}

loadable!(CheckoutState);

impl CheckoutState {
    #[must_use]
    pub fn selected(&self) -> Option<&Address> {
        let id = self.selected_address.as_ref()?;
        self.addresses.iter().find(|a| &a.id == id)
    }

    /// Whether an order can be placed right now.
    #[must_use]
    pub fn can_place_order(&self) -> bool {
        !self.is_loading
            && self.selected().is_some()
            && self.cart.as_ref().is_some_and(|c| !c.is_empty())
    }

    fn set_addresses(&mut self, addresses: Vec<Address>) {
        let still_present = self
            .selected_address
            .as_ref()
            .is_some_and(|id| addresses.iter().any(|a| &a.id == id));
        if !still_present {
            self.selected_address = addresses
                .iter()
                .find(|a| a.is_default)
                .or_else(|| addresses.first())
                .map(|a| a.id.clone());
        }
        self.addresses = addresses;
    }
}

pub struct CheckoutViewModel {
    view: ViewState<CheckoutState>,
    users: watch::Receiver<Option<AuthSession>>,
    place_order: PlaceOrder,
    _tasks: TaskGroup,
}

view_model!(CheckoutViewModel => CheckoutState);

impl CheckoutViewModel {
    #[must_use]
    pub fn new(use_cases: &UseCases) -> Self {
        let view = ViewState::new(CheckoutState::default());
        let get_cart = use_cases.get_cart.clone();
        let get_addresses = use_cases.get_addresses.clone();
        let mut tasks = TaskGroup::new();
        tasks.push(on_user(
            &view,
            use_cases.observe_current_user.execute(),
            move |view, session| {
                vec![
                    follow(view, get_cart.execute(&session.uid), "cart", |s, cart| {
                        s.cart = Some(cart);
                    }),
                    follow(
                        view,
                        get_addresses.execute(&session.uid),
                        "addresses",
                        CheckoutState::set_addresses,
                    ),
                ]
            },
            reset_for_user,
        ));
        Self {
            view,
            users: use_cases.observe_current_user.execute(),
            place_order: use_cases.place_order.clone(),
            _tasks: tasks,
        }
    }

    pub fn select_address(&self, id: &AddressId) {
        let id = id.clone();
        self.view.update(|s| {
            if s.addresses.iter().any(|a| a.id == id) {
                s.selected_address = Some(id);
            }
        });
    }

    pub fn select_payment_method(&self, method: PaymentMethod) {
        self.view.update(|s| s.payment_method = method);
    }

    pub fn add_address(&self) {
        self.view
            .emit(UiEvent::Navigate(Route::AddEditAddress(None)));
    }

    /// Place the order for the cart as currently shown.
    pub fn place_order(&self) -> JoinHandle<()> {
        let session = match signed_in(&self.users) {
            Ok(session) => session,
            Err(err) => return reject(&self.view, &err, "place_order"),
        };
        let state = self.view.snapshot();
        let Some(address) = state.selected().cloned() else {
            return reject(
                &self.view,
                &StoreError::validation("Choose a shipping address"),
                "place_order",
            );
        };
        let Some(cart) = state.cart else {
            return reject(
                &self.view,
                &StoreError::validation("Your cart is empty"),
                "place_order",
            );
        };
        let place = self.place_order.clone();
        let method = state.payment_method;
        launch(
            &self.view,
            "place_order",
            async move { place.execute(&session.uid, &cart, &address, method).await },
            |view, order_id| {
                view.emit(UiEvent::ShowMessage("Order placed".to_string()));
                view.emit(UiEvent::Navigate(Route::OrderDetail(order_id)));
            },
        )
    }
}
