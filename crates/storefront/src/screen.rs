//! Plain-text screens.
//!
//! Each function renders one view-model state as terminal lines. The
//! graphical UI is owned by the host; these renderers back the CLI demo and
//! make screen output easy to assert on.

use opticart_core::{Address, Cart, Order, Product, Review};

use crate::viewmodel::{
    AddEditAddressState, AddressBookState, CartState, CheckoutState, HomeState, LoginState,
    OrderDetailState, OrdersState, ProductDetailState, ProfileState, RegisterState, SplashState,
    WishlistState,
};

/// Lines shown in place of content while loading or after a failure.
fn status(is_loading: bool, error: Option<&str>) -> Option<Vec<String>> {
    if let Some(error) = error {
        return Some(vec![format!("! {error}")]);
    }
    is_loading.then(|| vec!["Loading...".to_string()])
}

fn product_line(product: &Product) -> String {
    let price = match (product.discount_price, product.discount_percent()) {
        (Some(discounted), Some(percent)) => {
            format!("{discounted} (was {}, -{percent}%)", product.price)
        }
        _ => product.price.to_string(),
    };
    let stock = if product.in_stock() { "" } else { " [out of stock]" };
    format!("{} by {} - {price}{stock}", product.name, product.brand)
}

fn address_line(address: &Address) -> String {
    let default = if address.is_default { " (default)" } else { "" };
    format!("{}{default}: {}", address.label, address.one_line())
}

fn cart_lines(cart: &Cart) -> Vec<String> {
    let mut lines: Vec<String> = cart
        .items
        .iter()
        .map(|item| {
            format!(
                "{} x{} @ {} = {}",
                item.name,
                item.quantity,
                item.unit_price,
                item.line_total()
            )
        })
        .collect();
    lines.push(format!("Total: {}", cart.total()));
    lines
}

fn review_line(review: &Review) -> String {
    if review.comment.is_empty() {
        format!("{} {}", review.stars(), review.author_name)
    } else {
        format!("{} {}: {}", review.stars(), review.author_name, review.comment)
    }
}

fn order_line(order: &Order) -> String {
    format!(
        "#{} {} - {} items - {} - {}",
        order.short_ref(),
        order.created_at.format("%Y-%m-%d"),
        order.item_count(),
        order.total,
        order.order_status.label()
    )
}

#[must_use]
pub fn render_splash(state: &SplashState) -> Vec<String> {
    let mut lines = vec!["OPTICART".to_string()];
    if state.destination.is_none() {
        lines.push("Loading...".to_string());
    }
    lines
}

#[must_use]
pub fn render_login(state: &LoginState) -> Vec<String> {
    let mut lines = vec!["Sign in".to_string()];
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
    }
    if let Some(email) = &state.reset_sent_to {
        lines.push(format!("Reset link sent to {email}"));
    }
    lines
}

#[must_use]
pub fn render_register(state: &RegisterState) -> Vec<String> {
    let mut lines = vec!["Create account".to_string()];
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
    }
    lines
}

#[must_use]
pub fn render_home(state: &HomeState) -> Vec<String> {
    let mut lines = Vec::new();
    if !state.query.trim().is_empty() {
        lines.push(format!("Search: {}", state.query.trim()));
    }
    if !state.categories.is_empty() {
        let names: Vec<String> = state
            .categories
            .iter()
            .map(|c| {
                if state.selected_category.as_ref() == Some(&c.id) {
                    format!("[{}]", c.name)
                } else {
                    c.name.clone()
                }
            })
            .collect();
        lines.push(format!("Categories: {}", names.join(" | ")));
    }
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
        return lines;
    }
    if state.query.trim().is_empty() && state.selected_category.is_none() && !state.featured.is_empty() {
        lines.push("Featured".to_string());
        lines.extend(state.featured.iter().map(|p| format!("  * {}", product_line(p))));
    }
    if state.products.is_empty() {
        lines.push("No products found".to_string());
    } else {
        lines.push("Products".to_string());
        lines.extend(state.products.iter().map(|p| format!("  - {}", product_line(p))));
    }
    lines
}

#[must_use]
pub fn render_product_detail(state: &ProductDetailState) -> Vec<String> {
    let Some(product) = &state.product else {
        return status(state.is_loading, state.error.as_deref())
            .unwrap_or_else(|| vec!["Loading...".to_string()]);
    };
    let heart = if state.is_wishlisted { "♥" } else { "♡" };
    let mut lines = vec![
        format!("{heart} {}", product_line(product)),
        product.description.clone(),
    ];
    lines.extend(
        product
            .attributes
            .entries()
            .into_iter()
            .map(|(key, value)| format!("  {key}: {value}")),
    );
    if state.rating.count > 0 {
        lines.push(format!(
            "Rated {:.1}/5 from {} reviews",
            state.rating.average, state.rating.count
        ));
    }
    lines.push(format!("Quantity: {}", state.quantity));
    if let Some(error) = &state.error {
        lines.push(format!("! {error}"));
    }
    if !state.reviews.is_empty() {
        lines.push("Reviews".to_string());
        lines.extend(state.reviews.iter().map(|r| format!("  {}", review_line(r))));
    }
    lines
}

#[must_use]
pub fn render_cart(state: &CartState) -> Vec<String> {
    let mut lines = vec!["Cart".to_string()];
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
        return lines;
    }
    match &state.cart {
        Some(cart) if !cart.is_empty() => lines.extend(cart_lines(cart)),
        _ => lines.push("Your cart is empty".to_string()),
    }
    lines
}

#[must_use]
pub fn render_checkout(state: &CheckoutState) -> Vec<String> {
    let mut lines = vec!["Checkout".to_string()];
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
    }
    if let Some(cart) = &state.cart {
        lines.extend(cart_lines(cart));
    }
    lines.push("Ship to".to_string());
    if state.addresses.is_empty() {
        lines.push("  No saved addresses".to_string());
    }
    for address in &state.addresses {
        let mark = if state.selected_address.as_ref() == Some(&address.id) {
            "(x)"
        } else {
            "( )"
        };
        lines.push(format!("  {mark} {}", address_line(address)));
    }
    lines.push(format!("Payment: {}", state.payment_method.label()));
    lines
}

#[must_use]
pub fn render_profile(state: &ProfileState) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(user) = &state.user {
        lines.push(format!("[{}] {}", user.initials(), user.display_name));
        lines.push(user.email.to_string());
        if let Some(phone) = &user.phone {
            lines.push(phone.clone());
        }
    }
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
    }
    let theme = if state.dark_theme { "on" } else { "off" };
    lines.push(format!("Dark theme: {theme}"));
    lines
}

#[must_use]
pub fn render_address_book(state: &AddressBookState) -> Vec<String> {
    let mut lines = vec!["Addresses".to_string()];
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
        return lines;
    }
    if state.addresses.is_empty() {
        lines.push("No saved addresses".to_string());
    }
    lines.extend(state.addresses.iter().map(|a| format!("  {}", address_line(a))));
    lines
}

#[must_use]
pub fn render_add_edit_address(state: &AddEditAddressState) -> Vec<String> {
    let title = if state.editing.is_some() {
        "Edit address"
    } else {
        "New address"
    };
    let form = &state.form;
    let mut lines = vec![
        title.to_string(),
        format!("  Label: {}", form.label),
        format!("  Recipient: {}", form.recipient),
        format!("  Phone: {}", form.phone),
        format!("  Street: {}", form.line1),
    ];
    if !form.line2.is_empty() {
        lines.push(format!("          {}", form.line2));
    }
    lines.push(format!("  City: {}", form.city));
    lines.push(format!("  State: {}", form.state));
    lines.push(format!("  Postal code: {}", form.postal_code));
    lines.push(format!("  Country: {}", form.country));
    lines.push(format!("  Default: {}", if form.is_default { "yes" } else { "no" }));
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
    }
    lines
}

#[must_use]
pub fn render_orders(state: &OrdersState) -> Vec<String> {
    let mut lines = vec!["Orders".to_string()];
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
        return lines;
    }
    if state.orders.is_empty() {
        lines.push("No orders yet".to_string());
    }
    lines.extend(state.orders.iter().map(|o| format!("  {}", order_line(o))));
    lines
}

#[must_use]
pub fn render_order_detail(state: &OrderDetailState) -> Vec<String> {
    let Some(order) = &state.order else {
        return status(state.is_loading, state.error.as_deref())
            .unwrap_or_else(|| vec!["Loading...".to_string()]);
    };
    let mut lines = vec![order_line(order)];
    lines.extend(order.items.iter().map(|item| {
        format!(
            "  {} x{} = {}",
            item.name,
            item.quantity,
            item.line_total()
        )
    }));
    lines.push(format!("Ship to: {}", order.shipping_address.one_line()));
    lines.push(format!(
        "Payment: {} ({})",
        order.payment_method.label(),
        order.payment_status.label()
    ));
    if let Some(tracking) = &order.tracking_number {
        lines.push(format!("Tracking: {tracking}"));
    }
    lines
}

#[must_use]
pub fn render_wishlist(state: &WishlistState) -> Vec<String> {
    let mut lines = vec!["Wishlist".to_string()];
    if let Some(status) = status(state.is_loading, state.error.as_deref()) {
        lines.extend(status);
        return lines;
    }
    if state.products.is_empty() {
        lines.push("Nothing saved yet".to_string());
    }
    lines.extend(state.products.iter().map(|p| format!("  ♥ {}", product_line(p))));
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use opticart_core::{OrderId, PaymentMethod, UserId};

    use super::*;
    use crate::repository::fixtures::{address, product};

    #[test]
    fn test_cart_lines_show_total() {
        let mut cart = Cart::empty(UserId::new("u1"));
        cart.add(&product("p1", 100, 5), 2, None, None).unwrap();
        cart.add(&product("p2", 50, 5), 1, None, None).unwrap();
        let lines = render_cart(&CartState {
            cart: Some(cart),
            ..CartState::default()
        });
        assert_eq!(lines.last().unwrap(), "Total: $250.00");
        assert!(lines.contains(&"Frame p1 x2 @ $100.00 = $200.00".to_string()));
    }

    #[test]
    fn test_error_replaces_content() {
        let lines = render_orders(&OrdersState {
            error: Some("Please sign in to continue.".into()),
            ..OrdersState::default()
        });
        assert_eq!(lines, vec!["Orders", "! Please sign in to continue."]);
    }

    #[test]
    fn test_empty_search_result() {
        let lines = render_home(&HomeState {
            query: "zzz".into(),
            ..HomeState::default()
        });
        assert_eq!(lines, vec!["Search: zzz", "No products found"]);
    }

    #[test]
    fn test_checkout_marks_selected_address() {
        let home = address("u1", "Home");
        let state = CheckoutState {
            selected_address: Some(home.id.clone()),
            addresses: vec![home, address("u1", "Office")],
            payment_method: PaymentMethod::Card,
            ..CheckoutState::default()
        };
        let lines = render_checkout(&state);
        assert!(lines.iter().any(|l| l.starts_with("  (x) Home")));
        assert!(lines.iter().any(|l| l.starts_with("  ( ) Office")));
        assert_eq!(lines.last().unwrap(), "Payment: Credit / debit card");
    }

    #[test]
    fn test_order_detail_lists_items() {
        let user = UserId::new("u1");
        let mut cart = Cart::empty(user.clone());
        cart.add(&product("p1", 80, 5), 1, None, None).unwrap();
        let order = Order::from_cart(
            OrderId::new("order-1"),
            &cart,
            &address("u1", "Home"),
            PaymentMethod::CashOnDelivery,
            Utc::now(),
        )
        .unwrap();
        let lines = render_order_detail(&OrderDetailState {
            order: Some(order),
            ..OrderDetailState::default()
        });
        assert!(lines.contains(&"  Frame p1 x1 = $80.00".to_string()));
    }
}
