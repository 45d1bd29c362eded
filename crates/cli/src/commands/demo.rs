//! Scripted walk through the storefront screens.
//!
//! Registers a shopper, adds two frames to the cart, saves an address and
//! checks out, printing each screen as it settles. Runs against a fresh
//! in-memory backend so nothing outside the process is touched.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{broadcast, watch};
use tracing::info;

use opticart_core::{LensCoating, LensOptions, LensType, OrderId, PaymentMethod, ProductId};
use opticart_storefront::backend::memory::{
    MemoryAuthProvider, MemoryDocumentStore, MemorySettingsStore,
};
use opticart_storefront::screen::{
    render_cart, render_checkout, render_home, render_order_detail, render_orders,
    render_product_detail, render_register, render_splash,
};
use opticart_storefront::seed::{catalog, seed_catalog};
use opticart_storefront::viewmodel::RegisterForm;
use opticart_storefront::{AppState, Route, StorefrontConfig, UiEvent, ViewModel};

use super::print_lines;

/// How long a screen may take to settle before the demo gives up.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

const DEMO_EMAIL: &str = "demo@opticart.dev";
const DEMO_PASSWORD: &str = "opticart-demo";

type DemoResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Run the scripted checkout.
///
/// # Errors
///
/// Returns an error if any step leaves its screen in an error state or
/// does not settle in time.
pub async fn run(config: StorefrontConfig) -> DemoResult<()> {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store, &catalog(config.currency), false).await?;
    let app = AppState::from_backends(
        config,
        Arc::new(store),
        Arc::new(MemoryAuthProvider::new()),
        Arc::new(MemorySettingsStore::default()),
    );

    heading("Splash")?;
    print_lines(&render_splash(&app.splash().snapshot()))?;

    heading("Register")?;
    let register = app.register();
    register
        .register(RegisterForm {
            display_name: "Demo Shopper".to_string(),
            email: DEMO_EMAIL.to_string(),
            password: SecretString::from(DEMO_PASSWORD),
            confirm_password: SecretString::from(DEMO_PASSWORD),
        })
        .await?;
    let state = register.snapshot();
    print_lines(&render_register(&state))?;
    check("register", state.error)?;
    info!(email = DEMO_EMAIL, "Demo shopper signed up");

    heading("Home")?;
    let home = app.home();
    let state = settle(&mut home.state(), "home", |s| {
        s.error.is_some() || (!s.products.is_empty() && !s.featured.is_empty())
    })
    .await?;
    print_lines(&render_home(&state))?;
    check("home", state.error.clone())?;
    let picks: Vec<ProductId> = state
        .featured
        .iter()
        .filter(|p| p.in_stock())
        .take(2)
        .map(|p| p.id.clone())
        .collect();

    for (n, product_id) in picks.iter().enumerate() {
        heading(&format!("Product {product_id}"))?;
        let detail = app.product_detail(product_id.clone());
        settle(&mut detail.state(), "product", |s| {
            s.product.is_some() || s.error.is_some()
        })
        .await?;
        // First pick gets two pairs with blue-light lenses, the second one plain.
        let lens = if n == 0 {
            detail.set_quantity(2);
            Some(LensOptions {
                lens_type: LensType::SingleVision,
                coatings: vec![LensCoating::BlueLight],
            })
        } else {
            None
        };
        print_lines(&render_product_detail(&detail.snapshot()))?;
        detail.add_to_cart(None, lens).await?;
        check("add to cart", detail.snapshot().error)?;
    }

    heading("Cart")?;
    let cart = app.cart();
    let state = settle(&mut cart.state(), "cart", |s| {
        s.error.is_some() || s.cart.as_ref().is_some_and(|c| c.items.len() == picks.len())
    })
    .await?;
    print_lines(&render_cart(&state))?;
    check("cart", state.error)?;

    heading("New address")?;
    let form = app.add_edit_address(None);
    form.edit_form(|f| {
        f.label = "Home".to_string();
        f.recipient = "Demo Shopper".to_string();
        f.phone = "+1 555 0100".to_string();
        f.line1 = "1 Lens Lane".to_string();
        f.city = "Portland".to_string();
        f.state = "OR".to_string();
        f.postal_code = "97201".to_string();
        f.country = "US".to_string();
    });
    form.save().await?;
    check("save address", form.snapshot().error)?;

    heading("Checkout")?;
    let checkout = app.checkout();
    let state = settle(&mut checkout.state(), "checkout", |s| {
        s.error.is_some() || s.can_place_order()
    })
    .await?;
    check("checkout", state.error)?;
    checkout.select_payment_method(PaymentMethod::Card);
    print_lines(&render_checkout(&checkout.snapshot()))?;

    let mut events = checkout.events();
    checkout.place_order().await?;
    check("place order", checkout.snapshot().error)?;
    let order_id = next_order(&mut events).await?;
    info!(order_id = %order_id, "Demo order placed");

    heading("Order")?;
    let detail = app.order_detail(order_id);
    let state = settle(&mut detail.state(), "order", |s| {
        s.order.is_some() || s.error.is_some()
    })
    .await?;
    print_lines(&render_order_detail(&state))?;
    check("order", state.error)?;

    heading("Orders")?;
    let orders = app.orders();
    let state = settle(&mut orders.state(), "orders", |s| {
        s.error.is_some() || !s.orders.is_empty()
    })
    .await?;
    print_lines(&render_orders(&state))?;

    heading("Cart after checkout")?;
    let state = settle(&mut cart.state(), "cart", |s| {
        s.error.is_some() || s.cart.as_ref().is_some_and(|c| c.items.is_empty())
    })
    .await?;
    print_lines(&render_cart(&state))?;
    Ok(())
}

fn heading(title: &str) -> DemoResult<()> {
    print_lines(&[String::new(), format!("== {title} ==")])?;
    Ok(())
}

fn check(step: &str, error: Option<String>) -> DemoResult<()> {
    match error {
        Some(message) => Err(format!("{step} failed: {message}").into()),
        None => Ok(()),
    }
}

/// Wait for a screen state matching `ready`.
async fn settle<S: Clone>(
    rx: &mut watch::Receiver<S>,
    what: &str,
    ready: impl FnMut(&S) -> bool,
) -> DemoResult<S> {
    let state = tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(ready))
        .await
        .map_err(|_| format!("timed out waiting for {what}"))?
        .map_err(|_| format!("{what} screen closed"))?;
    Ok((*state).clone())
}

/// The order checkout navigates to.
async fn next_order(events: &mut broadcast::Receiver<UiEvent>) -> DemoResult<OrderId> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(UiEvent::Navigate(Route::OrderDetail(id))) => return Ok(id),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err("checkout closed before navigating".to_string());
                }
            }
        }
    };
    let id = tokio::time::timeout(SETTLE_TIMEOUT, wait)
        .await
        .map_err(|_| "timed out waiting for the order".to_string())??;
    Ok(id)
}
