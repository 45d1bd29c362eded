//! Read-only catalog and order lookups.
//!
//! These read each live query once and print it with the same renderers the
//! screens use.

use opticart_core::{CategoryId, OrderId, ProductId, Review};
use opticart_storefront::AppState;
use opticart_storefront::repository::first_loaded;
use opticart_storefront::screen::{render_home, render_order_detail, render_product_detail};
use opticart_storefront::viewmodel::{HomeState, OrderDetailState, ProductDetailState};

use super::print_lines;

/// Print the catalog, optionally narrowed by a search and a category.
///
/// # Errors
///
/// Returns an error if a read fails or stdout is closed.
pub async fn catalog(
    app: &AppState,
    search: Option<&str>,
    category: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let uc = app.use_cases();
    let query = search.map(str::trim).unwrap_or_default().to_string();
    let selected_category = category.map(CategoryId::new);

    let categories = first_loaded(uc.get_categories.execute()).await?;
    let featured = first_loaded(uc.get_featured_products.execute()).await?;
    let products = match (&selected_category, query.is_empty()) {
        (None, true) => first_loaded(uc.get_products.execute()).await?,
        (Some(id), true) => first_loaded(uc.get_products_by_category.execute(id)).await?,
        (selected, false) => first_loaded(uc.search_products.execute(&query))
            .await?
            .into_iter()
            .filter(|p| selected.as_ref().is_none_or(|c| &p.category_id == c))
            .collect(),
    };

    let state = HomeState {
        products,
        featured,
        categories,
        query,
        selected_category,
        ..HomeState::default()
    };
    print_lines(&render_home(&state))?;
    Ok(())
}

/// Print one product with its reviews.
///
/// # Errors
///
/// Returns an error if the product does not exist or a read fails.
pub async fn product(app: &AppState, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let uc = app.use_cases();
    let id = ProductId::new(id);
    let product = first_loaded(uc.get_product.execute(&id)).await?;
    let reviews = first_loaded(uc.get_reviews.execute(&id)).await?;

    let state = ProductDetailState {
        product: Some(product),
        rating: Review::summarize(&reviews),
        reviews,
        ..ProductDetailState::default()
    };
    print_lines(&render_product_detail(&state))?;
    Ok(())
}

/// Print one order.
///
/// # Errors
///
/// Returns an error if the order does not exist or the read fails.
pub async fn order(app: &AppState, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let order = first_loaded(app.use_cases().get_order.execute(&OrderId::new(id))).await?;
    let state = OrderDetailState {
        order: Some(order),
        ..OrderDetailState::default()
    };
    print_lines(&render_order_detail(&state))?;
    Ok(())
}
