//! Load the built-in demo catalog.

use tracing::info;

use opticart_storefront::AppState;
use opticart_storefront::seed::{SeedError, catalog, seed_catalog};

/// Seed categories and products priced in the configured currency.
///
/// # Errors
///
/// Returns an error if the catalog is inconsistent or the write fails.
pub async fn run(app: &AppState, overwrite: bool) -> Result<(), SeedError> {
    let catalog = catalog(app.config().currency);
    info!(
        backend = ?app.config().backend,
        overwrite,
        "Seeding demo catalog"
    );
    let report = seed_catalog(app.store(), &catalog, overwrite).await?;

    info!("Seeding complete!");
    info!("  Categories written: {}", report.categories_written);
    info!("  Products written: {}", report.products_written);
    info!("  Skipped (already exist): {}", report.skipped);
    Ok(())
}
