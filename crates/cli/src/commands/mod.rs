//! Subcommand implementations.

pub mod browse;
pub mod demo;
pub mod migrate;
pub mod seed;

use std::io::{self, Write};

use opticart_storefront::seed::{catalog, seed_catalog};
use opticart_storefront::{AppState, BackendKind, StorefrontConfig};

/// Build the app for `config`.
///
/// The in-memory backend starts empty, so it gets the demo catalog.
pub async fn connect(config: StorefrontConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let app = AppState::connect(config).await?;
    if app.config().backend == BackendKind::Memory {
        let report = seed_catalog(app.store(), &catalog(app.config().currency), false).await?;
        tracing::debug!(
            products = report.products_written,
            "Loaded demo catalog into memory"
        );
    }
    Ok(app)
}

/// Write rendered screen lines to stdout.
pub fn print_lines(lines: &[String]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
