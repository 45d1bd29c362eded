//! Opticart CLI - Database migrations, catalog seeding and demos.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! opticart migrate
//!
//! # Load the built-in demo catalog
//! opticart seed
//!
//! # Browse the catalog
//! opticart catalog --search aviator
//! opticart product classic-round
//!
//! # Walk through sign-up, cart and checkout against the in-memory backend
//! opticart demo
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Load the demo catalog (existing documents are kept)
//! - `catalog` / `product` / `order` - Read-only lookups
//! - `demo` - Scripted checkout printed screen by screen
//!
//! Configuration comes from the `OPTICART_*` environment variables (see
//! `StorefrontConfig`). `--memory` forces the in-memory backend, which starts
//! with the demo catalog loaded.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opticart_storefront::StorefrontConfig;

mod commands;

#[derive(Parser)]
#[command(name = "opticart")]
#[command(author, version, about = "Opticart CLI tools")]
struct Cli {
    /// Use the in-memory backend regardless of `OPTICART_BACKEND`
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load the built-in demo catalog
    Seed {
        /// Replace documents that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// List products
    Catalog {
        /// Case-insensitive match on name or brand
        #[arg(short, long)]
        search: Option<String>,

        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product with its reviews
    Product {
        /// Product ID
        id: String,
    },
    /// Show one order
    Order {
        /// Order ID
        id: String,
    },
    /// Scripted sign-up and checkout against the in-memory backend
    Demo,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.sentry_environment.clone().into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) if cli.memory => config.in_memory(),
        Ok(config) => config,
        Err(e) => {
            let _ = writeln!(std::io::stderr(), "Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "opticart_cli=info,opticart_storefront=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli.command, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Migrate => commands::migrate::run(&config).await?,
        Commands::Seed { overwrite } => {
            let app = opticart_storefront::AppState::connect(config).await?;
            commands::seed::run(&app, overwrite).await?;
        }
        Commands::Catalog { search, category } => {
            let app = commands::connect(config).await?;
            commands::browse::catalog(&app, search.as_deref(), category.as_deref()).await?;
        }
        Commands::Product { id } => {
            let app = commands::connect(config).await?;
            commands::browse::product(&app, &id).await?;
        }
        Commands::Order { id } => {
            let app = commands::connect(config).await?;
            commands::browse::order(&app, &id).await?;
        }
        Commands::Demo => commands::demo::run(config.in_memory()).await?,
    }
    Ok(())
}
