//! Delguur CLI - drive the storefront client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session is kept in the local store)
//! dg login -e bat@example.mn
//!
//! # Inspect and edit the cart
//! dg cart show
//! dg cart add 42 --quantity 2
//! dg cart set-qty 7 3
//!
//! # Pay an order with QPay and wait for the result
//! dg pay 90 --qr-out qpay.png
//!
//! # Drop every cached entry
//! dg cache purge
//! ```
//!
//! # Environment Variables
//!
//! - `DELGUUR_API_URL` - Storefront backend base URL (required)
//! - `DELGUUR_STORAGE_PATH` - Local store file (default: `.delguur/store.json`)
//! - `DELGUUR_PASSWORD` - Password for `login` when `--password` is omitted
//! - `SENTRY_DSN` - Sentry error tracking DSN

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use delguur_core::{AddressId, CartItemId, OrderId, OrderStatus, ProductId};
use delguur_storefront::config::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "dg")]
#[command(author, version, about = "Delguur storefront CLI")]
struct Cli {
    /// Local store file keeping the session and cached data
    #[arg(
        long,
        global = true,
        env = "DELGUUR_STORAGE_PATH",
        default_value = ".delguur/store.json"
    )]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password, or a Facebook access token
    Login {
        /// Account email address
        #[arg(short, long, required_unless_present = "facebook_token")]
        email: Option<String>,

        /// Account password
        #[arg(short, long, env = "DELGUUR_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Facebook access token obtained elsewhere
        #[arg(long, conflicts_with = "email")]
        facebook_token: Option<String>,
    },
    /// Sign out and drop all user data from the local store
    Logout,
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// List and manage orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// List and edit favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// List and manage shipping addresses
    Addresses {
        #[command(subcommand)]
        action: AddressesAction,
    },
    /// Pay an order with QPay and wait for the result
    Pay {
        /// Order to pay
        order_id: OrderId,

        /// Write the payment QR code to this PNG file
        #[arg(long)]
        qr_out: Option<PathBuf>,

        /// Only watch an invoice that already exists
        #[arg(long)]
        watch: bool,
    },
    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and totals
    Show {
        /// Bypass the local cache
        #[arg(long)]
        refresh: bool,
    },
    /// Add a product
    Add {
        product_id: ProductId,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a cart line
    SetQty { item_id: CartItemId, quantity: u32 },
    /// Remove a cart line
    Remove { item_id: CartItemId },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders
    List {
        /// Only orders in this status (e.g. `pending_payment`, `shipped`)
        #[arg(short, long)]
        status: Option<OrderStatus>,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        refresh: bool,
    },
    /// Show one order
    Show {
        order_id: OrderId,
        #[arg(long)]
        refresh: bool,
    },
    /// Cancel an unpaid order
    Cancel { order_id: OrderId },
    /// Confirm receipt of a shipped order
    Confirm { order_id: OrderId },
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// List favorites
    List {
        #[arg(long)]
        refresh: bool,
    },
    /// Add or remove a product
    Toggle { product_id: ProductId },
}

#[derive(Subcommand)]
enum AddressesAction {
    /// List addresses
    List {
        #[arg(long)]
        refresh: bool,
    },
    /// Make an address the default
    SetDefault { address_id: AddressId },
    /// Delete an address
    Delete { address_id: AddressId },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete every cached entry, the session included
    Purge,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "delguur_cli=info,delguur_storefront=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().without_time().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mut config: StorefrontConfig) -> Result<(), CliError> {
    config.storage_path = Some(cli.store);
    let storefront = commands::open(config)?;

    match cli.command {
        Commands::Login {
            email,
            password,
            facebook_token,
        } => match (facebook_token, email) {
            (Some(token), _) => commands::account::facebook_login(&storefront, &token).await?,
            (None, Some(email)) => {
                commands::account::login(&storefront, &email, password.as_deref()).await?;
            }
            (None, None) => return Err(CliError::Usage("--email is required")),
        },
        Commands::Logout => commands::account::logout(&storefront).await,
        Commands::Cart { action } => match action {
            CartAction::Show { refresh } => commands::cart::show(&storefront, refresh).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&storefront, product_id, quantity).await?,
            CartAction::SetQty { item_id, quantity } => {
                commands::cart::set_quantity(&storefront, item_id, quantity).await?;
            }
            CartAction::Remove { item_id } => commands::cart::remove(&storefront, item_id).await?,
            CartAction::Clear => commands::cart::clear(&storefront).await?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List {
                status,
                page,
                refresh,
            } => commands::orders::list(&storefront, status, page, refresh).await?,
            OrdersAction::Show { order_id, refresh } => {
                commands::orders::show(&storefront, order_id, refresh).await?;
            }
            OrdersAction::Cancel { order_id } => {
                commands::orders::cancel(&storefront, order_id).await?;
            }
            OrdersAction::Confirm { order_id } => {
                commands::orders::confirm(&storefront, order_id).await?;
            }
        },
        Commands::Favorites { action } => match action {
            FavoritesAction::List { refresh } => {
                commands::favorites::list(&storefront, refresh).await?;
            }
            FavoritesAction::Toggle { product_id } => {
                commands::favorites::toggle(&storefront, product_id).await?;
            }
        },
        Commands::Addresses { action } => match action {
            AddressesAction::List { refresh } => {
                commands::addresses::list(&storefront, refresh).await?;
            }
            AddressesAction::SetDefault { address_id } => {
                commands::addresses::set_default(&storefront, address_id).await?;
            }
            AddressesAction::Delete { address_id } => {
                commands::addresses::delete(&storefront, address_id).await?;
            }
        },
        Commands::Pay {
            order_id,
            qr_out,
            watch,
        } => commands::pay::run(&storefront, order_id, qr_out.as_deref(), watch).await?,
        Commands::Cache { action } => match action {
            CacheAction::Purge => commands::cache::purge(&storefront),
        },
    }
    Ok(())
}
