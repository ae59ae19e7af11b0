//! FlixFuel CLI - inspect and edit the persisted cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! ff-cli cart show
//!
//! # Add one unit of a product
//! ff-cli cart add p1 --price 19.99 --name "Protein Bar"
//!
//! # Set a quantity (0 removes the line)
//! ff-cli cart set p1 3
//!
//! # Subtotal, shipping, tax and total
//! ff-cli cart summary
//! ```
//!
//! # Commands
//!
//! - `cart show` - Print the persisted cart
//! - `cart add` / `remove` / `set` / `clear` - Edit the persisted cart
//! - `cart summary` - Print checkout totals

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flixfuel_core::ItemMetadata;
use flixfuel_storefront::config::StorefrontConfig;
use rust_decimal::Decimal;
use serde::Serialize;

use commands::cart::CartChange;

mod commands;

#[derive(Parser)]
#[command(name = "ff-cli")]
#[command(author, version, about = "FlixFuel CLI tools")]
struct Cli {
    /// Directory holding the persisted cart
    #[arg(long, global = true, env = "CART_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit the persisted cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add one unit of a product
    Add {
        /// Product ID
        product_id: String,

        /// Unit price
        #[arg(short, long)]
        price: Decimal,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Image URL
        #[arg(long)]
        image: Option<String>,

        /// Category
        #[arg(long)]
        category: Option<String>,
    },
    /// Remove a product's line item
    Remove {
        /// Product ID
        product_id: String,
    },
    /// Set a product's quantity; 0 or less removes it
    Set {
        /// Product ID
        product_id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove every line item
    Clear,
    /// Print subtotal, shipping, tax and total
    Summary,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = StorefrontConfig::from_env()?;
    let data_dir = cli.data_dir.unwrap_or(config.data_dir);

    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => print(&commands::cart::show(&data_dir).await)?,
            CartAction::Summary => {
                print(&commands::cart::summary(&data_dir, &config.pricing).await)?;
            }
            CartAction::Add {
                product_id,
                price,
                name,
                image,
                category,
            } => {
                let metadata = ItemMetadata {
                    name,
                    image,
                    category,
                    ..ItemMetadata::default()
                };
                let change = CartChange::Add {
                    product_id,
                    price,
                    metadata,
                };
                print(&commands::cart::apply(&data_dir, change).await?)?;
            }
            CartAction::Remove { product_id } => {
                let change = CartChange::Remove { product_id };
                print(&commands::cart::apply(&data_dir, change).await?)?;
            }
            CartAction::Set {
                product_id,
                quantity,
            } => {
                let change = CartChange::Set {
                    product_id,
                    quantity,
                };
                print(&commands::cart::apply(&data_dir, change).await?)?;
            }
            CartAction::Clear => {
                print(&commands::cart::apply(&data_dir, CartChange::Clear).await?)?;
            }
        },
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
