//! cartkeep CLI - Inspect and edit the persisted cart and checkout session.

use cartkeep::cli;
use cartkeep::cli::cart::{ProductArgs, parse_attribute};
use cartkeep::core::CheckoutStep;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cartkeep")]
#[command(author, version, about = "Cart and checkout session persistence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit the cart.
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },

    /// Inspect or move the checkout session.
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and subtotal.
    Show,

    /// Add a product, merging with a matching line.
    Add {
        /// Product ID.
        #[arg(long)]
        id: String,

        /// Display name.
        #[arg(long)]
        name: String,

        /// Unit price.
        #[arg(long)]
        price: f64,

        /// Units available.
        #[arg(long, default_value = "99")]
        stock: u32,

        /// Units to add.
        #[arg(short, long, default_value = "1")]
        quantity: u32,

        /// URL slug. Defaults to the product ID.
        #[arg(long)]
        slug: Option<String>,

        /// Category name.
        #[arg(long)]
        category: Option<String>,

        /// Variant attribute as key=value. Repeatable.
        #[arg(long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,
    },

    /// Remove a line.
    Remove {
        /// Line ID.
        line_id: String,
    },

    /// Set a line's quantity (0 removes it).
    Set {
        /// Line ID.
        line_id: String,

        /// New quantity.
        quantity: u32,
    },

    /// Remove every line.
    Clear,
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Show the live session without card details.
    Show,

    /// Move to a step (shipping, payment, review, confirmation).
    Step {
        /// Target step.
        step: CheckoutStep,
    },

    /// Drop the session.
    Reset,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CARTKEEP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => cli::cart::show(),
            CartAction::Add {
                id,
                name,
                price,
                stock,
                quantity,
                slug,
                category,
                attributes,
            } => cli::cart::add(
                ProductArgs {
                    id,
                    name,
                    price,
                    stock,
                    slug,
                    category,
                    attributes,
                },
                quantity,
            ),
            CartAction::Remove { line_id } => cli::cart::remove(&line_id),
            CartAction::Set { line_id, quantity } => cli::cart::set(&line_id, quantity),
            CartAction::Clear => cli::cart::clear(),
        },
        Commands::Checkout { action } => match action {
            CheckoutAction::Show => cli::checkout::show(),
            CheckoutAction::Step { step } => cli::checkout::step(step),
            CheckoutAction::Reset => cli::checkout::reset(),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cartkeep: error: {e}");
            ExitCode::FAILURE
        }
    }
}
