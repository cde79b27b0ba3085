//! `cartkeep cart` command implementation.

use crate::cli::open_jar;
use crate::config::{Config, load_config};
use crate::core::{CartStore, Product, SystemClock};
use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Maximum length for the product column.
const NAME_COLUMN_LEN: usize = 28;

/// Product fields taken from the command line.
#[derive(Debug, Clone)]
pub struct ProductArgs {
    /// Product ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: f64,
    /// Units available.
    pub stock: u32,
    /// URL slug; the ID when absent.
    pub slug: Option<String>,
    /// Category name.
    pub category: Option<String>,
    /// Variant attributes as key/value pairs.
    pub attributes: Vec<(String, String)>,
}

impl From<ProductArgs> for Product {
    fn from(args: ProductArgs) -> Self {
        Self {
            slug: args.slug.unwrap_or_else(|| args.id.clone()),
            id: args.id,
            name: args.name,
            price: args.price,
            images: Vec::new(),
            stock: args.stock,
            category: args.category,
            attributes: args.attributes.into_iter().collect::<BTreeMap<_, _>>(),
        }
    }
}

/// Parse a `key=value` product attribute.
///
/// # Errors
///
/// Returns a message if there is no `=` or the key is empty.
pub fn parse_attribute(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

/// Show the stored cart.
///
/// # Errors
///
/// Returns an error if the configuration or cookie jar cannot be opened.
pub fn show() -> Result<()> {
    let config = load_config()?;
    let cart = open_cart(&config)?;
    print!("{}", render(&cart));
    Ok(())
}

/// Add a product.
///
/// # Errors
///
/// Returns an error if the product is rejected or the cart cannot be saved.
pub fn add(product: ProductArgs, quantity: u32) -> Result<()> {
    with_cart(|cart| cart.add_item(product.into(), quantity))
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if the cart cannot be saved.
pub fn remove(line_id: &str) -> Result<()> {
    with_cart(|cart| {
        if !cart.remove_item(line_id)? {
            println!("No line {line_id} in the cart.");
        }
        Ok(())
    })
}

/// Set a line's quantity; `0` removes it.
///
/// # Errors
///
/// Returns an error if the line is unknown, stock is short, or the cart
/// cannot be saved.
pub fn set(line_id: &str, quantity: u32) -> Result<()> {
    with_cart(|cart| cart.update_quantity(line_id, quantity))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be saved.
pub fn clear() -> Result<()> {
    with_cart(CartStore::clear_cart)
}

/// Load the cart, apply `mutate`, write it straight away and print it.
fn with_cart<F>(mutate: F) -> Result<()>
where
    F: FnOnce(&mut CartStore) -> Result<()>,
{
    let config = load_config()?;
    let mut cart = open_cart(&config)?;
    mutate(&mut cart)?;
    // One-shot process: nothing would poll a debounced write.
    cart.flush()?;
    print!("{}", render(&cart));
    Ok(())
}

fn open_cart(config: &Config) -> Result<CartStore> {
    let mut cart = CartStore::new(open_jar(config)?, Arc::new(SystemClock), config);
    if let Err(e) = cart.initialize() {
        tracing::warn!(error = %e, "ignoring unreadable stored cart");
    }
    Ok(cart)
}

/// Render the cart as a table.
fn render(cart: &CartStore) -> String {
    let mut out = String::new();

    if cart.is_empty() {
        out.push_str("Cart is empty.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<32} {:<28} {:>5} {:>10}",
        "Line", "Product", "Qty", "Total"
    );
    let _ = writeln!(out, "{}", "─".repeat(78));
    for item in cart.items() {
        let _ = writeln!(
            out,
            "{:<32} {:<28} {:>5} {:>10.2}",
            item.id,
            truncate(&item.product.name),
            item.quantity,
            item.line_total()
        );
    }
    let _ = writeln!(out, "{}", "─".repeat(78));
    let _ = writeln!(
        out,
        "{} unit(s), subtotal {:.2}",
        cart.item_count(),
        cart.subtotal()
    );
    out
}

fn truncate(name: &str) -> String {
    if name.chars().count() > NAME_COLUMN_LEN {
        let head: String = name.chars().take(NAME_COLUMN_LEN - 3).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::storage::MemoryJar;

    fn args(id: &str, price: f64) -> ProductArgs {
        ProductArgs {
            id: id.to_string(),
            name: format!("Wine {id}"),
            price,
            stock: 10,
            slug: None,
            category: None,
            attributes: vec![("vintage".to_string(), "2019".to_string())],
        }
    }

    fn memory_cart() -> CartStore {
        CartStore::new(
            Arc::new(MemoryJar::new()),
            Arc::new(ManualClock::default()),
            &Config::default(),
        )
    }

    #[test]
    fn product_args_fill_defaults() {
        let product = Product::from(args("rioja", 12.5));
        assert_eq!(product.slug, "rioja");
        assert_eq!(product.attributes.get("vintage").map(String::as_str), Some("2019"));
        assert!(product.images.is_empty());
    }

    #[test]
    fn parse_attribute_accepts_key_value() {
        assert_eq!(
            parse_attribute(" vintage = 2019 ").unwrap(),
            ("vintage".to_string(), "2019".to_string())
        );
        assert!(parse_attribute("vintage").is_err());
        assert!(parse_attribute("=2019").is_err());
    }

    #[test]
    fn render_empty_cart() {
        assert_eq!(render(&memory_cart()), "Cart is empty.\n");
    }

    #[test]
    fn render_lists_lines_and_subtotal() {
        let mut cart = memory_cart();
        cart.add_item(args("rioja", 12.5).into(), 2).unwrap();

        let out = render(&cart);
        assert!(out.contains("Wine rioja"));
        assert!(out.contains("25.00"));
        assert!(out.contains("2 unit(s), subtotal 25.00"));
    }

    #[test]
    fn truncate_long_names() {
        let name = "x".repeat(40);
        let short = truncate(&name);
        assert_eq!(short.chars().count(), NAME_COLUMN_LEN);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
