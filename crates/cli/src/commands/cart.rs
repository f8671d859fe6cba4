//! Cart commands.

use delguur_core::{CartItemId, ProductId};
use delguur_storefront::Storefront;
use delguur_storefront::models::Cart;
use delguur_storefront::optimistic::CommitOutcome;
use tracing::info;

use super::CliError;

/// Print the cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded.
pub async fn show(storefront: &Storefront, refresh: bool) -> Result<(), CliError> {
    let cart = storefront.cart().fetch(refresh).await?;
    print_cart(&cart);
    Ok(())
}

/// # Errors
///
/// Returns an error if the product cannot be added.
pub async fn add(storefront: &Storefront, product_id: ProductId, quantity: u32) -> Result<(), CliError> {
    let cart = storefront.cart().add(product_id, quantity).await?;
    info!("Added product #{product_id} x{quantity}");
    print_cart(&cart);
    Ok(())
}

/// Change a line quantity and wait until the backend has it.
///
/// # Errors
///
/// Returns an error for an invalid quantity or if the update was rolled back.
pub async fn set_quantity(
    storefront: &Storefront,
    item_id: CartItemId,
    quantity: u32,
) -> Result<(), CliError> {
    // The optimistic path only knows lines already loaded.
    storefront.cart().fetch(false).await?;
    let pending = storefront.cart().set_quantity(item_id, quantity)?;
    match pending.await? {
        CommitOutcome::Committed => info!("Line #{item_id} set to {quantity}"),
        CommitOutcome::Superseded | CommitOutcome::Cancelled => {
            info!("Quantity change for line #{item_id} was not sent");
        }
    }
    print_cart(&storefront.cart().current());
    Ok(())
}

/// # Errors
///
/// Returns an error if the line cannot be removed.
pub async fn remove(storefront: &Storefront, item_id: CartItemId) -> Result<(), CliError> {
    let cart = storefront.cart().remove(item_id).await?;
    info!("Removed line #{item_id}");
    print_cart(&cart);
    Ok(())
}

/// # Errors
///
/// Returns an error if the cart cannot be cleared.
pub async fn clear(storefront: &Storefront) -> Result<(), CliError> {
    storefront.cart().clear().await?;
    info!("Cart cleared");
    Ok(())
}

fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        info!("Cart is empty");
        return;
    }
    for item in &cart.items {
        let mark = if item.selected { "x" } else { " " };
        info!(
            "[{mark}] #{:<6} {:<32} {:>3} x {:>10} = {:>12}",
            item.id,
            item.name,
            item.quantity,
            item.price,
            item.line_total()
        );
    }
    info!("{} units, total {}", cart.total_quantity, cart.total());
}
