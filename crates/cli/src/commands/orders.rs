//! Order commands.

use delguur_core::{OrderId, OrderStatus};
use delguur_storefront::Storefront;
use delguur_storefront::models::OrderQuery;
use tracing::info;

use super::CliError;

/// # Errors
///
/// Returns an error if the page cannot be loaded.
pub async fn list(
    storefront: &Storefront,
    status: Option<OrderStatus>,
    page: u32,
    refresh: bool,
) -> Result<(), CliError> {
    let query = OrderQuery {
        status,
        page,
        ..OrderQuery::default()
    };
    let orders = storefront.orders().list(query, refresh).await?;
    if orders.items.is_empty() {
        info!("No orders");
        return Ok(());
    }
    for order in &orders.items {
        info!(
            "#{:<6} {:<14} {:<16} {:>3} items {:>12}",
            order.id, order.order_no, order.status, order.item_count, order.total_amount
        );
    }
    info!("Page {page}, {} orders in total", orders.total);
    Ok(())
}

/// # Errors
///
/// Returns an error if the order cannot be loaded.
pub async fn show(storefront: &Storefront, order_id: OrderId, refresh: bool) -> Result<(), CliError> {
    let Some(order) = storefront.orders().detail(order_id, refresh).await? else {
        return Err(CliError::Usage("sign in with `dg login` first"));
    };
    info!("Order {} (#{}) - {}", order.order_no, order.id, order.status);
    for line in &order.lines {
        info!("  {:<32} {:>3} x {:>10}", line.name, line.quantity, line.price);
    }
    info!("Subtotal {:>12}", order.subtotal);
    if !order.discount.is_zero() {
        info!("Discount {:>12}", order.discount);
    }
    info!("Shipping {:>12}", order.shipping_fee);
    info!("Total    {:>12}", order.total_amount);
    if !order.address.is_empty() {
        info!("Ship to {} ({}), {}", order.receiver_name, order.phone, order.address);
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the order cannot be cancelled in its current status.
pub async fn cancel(storefront: &Storefront, order_id: OrderId) -> Result<(), CliError> {
    storefront.orders().cancel(order_id).await?;
    info!("Order #{order_id} cancelled");
    Ok(())
}

/// # Errors
///
/// Returns an error if the order has not shipped yet.
pub async fn confirm(storefront: &Storefront, order_id: OrderId) -> Result<(), CliError> {
    storefront.orders().confirm(order_id).await?;
    info!("Receipt of order #{order_id} confirmed");
    Ok(())
}
