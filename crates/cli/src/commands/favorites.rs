//! Favorite commands.

use delguur_core::ProductId;
use delguur_storefront::Storefront;
use tracing::info;

use super::CliError;

/// # Errors
///
/// Returns an error if the list cannot be loaded.
pub async fn list(storefront: &Storefront, refresh: bool) -> Result<(), CliError> {
    let favorites = storefront.favorites().favorites(refresh).await?;
    if favorites.is_empty() {
        info!("No favorites");
    }
    for item in &favorites {
        info!("#{:<6} {:<32} {:>10}", item.product_id, item.name, item.price);
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the change is refused.
pub async fn toggle(storefront: &Storefront, product_id: ProductId) -> Result<(), CliError> {
    // Membership is checked against the cached id set.
    storefront.favorites().favorite_ids(false).await?;
    if storefront.favorites().toggle(product_id).await? {
        info!("Product #{product_id} added to favorites");
    } else {
        info!("Product #{product_id} removed from favorites");
    }
    Ok(())
}
