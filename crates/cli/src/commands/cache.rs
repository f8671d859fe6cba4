//! Local cache maintenance.

use delguur_storefront::Storefront;

/// Drop every entry in this client's namespace.
pub fn purge(storefront: &Storefront) {
    let removed = storefront.cache().clear();
    tracing::info!("Removed {removed} cached entries");
}
