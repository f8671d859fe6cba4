//! Address commands.

use delguur_core::AddressId;
use delguur_storefront::Storefront;
use tracing::info;

use super::CliError;

/// # Errors
///
/// Returns an error if the addresses cannot be loaded.
pub async fn list(storefront: &Storefront, refresh: bool) -> Result<(), CliError> {
    let addresses = storefront.addresses().list(refresh).await?;
    if addresses.is_empty() {
        info!("No addresses");
    }
    for address in &addresses {
        let mark = if address.is_default { "*" } else { " " };
        info!("{mark} #{:<6} {}", address.id, address.one_line());
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the address is unknown.
pub async fn set_default(storefront: &Storefront, address_id: AddressId) -> Result<(), CliError> {
    storefront.addresses().set_default(address_id).await?;
    info!("Address #{address_id} is now the default");
    Ok(())
}

/// # Errors
///
/// Returns an error if the address cannot be deleted.
pub async fn delete(storefront: &Storefront, address_id: AddressId) -> Result<(), CliError> {
    storefront.addresses().delete(address_id).await?;
    info!("Address #{address_id} deleted");
    Ok(())
}
