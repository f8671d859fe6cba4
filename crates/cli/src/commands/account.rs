//! Session commands.

use delguur_storefront::Storefront;
use tracing::info;

use super::CliError;

/// Sign in with email and password.
///
/// # Errors
///
/// Returns an error if no password is given or the backend refuses the login.
pub async fn login(
    storefront: &Storefront,
    email: &str,
    password: Option<&str>,
) -> Result<(), CliError> {
    let password = password.ok_or(CliError::Usage(
        "--password or DELGUUR_PASSWORD is required",
    ))?;
    let user = storefront.account().login(email, password).await?;
    info!("Signed in as {} (#{})", user.name, user.id);
    Ok(())
}

/// Sign in with a Facebook access token.
///
/// # Errors
///
/// Returns an error if Facebook login is not configured or the token is refused.
pub async fn facebook_login(storefront: &Storefront, token: &str) -> Result<(), CliError> {
    let user = storefront.account().facebook_login(token).await?;
    info!("Signed in as {} (#{}) via Facebook", user.name, user.id);
    Ok(())
}

pub async fn logout(storefront: &Storefront) {
    storefront.logout().await;
    info!("Signed out");
}
