//! Command implementations.
//!
//! Output goes through `tracing` at info level; errors bubble up as
//! [`CliError`] and are logged once by `main`.

pub mod account;
pub mod addresses;
pub mod cache;
pub mod cart;
pub mod favorites;
pub mod orders;
pub mod pay;

use delguur_storefront::config::StorefrontConfig;
use delguur_storefront::{AppError, Storefront};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storefront operation failed.
    #[error("{0}")]
    Storefront(String),

    /// Invalid combination of arguments.
    #[error("{0}")]
    Usage(&'static str),

    /// Writing an output file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The QR image sent by QPay is not valid base64.
    #[error("Invalid QR image: {0}")]
    QrImage(#[from] base64::DecodeError),
}

impl From<AppError> for CliError {
    fn from(error: AppError) -> Self {
        let notice = delguur_storefront::error::report(&error);
        Self::Storefront(notice.message)
    }
}

/// Build the storefront over the local store.
///
/// # Errors
///
/// Returns an error if the HTTP client or the local store cannot be set up.
pub fn open(config: StorefrontConfig) -> Result<Storefront, CliError> {
    Ok(Storefront::new(config)?)
}
