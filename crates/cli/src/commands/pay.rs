//! QPay payment command.
//!
//! Creates (or watches) the invoice for an order, writes the QR code to disk
//! and blocks until the payment reaches a terminal status. Ctrl-C stops
//! waiting; the pending session stays in the local store and is picked up
//! again by `dg pay <order> --watch`.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use delguur_core::{OrderId, PaymentStatus};
use delguur_storefront::Storefront;
use delguur_storefront::models::QPayInvoice;
use tracing::info;

use super::CliError;

/// Prefix QPay sometimes puts in front of the base64 payload.
const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// # Errors
///
/// Returns an error if the invoice cannot be created, the QR file cannot be
/// written, or the status cannot be read.
pub async fn run(
    storefront: &Storefront,
    order_id: OrderId,
    qr_out: Option<&Path>,
    watch_only: bool,
) -> Result<(), CliError> {
    let payments = storefront.payments();
    let mut updates = payments.subscribe();

    if watch_only {
        let status = payments.watch(order_id).await?;
        info!("Payment for order #{order_id} is {status}");
    } else {
        let invoice = payments.create_payment(order_id).await?;
        print_invoice(&invoice);
        if let Some(path) = qr_out {
            write_qr(path, &invoice.qr_image)?;
            info!("QR code written to {}", path.display());
        }
    }

    if !payments.is_polling() {
        return finish(payments.session().map(|s| s.status));
    }

    info!("Waiting for payment (Ctrl-C to stop)...");
    let status = tokio::select! {
        changed = updates.wait_for(|s| {
            s.as_ref()
                .is_some_and(|s| s.order_id == order_id && s.status.is_terminal())
        }) => changed
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.status)),
        _ = tokio::signal::ctrl_c() => {
            payments.stop();
            info!("Stopped waiting; resume with `dg pay {order_id} --watch`");
            return Ok(());
        }
    };
    finish(status)
}

fn finish(status: Option<PaymentStatus>) -> Result<(), CliError> {
    match status {
        Some(PaymentStatus::Paid) => {
            info!("Payment received");
            Ok(())
        }
        Some(PaymentStatus::Pending) => Ok(()),
        Some(status) => Err(CliError::Storefront(format!("Payment {status}"))),
        None => Err(CliError::Storefront("Payment session ended".to_string())),
    }
}

fn print_invoice(invoice: &QPayInvoice) {
    info!(
        "Invoice {} for order #{}: {}",
        invoice.invoice_id, invoice.order_id, invoice.amount
    );
    for link in &invoice.urls {
        info!("  {:<20} {}", link.name, link.link);
    }
}

/// Decode the base64 PNG sent by QPay.
fn decode_qr(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = encoded.trim();
    let payload = payload.strip_prefix(DATA_URL_PREFIX).unwrap_or(payload);
    STANDARD.decode(payload)
}

fn write_qr(path: &Path, encoded: &str) -> Result<(), CliError> {
    let png = decode_qr(encoded)?;
    std::fs::write(path, png)?;
    Ok(())
}
