//! Quote status changes and conversion to invoices.

use backoffice_core::error::AppError;
use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::models::{
    CreateInvoice, DeliveryStatus, InvoiceDetail, NewLineItem, PartyKind, PaymentStatus, Quote,
    QuoteStatus,
};
use crate::services::metrics::{
    record_error, record_invoice_created, record_quote_conversion, record_quote_transition,
};
use crate::services::store::Store;

/// Move a quote to `target`.
///
/// The change is checked against the transition table (or only against the
/// terminal states when `enforce_order` is off) and applied with a
/// compare-and-set on the status that was read, so a concurrent change turns
/// into a conflict rather than an overwrite.
#[instrument(skip(store))]
pub async fn change_status(
    store: &dyn Store,
    kind: PartyKind,
    quote_id: i64,
    target: QuoteStatus,
    enforce_order: bool,
) -> Result<Quote, AppError> {
    let current = store
        .get_quote(kind, quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))?
        .quote;

    current
        .status
        .check_transition(target, enforce_order)
        .map_err(|e| {
            record_error("illegal_transition");
            AppError::BadRequest(e.into())
        })?;

    if current.status == target {
        return Ok(current);
    }

    let updated = store
        .set_quote_status(kind, quote_id, current.status, target)
        .await?
        .ok_or_else(|| {
            record_error("concurrent_modification");
            AppError::Conflict(anyhow::anyhow!(
                "Quote {} was modified concurrently; reload and retry",
                quote_id
            ))
        })?;

    record_quote_transition(kind, current.status, target);

    Ok(updated)
}

/// Turn a CONFIRMED or APPROVED quote into an UNPAID, IN_PROCESS invoice
/// carrying the same lines.
#[instrument(skip(store))]
pub async fn convert_to_invoice(
    store: &dyn Store,
    kind: PartyKind,
    quote_id: i64,
    delivery_date: NaiveDate,
) -> Result<InvoiceDetail, AppError> {
    let detail = store
        .get_quote(kind, quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))?;
    let quote = &detail.quote;

    if let Some(invoice_id) = quote.converted_invoice_id {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Quote {} is already converted to invoice {}",
            quote_id,
            invoice_id
        )));
    }
    if !quote.status.is_convertible() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Only CONFIRMED or APPROVED quotes can be converted; quote {} is {}",
            quote_id,
            quote.status
        )));
    }

    let invoice = CreateInvoice {
        party_kind: kind,
        party_id: quote.party_id,
        quote_id: Some(quote_id),
        delivery_date: Some(delivery_date),
        payment_status: PaymentStatus::Unpaid,
        delivery_status: DeliveryStatus::InProcess,
        notes: quote.notes.clone(),
        items: detail.items.iter().map(NewLineItem::from).collect(),
    };

    let created = store
        .convert_quote(kind, quote_id, quote.status, &invoice)
        .await?;

    record_quote_conversion(kind);
    record_invoice_created(kind, "quote");

    info!(
        quote_id = quote_id,
        invoice_id = created.invoice.invoice_id,
        backend = store.backend(),
        "Quote conversion committed"
    );

    Ok(created)
}
