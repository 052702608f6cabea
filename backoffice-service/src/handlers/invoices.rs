//! Invoice handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use backoffice_core::error::AppError;
use backoffice_core::extract::ValidatedJson;

use crate::dtos::{
    party_reference, CreateInvoiceRequest, InvoiceResponse, InvoiceStatusRequest,
    ListInvoicesQuery, UpdateInvoiceRequest,
};
use crate::handlers::require_party;
use crate::models::{
    CreateInvoice, DeliveryStatus, InvoiceStatusUpdate, ListInvoicesFilter, PartyKind,
    PaymentStatus, UpdateInvoice,
};
use crate::services::metrics::{record_guarded_delete, record_invoice_created};
use crate::services::pricing::resolve_items;
use crate::startup::AppState;

/// POST /api/invoices/:party
pub async fn create_invoice(
    State(state): State<AppState>,
    Path(kind): Path<PartyKind>,
    ValidatedJson(req): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let party_id = party_reference(kind, req.client_id, req.supplier_id)?;
    require_party(&state, kind, party_id).await?;

    let items = resolve_items(state.store.as_ref(), kind, &req.items).await?;
    let detail = state
        .store
        .create_invoice(&CreateInvoice {
            party_kind: kind,
            party_id,
            quote_id: None,
            delivery_date: req.delivery_date,
            payment_status: req.payment_status.unwrap_or(PaymentStatus::Unpaid),
            delivery_status: req.delivery_status.unwrap_or(DeliveryStatus::InProcess),
            notes: req.notes,
            items,
        })
        .await?;

    record_invoice_created(kind, "direct");

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::detail(
            detail,
            &state.config.default_currency,
        )),
    ))
}

/// GET /api/invoices/:party
pub async fn list_invoices(
    State(state): State<AppState>,
    Path(kind): Path<PartyKind>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let filter: ListInvoicesFilter = query.into();
    let invoices = state.store.list_invoices(kind, &filter).await?;
    let currency = &state.config.default_currency;

    Ok(Json(
        invoices
            .into_iter()
            .map(|i| InvoiceResponse::summary(i, currency))
            .collect(),
    ))
}

/// GET /api/invoices/:party/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    Path((kind, invoice_id)): Path<(PartyKind, i64)>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let detail = state
        .store
        .get_invoice(kind, invoice_id)
        .await?
        .ok_or_else(|| not_found(invoice_id))?;

    Ok(Json(InvoiceResponse::detail(
        detail,
        &state.config.default_currency,
    )))
}

/// PUT /api/invoices/:party/:id
///
/// Replaces terms and lines; UNPAID invoices only.
pub async fn update_invoice(
    State(state): State<AppState>,
    Path((kind, invoice_id)): Path<(PartyKind, i64)>,
    ValidatedJson(req): ValidatedJson<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let current = state
        .store
        .get_invoice(kind, invoice_id)
        .await?
        .ok_or_else(|| not_found(invoice_id))?;
    if !current.invoice.is_editable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Invoice {} is paid and can no longer be edited",
            invoice_id
        )));
    }

    let items = resolve_items(state.store.as_ref(), kind, &req.items).await?;
    let detail = state
        .store
        .update_invoice(
            kind,
            invoice_id,
            &UpdateInvoice {
                delivery_date: req.delivery_date,
                notes: req.notes,
                items,
            },
        )
        .await?
        .ok_or_else(|| not_found(invoice_id))?;

    Ok(Json(InvoiceResponse::detail(
        detail,
        &state.config.default_currency,
    )))
}

/// PATCH /api/invoices/:party/:id/status
pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path((kind, invoice_id)): Path<(PartyKind, i64)>,
    ValidatedJson(req): ValidatedJson<InvoiceStatusRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let update: InvoiceStatusUpdate = req.into();
    let invoice = state
        .store
        .update_invoice_status(kind, invoice_id, &update)
        .await?
        .ok_or_else(|| not_found(invoice_id))?;

    Ok(Json(InvoiceResponse::summary(
        invoice,
        &state.config.default_currency,
    )))
}

/// DELETE /api/invoices/:party/:id
///
/// Paid invoices and invoices issued from a quote are kept.
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path((kind, invoice_id)): Path<(PartyKind, i64)>,
) -> Result<StatusCode, AppError> {
    let current = state
        .store
        .get_invoice(kind, invoice_id)
        .await?
        .ok_or_else(|| not_found(invoice_id))?;

    if let Some(quote_id) = current.invoice.quote_id {
        record_guarded_delete("invoice");
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Invoice {} was issued from quote {} and cannot be deleted",
            invoice_id,
            quote_id
        )));
    }
    if current.invoice.payment_status == PaymentStatus::Paid {
        record_guarded_delete("invoice");
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Invoice {} is paid and cannot be deleted",
            invoice_id
        )));
    }

    if !state.store.delete_invoice(kind, invoice_id).await? {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Invoice {} changed while deleting; reload and retry",
            invoice_id
        )));
    }

    tracing::info!(invoice_id = invoice_id, "Invoice deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(invoice_id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id))
}
