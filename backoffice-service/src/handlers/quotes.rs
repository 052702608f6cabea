//! Quote handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use backoffice_core::error::AppError;
use backoffice_core::extract::ValidatedJson;

use crate::dtos::{
    party_reference, ConvertQuoteRequest, ConvertQuoteResponse, CreateQuoteRequest,
    InvoiceResponse, ListQuotesQuery, QuoteResponse, QuoteStatusRequest, UpdateQuoteRequest,
};
use crate::handlers::require_party;
use crate::models::{CreateQuote, ListQuotesFilter, PartyKind, QuoteStatus, UpdateQuote};
use crate::services::metrics::{record_guarded_delete, record_quote_created};
use crate::services::pricing::resolve_items;
use crate::services::quote_workflow;
use crate::startup::AppState;

/// POST /api/quotes/:party
pub async fn create_quote(
    State(state): State<AppState>,
    Path(kind): Path<PartyKind>,
    ValidatedJson(req): ValidatedJson<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<QuoteResponse>), AppError> {
    let party_id = party_reference(kind, req.client_id, req.supplier_id)?;
    require_party(&state, kind, party_id).await?;

    let items = resolve_items(state.store.as_ref(), kind, &req.items).await?;
    let detail = state
        .store
        .create_quote(&CreateQuote {
            party_kind: kind,
            party_id,
            valid_until: req.valid_until,
            notes: req.notes,
            items,
        })
        .await?;

    record_quote_created(kind);

    Ok((
        StatusCode::CREATED,
        Json(QuoteResponse::detail(detail, &state.config.default_currency)),
    ))
}

/// GET /api/quotes/:party
pub async fn list_quotes(
    State(state): State<AppState>,
    Path(kind): Path<PartyKind>,
    Query(query): Query<ListQuotesQuery>,
) -> Result<Json<Vec<QuoteResponse>>, AppError> {
    let filter: ListQuotesFilter = query.into();
    let quotes = state.store.list_quotes(kind, &filter).await?;
    let currency = &state.config.default_currency;

    Ok(Json(
        quotes
            .into_iter()
            .map(|q| QuoteResponse::summary(q, currency))
            .collect(),
    ))
}

/// GET /api/quotes/:party/:id
pub async fn get_quote(
    State(state): State<AppState>,
    Path((kind, quote_id)): Path<(PartyKind, i64)>,
) -> Result<Json<QuoteResponse>, AppError> {
    let detail = state
        .store
        .get_quote(kind, quote_id)
        .await?
        .ok_or_else(|| not_found(quote_id))?;

    Ok(Json(QuoteResponse::detail(
        detail,
        &state.config.default_currency,
    )))
}

/// PUT /api/quotes/:party/:id
///
/// Replaces terms and lines; DRAFT quotes only.
pub async fn update_quote(
    State(state): State<AppState>,
    Path((kind, quote_id)): Path<(PartyKind, i64)>,
    ValidatedJson(req): ValidatedJson<UpdateQuoteRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let current = state
        .store
        .get_quote(kind, quote_id)
        .await?
        .ok_or_else(|| not_found(quote_id))?;
    if !current.quote.status.is_editable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Only DRAFT quotes can be edited; quote {} is {}",
            quote_id,
            current.quote.status
        )));
    }

    let items = resolve_items(state.store.as_ref(), kind, &req.items).await?;
    let detail = state
        .store
        .update_quote(
            kind,
            quote_id,
            &UpdateQuote {
                valid_until: req.valid_until,
                notes: req.notes,
                items,
            },
        )
        .await?
        .ok_or_else(|| not_found(quote_id))?;

    Ok(Json(QuoteResponse::detail(
        detail,
        &state.config.default_currency,
    )))
}

/// PATCH /api/quotes/:party/:id/status
pub async fn update_quote_status(
    State(state): State<AppState>,
    Path((kind, quote_id)): Path<(PartyKind, i64)>,
    ValidatedJson(req): ValidatedJson<QuoteStatusRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let quote = quote_workflow::change_status(
        state.store.as_ref(),
        kind,
        quote_id,
        req.status,
        state.config.quotes.enforce_transitions,
    )
    .await?;

    Ok(Json(QuoteResponse::summary(
        quote,
        &state.config.default_currency,
    )))
}

/// POST /api/quotes/:party/:id/convert
pub async fn convert_quote(
    State(state): State<AppState>,
    Path((kind, quote_id)): Path<(PartyKind, i64)>,
    ValidatedJson(req): ValidatedJson<ConvertQuoteRequest>,
) -> Result<(StatusCode, Json<ConvertQuoteResponse>), AppError> {
    let created =
        quote_workflow::convert_to_invoice(state.store.as_ref(), kind, quote_id, req.delivery_date)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConvertQuoteResponse {
            invoice_id: created.invoice.invoice_id,
            invoice: InvoiceResponse::detail(created, &state.config.default_currency),
        }),
    ))
}

/// DELETE /api/quotes/:party/:id
///
/// Converted quotes stay as the record behind their invoice.
pub async fn delete_quote(
    State(state): State<AppState>,
    Path((kind, quote_id)): Path<(PartyKind, i64)>,
) -> Result<StatusCode, AppError> {
    let current = state
        .store
        .get_quote(kind, quote_id)
        .await?
        .ok_or_else(|| not_found(quote_id))?;

    if current.quote.status == QuoteStatus::Converted {
        record_guarded_delete("quote");
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Quote {} is converted and cannot be deleted",
            quote_id
        )));
    }

    if !state.store.delete_quote(kind, quote_id).await? {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Quote {} changed while deleting; reload and retry",
            quote_id
        )));
    }

    tracing::info!(quote_id = quote_id, "Quote deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(quote_id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id))
}
