//! Client and supplier handlers.
//!
//! One set of handlers serves both `/api/clients` and `/api/suppliers`; the
//! router attaches the `PartyKind` as an extension.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use backoffice_core::error::AppError;
use backoffice_core::extract::ValidatedJson;

use crate::dtos::{CreatePartyRequest, ListPartiesQuery, PartyResponse, UpdatePartyRequest};
use crate::models::{ListPartiesFilter, PartyKind, UpdateParty};
use crate::services::metrics::record_guarded_delete;
use crate::startup::AppState;

/// Routes for one kind of party, to be nested under its collection path.
pub fn routes(kind: PartyKind) -> Router<AppState> {
    Router::new()
        .route("/", get(list_parties).post(create_party))
        .route(
            "/:id",
            get(get_party).put(update_party).delete(delete_party),
        )
        .layer(Extension(kind))
}

/// POST /api/clients, /api/suppliers
pub async fn create_party(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    ValidatedJson(req): ValidatedJson<CreatePartyRequest>,
) -> Result<(StatusCode, Json<PartyResponse>), AppError> {
    let party = state.store.create_party(&req.into_model(kind)).await?;

    Ok((StatusCode::CREATED, Json(party.into())))
}

/// GET /api/clients, /api/suppliers
pub async fn list_parties(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Query(query): Query<ListPartiesQuery>,
) -> Result<Json<Vec<PartyResponse>>, AppError> {
    let filter: ListPartiesFilter = query.into();
    let parties = state.store.list_parties(kind, &filter).await?;

    Ok(Json(parties.into_iter().map(Into::into).collect()))
}

/// GET /api/clients/:id, /api/suppliers/:id
pub async fn get_party(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Path(party_id): Path<i64>,
) -> Result<Json<PartyResponse>, AppError> {
    let party = state
        .store
        .get_party(kind, party_id)
        .await?
        .ok_or_else(|| not_found(kind, party_id))?;

    Ok(Json(party.into()))
}

/// PUT /api/clients/:id, /api/suppliers/:id
pub async fn update_party(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Path(party_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdatePartyRequest>,
) -> Result<Json<PartyResponse>, AppError> {
    let input: UpdateParty = req.into();
    let party = state
        .store
        .update_party(kind, party_id, &input)
        .await?
        .ok_or_else(|| not_found(kind, party_id))?;

    Ok(Json(party.into()))
}

/// DELETE /api/clients/:id, /api/suppliers/:id
///
/// Refused while quotes or invoices (or, for suppliers, products) point at
/// the party.
pub async fn delete_party(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Path(party_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.get_party(kind, party_id).await?.is_none() {
        return Err(not_found(kind, party_id));
    }

    let refs = state.store.party_references(kind, party_id).await?;
    if refs.is_referenced() {
        record_guarded_delete(kind.label());
        return Err(AppError::Conflict(anyhow::anyhow!(
            "The {} {} is referenced by {}",
            kind,
            party_id,
            refs
        )));
    }

    if !state.store.delete_party(kind, party_id).await? {
        return Err(not_found(kind, party_id));
    }

    tracing::info!(party_id = party_id, kind = %kind, "Party deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn not_found(kind: PartyKind, party_id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("The {} {} was not found", kind, party_id))
}
