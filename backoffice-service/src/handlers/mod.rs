//! HTTP handlers for backoffice-service.

pub mod categories;
pub mod invoices;
pub mod parties;
pub mod products;
pub mod quotes;

use backoffice_core::error::AppError;

use crate::models::{Party, PartyKind};
use crate::startup::AppState;

/// Look up the party a document refers to; a missing party is a client error.
pub(crate) async fn require_party(
    state: &AppState,
    kind: PartyKind,
    party_id: i64,
) -> Result<Party, AppError> {
    state
        .store
        .get_party(kind, party_id)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!(
                "{} {} does not exist",
                kind.id_field(),
                party_id
            ))
        })
}
