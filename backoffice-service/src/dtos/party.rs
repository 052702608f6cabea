//! Client and supplier bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CreateParty, ListPartiesFilter, Party, PartyKind, UpdateParty};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,

    pub contact_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 64, message = "phone must be at most 64 characters"))]
    pub phone: Option<String>,

    pub address: Option<String>,
    pub notes: Option<String>,
}

impl CreatePartyRequest {
    pub fn into_model(self, kind: PartyKind) -> CreateParty {
        CreateParty {
            kind,
            name: self.name.trim().to_string(),
            contact_name: self.contact_name,
            email: self.email.map(|e| e.trim().to_lowercase()),
            phone: self.phone,
            address: self.address,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartyRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,

    pub contact_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 64, message = "phone must be at most 64 characters"))]
    pub phone: Option<String>,

    pub address: Option<String>,
    pub notes: Option<String>,
}

impl From<UpdatePartyRequest> for UpdateParty {
    fn from(req: UpdatePartyRequest) -> Self {
        Self {
            name: req.name.map(|n| n.trim().to_string()),
            contact_name: req.contact_name,
            email: req.email.map(|e| e.trim().to_lowercase()),
            phone: req.phone,
            address: req.address,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPartiesQuery {
    pub search: Option<String>,
}

impl From<ListPartiesQuery> for ListPartiesFilter {
    fn from(query: ListPartiesQuery) -> Self {
        Self {
            search: query.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyResponse {
    pub id: i64,
    pub kind: PartyKind,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Party> for PartyResponse {
    fn from(party: Party) -> Self {
        Self {
            id: party.party_id,
            kind: party.kind,
            name: party.name,
            contact_name: party.contact_name,
            email: party.email,
            phone: party.phone,
            address: party.address,
            notes: party.notes,
            created_utc: party.created_utc,
            updated_utc: party.updated_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_email_fails_validation() {
        let req: CreatePartyRequest =
            serde_json::from_str(r#"{"name": "Acme", "email": "not-an-email"}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn email_is_normalized() {
        let req: CreatePartyRequest =
            serde_json::from_str(r#"{"name": " Acme ", "email": "Ops@Acme.Test"}"#).unwrap();
        let model = req.into_model(PartyKind::Client);
        assert_eq!(model.name, "Acme");
        assert_eq!(model.email.as_deref(), Some("ops@acme.test"));
    }
}
