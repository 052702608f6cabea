//! Client and supplier model.
//!
//! Clients and suppliers share one shape and one table; `PartyKind` tells
//! them apart and scopes every lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which side of the business a party (and its quotes/invoices) sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Client,
    Supplier,
}

impl PartyKind {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Client => "CLIENT",
            PartyKind::Supplier => "SUPPLIER",
        }
    }

    /// Lowercase label used in routes and messages.
    pub fn label(&self) -> &'static str {
        match self {
            PartyKind::Client => "client",
            PartyKind::Supplier => "supplier",
        }
    }

    /// JSON field carrying the party reference on quotes and invoices.
    pub fn id_field(&self) -> &'static str {
        match self {
            PartyKind::Client => "clientId",
            PartyKind::Supplier => "supplierId",
        }
    }
}

impl std::fmt::Display for PartyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Client or supplier record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Party {
    pub party_id: i64,
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

/// Input for creating a party.
#[derive(Debug, Clone)]
pub struct CreateParty {
    pub kind: PartyKind,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating a party. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateParty {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Filter parameters for listing parties.
#[derive(Debug, Clone, Default)]
pub struct ListPartiesFilter {
    /// Case-insensitive match on name or email.
    pub search: Option<String>,
}

/// Records that point at a party and block its deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartyReferences {
    pub quotes: i64,
    pub invoices: i64,
    pub products: i64,
}

impl PartyReferences {
    pub fn is_referenced(&self) -> bool {
        self.quotes > 0 || self.invoices > 0 || self.products > 0
    }
}

impl std::fmt::Display for PartyReferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} quote(s), {} invoice(s), {} product(s)",
            self.quotes, self.invoices, self.products
        )
    }
}
